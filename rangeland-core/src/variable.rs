//! Registry of the model's state variables.
//!
//! State variables are stored as one raster per concrete name. A definition
//! expands into concrete names along three optional axes:
//!
//! - depth (`_1` surface, `_2` soil) or soil layer (`_1` .. `_<nlayer>`)
//! - nutrient element (`_1` nitrogen, `_2` phosphorus)
//! - plant functional type, appended last (`aglivc_3` is `aglivc` for PFT 3)
//!
//! ```rust
//! use rangeland_core::variable::{variable_name, Element};
//!
//! assert_eq!(variable_name("minerl", Some(3), Some(Element::Phosphorus)), "minerl_3_2");
//! assert_eq!(variable_name("som3e", None, Some(Element::Nitrogen)), "som3e_1");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of soil layers tracked for water and mineral nutrients.
pub const MAX_SOIL_LAYERS: usize = 9;

/// Nutrient element tracked alongside carbon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Element {
    Nitrogen,
    Phosphorus,
}

impl Element {
    pub const ALL: [Element; 2] = [Element::Nitrogen, Element::Phosphorus];

    /// Zero-based index, for array storage.
    pub fn index(self) -> usize {
        match self {
            Element::Nitrogen => 0,
            Element::Phosphorus => 1,
        }
    }

    /// One-based code used in variable and parameter names.
    pub fn code(self) -> usize {
        self.index() + 1
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Nitrogen => write!(f, "N"),
            Element::Phosphorus => write!(f, "P"),
        }
    }
}

/// Spatial unit a state variable is tracked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Shared by all plant functional types in a pixel
    Site,
    /// One raster per plant functional type
    Pft,
}

/// Layering of a state variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerAxis {
    Unlayered,
    /// Surface (1) and soil (2) compartments
    Depth,
    /// Soil water and mineral layers 1..=n
    Soil,
}

/// Static description of a state variable.
#[derive(Debug, Clone, PartialEq)]
pub struct StateVariableDefinition {
    pub base: &'static str,
    pub scope: Scope,
    pub layers: LayerAxis,
    pub per_element: bool,
    pub unit: &'static str,
    pub description: &'static str,
}

impl StateVariableDefinition {
    /// Concrete raster names for this variable.
    pub fn names(&self, n_soil_layers: usize, pfts: &[u32]) -> Vec<String> {
        let layers: Vec<Option<usize>> = match self.layers {
            LayerAxis::Unlayered => vec![None],
            LayerAxis::Depth => vec![Some(1), Some(2)],
            LayerAxis::Soil => (1..=n_soil_layers).map(Some).collect(),
        };
        let elements: Vec<Option<Element>> = if self.per_element {
            Element::ALL.iter().copied().map(Some).collect()
        } else {
            vec![None]
        };

        let mut names = Vec::new();
        for layer in &layers {
            for element in &elements {
                let name = variable_name(self.base, *layer, *element);
                match self.scope {
                    Scope::Site => names.push(name),
                    Scope::Pft => names.extend(pfts.iter().map(|pft| pft_variable(&name, *pft))),
                }
            }
        }
        names
    }
}

macro_rules! define_state_variables {
    ($($base:literal => ($scope:ident, $layers:ident, $per_element:literal, $unit:literal, $description:literal)),* $(,)?) => {
        /// Every state variable carried between months.
        pub static STATE_VARIABLES: &[StateVariableDefinition] = &[
            $(StateVariableDefinition {
                base: $base,
                scope: Scope::$scope,
                layers: LayerAxis::$layers,
                per_element: $per_element,
                unit: $unit,
                description: $description,
            }),*
        ];
    };
}

define_state_variables!(
    "minerl" => (Site, Soil, true, "g / m^2", "Mineral nutrient content by soil layer"),
    "asmos" => (Site, Soil, false, "cm", "Soil moisture by soil layer"),
    "snow" => (Site, Unlayered, false, "cm", "Snowpack water equivalent"),
    "snlq" => (Site, Unlayered, false, "cm", "Liquid water held in the snowpack"),
    "strucc" => (Site, Depth, false, "g C / m^2", "Structural litter carbon"),
    "struce" => (Site, Depth, true, "g / m^2", "Structural litter nutrient content"),
    "strlig" => (Site, Depth, false, "1", "Lignin fraction of structural litter"),
    "metabc" => (Site, Depth, false, "g C / m^2", "Metabolic litter carbon"),
    "metabe" => (Site, Depth, true, "g / m^2", "Metabolic litter nutrient content"),
    "som1c" => (Site, Depth, false, "g C / m^2", "Active organic matter carbon"),
    "som1e" => (Site, Depth, true, "g / m^2", "Active organic matter nutrient content"),
    "som2c" => (Site, Depth, false, "g C / m^2", "Slow organic matter carbon"),
    "som2e" => (Site, Depth, true, "g / m^2", "Slow organic matter nutrient content"),
    "som3c" => (Site, Unlayered, false, "g C / m^2", "Passive organic matter carbon"),
    "som3e" => (Site, Unlayered, true, "g / m^2", "Passive organic matter nutrient content"),
    "parent_2" => (Site, Unlayered, false, "g P / m^2", "Parent material phosphorus"),
    "secndy_2" => (Site, Unlayered, false, "g P / m^2", "Secondary phosphorus"),
    "occlud" => (Site, Unlayered, false, "g P / m^2", "Occluded phosphorus"),
    "aglivc" => (Pft, Unlayered, false, "g C / m^2", "Aboveground live carbon"),
    "bglivc" => (Pft, Unlayered, false, "g C / m^2", "Belowground live carbon"),
    "stdedc" => (Pft, Unlayered, false, "g C / m^2", "Standing dead carbon"),
    "aglive" => (Pft, Unlayered, true, "g / m^2", "Aboveground live nutrient content"),
    "bglive" => (Pft, Unlayered, true, "g / m^2", "Belowground live nutrient content"),
    "stdede" => (Pft, Unlayered, true, "g / m^2", "Standing dead nutrient content"),
    "avh2o_1" => (Pft, Unlayered, false, "cm", "Water available for growth within the rooting zone"),
);

/// Build a concrete variable name from a base, optional layer and element.
pub fn variable_name(base: &str, layer: Option<usize>, element: Option<Element>) -> String {
    let mut name = base.to_string();
    if let Some(layer) = layer {
        name.push_str(&format!("_{}", layer));
    }
    if let Some(element) = element {
        name.push_str(&format!("_{}", element.code()));
    }
    name
}

/// Name of the raster holding `name` for plant functional type `pft`.
pub fn pft_variable(name: &str, pft: u32) -> String {
    format!("{}_{}", name, pft)
}

/// Look up a definition by its base name.
pub fn lookup(base: &str) -> Option<&'static StateVariableDefinition> {
    STATE_VARIABLES.iter().find(|d| d.base == base)
}

/// Every concrete state variable name for a run.
pub fn all_state_variable_names(n_soil_layers: usize, pfts: &[u32]) -> Vec<String> {
    STATE_VARIABLES
        .iter()
        .flat_map(|d| d.names(n_soil_layers, pfts))
        .collect()
}

/// Whether a concrete name belongs to a PFT-scoped variable.
pub fn is_pft_variable(name: &str, pfts: &[u32]) -> bool {
    STATE_VARIABLES
        .iter()
        .filter(|d| d.scope == Scope::Pft)
        .any(|d| d.names(0, pfts).iter().any(|n| n == name))
}
