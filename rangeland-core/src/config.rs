//! Run configuration.
//!
//! A run is described by a TOML document:
//!
//! ```toml
//! workspace_dir = "out"
//! starting_year = 2016
//! starting_month = 1
//! n_months = 22
//! clay_proportion_path = "soil/clay.tif"
//! # ...
//! monthly_precip_path_pattern = "climate/precip_<year>_<month>.tif"
//! veg_spatial_composition_path_pattern = "veg/cover_<PFT>.tif"
//! ```

use crate::drivers::DriverPatterns;
use crate::errors::{RangelandError, RangelandResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Token replaced by the PFT id in the vegetation composition pattern.
pub const PFT_TOKEN: &str = "<PFT>";

fn default_iterations() -> usize {
    1
}

/// Everything needed to set up and run a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory receiving the monthly state snapshots
    pub workspace_dir: PathBuf,
    /// Appended to every output file name
    #[serde(default)]
    pub results_suffix: Option<String>,
    pub starting_year: i32,
    /// Calendar month of the first simulated month, 1..=12
    pub starting_month: u32,
    pub n_months: usize,

    pub bulk_density_path: PathBuf,
    pub ph_path: PathBuf,
    pub clay_proportion_path: PathBuf,
    pub silt_proportion_path: PathBuf,
    pub sand_proportion_path: PathBuf,

    pub monthly_precip_path_pattern: String,
    pub min_temp_path_pattern: String,
    pub max_temp_path_pattern: String,

    /// Integer raster of site codes keying the site parameter table
    pub site_param_spatial_index_path: PathBuf,
    /// Fractional cover of each PFT; `<PFT>` is replaced by the PFT id
    pub veg_spatial_composition_path_pattern: String,
    /// Animals per hectare. No grazing when absent.
    #[serde(default)]
    pub animal_density_path: Option<PathBuf>,
    /// Row of the animal table describing the grazing animals
    #[serde(default)]
    pub animal_id: Option<u32>,

    pub site_param_table: PathBuf,
    pub veg_trait_path: PathBuf,
    #[serde(default)]
    pub animal_trait_path: Option<PathBuf>,
    pub initial_conditions_dir: PathBuf,

    /// Write every monthly snapshot rather than only the last one
    #[serde(default)]
    pub save_sv_rasters: bool,
    /// Decomposition sub-steps per month
    #[serde(default = "default_iterations")]
    pub decomposition_iterations: usize,
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> RangelandResult<Self> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> RangelandResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RangelandError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> RangelandResult<()> {
        if !(1..=12).contains(&self.starting_month) {
            return Err(RangelandError::InvalidConfig(format!(
                "starting_month must be between 1 and 12, got {}",
                self.starting_month
            )));
        }
        if self.n_months == 0 {
            return Err(RangelandError::InvalidConfig(
                "n_months must be at least 1".into(),
            ));
        }
        if self.decomposition_iterations == 0 {
            return Err(RangelandError::InvalidConfig(
                "decomposition_iterations must be at least 1".into(),
            ));
        }
        if !self.veg_spatial_composition_path_pattern.contains(PFT_TOKEN) {
            return Err(RangelandError::InvalidConfig(format!(
                "veg_spatial_composition_path_pattern must contain {}",
                PFT_TOKEN
            )));
        }
        if self.animal_density_path.is_some()
            && (self.animal_id.is_none() || self.animal_trait_path.is_none())
        {
            return Err(RangelandError::InvalidConfig(
                "animal_density_path requires animal_id and animal_trait_path".into(),
            ));
        }
        Ok(())
    }

    pub fn driver_patterns(&self) -> DriverPatterns {
        DriverPatterns {
            precip: self.monthly_precip_path_pattern.clone(),
            min_temp: self.min_temp_path_pattern.clone(),
            max_temp: self.max_temp_path_pattern.clone(),
        }
    }

    /// Cover raster path for one PFT.
    pub fn veg_cover_path(&self, pft: u32) -> PathBuf {
        PathBuf::from(
            self.veg_spatial_composition_path_pattern
                .replace(PFT_TOKEN, &pft.to_string()),
        )
    }

    pub fn results_suffix(&self) -> Option<&str> {
        self.results_suffix.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const EXAMPLE: &str = r#"
workspace_dir = "out"
starting_year = 2016
starting_month = 1
n_months = 3
bulk_density_path = "soil/bulkd.tif"
ph_path = "soil/ph.tif"
clay_proportion_path = "soil/clay.tif"
silt_proportion_path = "soil/silt.tif"
sand_proportion_path = "soil/sand.tif"
monthly_precip_path_pattern = "climate/precip_<year>_<month>.tif"
min_temp_path_pattern = "climate/tmin_<month>.tif"
max_temp_path_pattern = "climate/tmax_<month>.tif"
site_param_spatial_index_path = "site_index.tif"
veg_spatial_composition_path_pattern = "veg/cover_<PFT>.tif"
site_param_table = "site.csv"
veg_trait_path = "veg.csv"
initial_conditions_dir = "ic"
"#;

    #[test]
    fn parses_with_defaults() {
        let config = RunConfig::from_toml_str(EXAMPLE).unwrap();
        assert_eq!(config.decomposition_iterations, 1);
        assert!(!config.save_sv_rasters);
        assert_eq!(config.veg_cover_path(3), PathBuf::from("veg/cover_3.tif"));
        assert_eq!(config.driver_patterns().min_temp, "climate/tmin_<month>.tif");
    }

    #[test]
    fn rejects_bad_month() {
        let content = EXAMPLE.replace("starting_month = 1", "starting_month = 13");
        assert!(matches!(
            RunConfig::from_toml_str(&content),
            Err(RangelandError::InvalidConfig(_))
        ));
    }

    #[test]
    fn grazing_requires_animal_table() {
        let content = format!("{}animal_density_path = \"density.tif\"\n", EXAMPLE);
        assert!(RunConfig::from_toml_str(&content).is_err());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, EXAMPLE).unwrap();
        let config = RunConfig::from_path(&path).unwrap();
        assert_eq!(config.n_months, 3);
        assert!(matches!(
            RunConfig::from_path(&dir.path().join("missing.toml")),
            Err(RangelandError::Io { .. })
        ));
    }
}
