//! A small grassland site shared by the integration tests.

#![allow(dead_code)]

use rangeland_components::components::{Climate, Decomposition, Production, SoilWater};
use rangeland_components::names::{
    self, ANNUAL_PRECIP, BULK_DENSITY, CLAY, LATITUDE, MAX_TEMP, MIN_TEMP, PH, PRECIP, SAND, SILT,
    SITE_INDEX,
};
use rangeland_components::persistent::PersistentParameters;
use rangeland_core::model::{Model, ModelBuilder};
use rangeland_core::raster::{Raster, IC_NODATA, TARGET_NODATA};
use rangeland_core::state::StateSnapshot;
use rangeland_core::tables::{AnimalParameters, ParameterTable, PftParameters, SiteParameters};
use rangeland_core::variable::{pft_variable, variable_name, Element};
use std::sync::Arc;

pub const SHAPE: (usize, usize) = (2, 2);
pub const N_LAYERS: usize = 5;
pub const PFTS: [u32; 2] = [1, 3];

pub fn filled(value: f64) -> Raster {
    Raster::filled(SHAPE, value as f32, TARGET_NODATA)
}

pub fn sites() -> ParameterTable<SiteParameters> {
    ParameterTable::from_records("sites", [(1, SiteParameters::default())])
}

pub fn pfts() -> ParameterTable<PftParameters> {
    ParameterTable::from_records(
        "pfts",
        PFTS.map(|pft| (pft, PftParameters::default())),
    )
}

/// Soil rasters, site index, latitude and cover.
pub fn soil() -> StateSnapshot {
    let mut soil = StateSnapshot::new();
    for (name, value) in [
        (BULK_DENSITY, 1.4),
        (PH, 6.5),
        (SAND, 0.4),
        (SILT, 0.4),
        (CLAY, 0.2),
        (SITE_INDEX, 1.0),
    ] {
        soil.insert(name, filled(value));
    }
    soil.insert(LATITUDE, Raster::filled(SHAPE, 40.0, IC_NODATA));
    for (pft, cover) in PFTS.iter().zip([0.6, 0.3]) {
        soil.insert(names::pft_cover(*pft), filled(cover));
    }
    soil
}

fn insert_pool(state: &mut StateSnapshot, carbon: String, nutrient: [String; 2], values: [f64; 3]) {
    state.insert(carbon, filled(values[0]));
    for (name, value) in nutrient.into_iter().zip([values[1], values[2]]) {
        state.insert(name, filled(value));
    }
}

fn nutrients(base: &str, depth: Option<usize>) -> [String; 2] {
    Element::ALL.map(|e| variable_name(base, depth, Some(e)))
}

/// Initial state covering every state variable of the run.
pub fn initial_state() -> StateSnapshot {
    let mut state = StateSnapshot::new();
    for (depth, scale) in [(1, 1.0), (2, 2.0)] {
        let d = Some(depth);
        insert_pool(
            &mut state,
            variable_name("strucc", d, None),
            nutrients("struce", d),
            [60.0 * scale, 0.4 * scale, 0.04 * scale],
        );
        state.insert(variable_name("strlig", d, None), filled(0.25));
        insert_pool(
            &mut state,
            variable_name("metabc", d, None),
            nutrients("metabe", d),
            [10.0 * scale, 0.5 * scale, 0.05 * scale],
        );
        insert_pool(
            &mut state,
            variable_name("som1c", d, None),
            nutrients("som1e", d),
            [20.0 * scale, 2.0 * scale, 0.2 * scale],
        );
        insert_pool(
            &mut state,
            variable_name("som2c", d, None),
            nutrients("som2e", d),
            [300.0 * scale, 20.0 * scale, 2.0 * scale],
        );
    }
    insert_pool(&mut state, "som3c".into(), nutrients("som3e", None), [1000.0, 100.0, 10.0]);
    for (name, value) in [("parent_2", 100.0), ("secndy_2", 20.0), ("occlud", 50.0), ("snow", 0.0), ("snlq", 0.0)] {
        state.insert(name, filled(value));
    }
    for lyr in 1..=N_LAYERS {
        state.insert(variable_name("asmos", Some(lyr), None), filled(2.0));
        for (element, value) in Element::ALL.into_iter().zip([2.0, 0.5]) {
            state.insert(variable_name("minerl", Some(lyr), Some(element)), filled(value));
        }
    }
    for pft in PFTS {
        for (carbon, nutrient, values) in [
            ("aglivc", "aglive", [60.0, 1.5, 0.15]),
            ("bglivc", "bglive", [150.0, 2.5, 0.25]),
            ("stdedc", "stdede", [40.0, 0.4, 0.04]),
        ] {
            insert_pool(
                &mut state,
                pft_variable(carbon, pft),
                nutrients(nutrient, None).map(|n| pft_variable(&n, pft)),
                values,
            );
        }
        state.insert(names::avh2o_1(pft), filled(0.0));
    }
    state
}

/// Soil rasters together with the derived persistent parameters.
pub fn persistent(initial: &StateSnapshot, density: Option<f64>) -> StateSnapshot {
    let soil = soil();
    let sites = sites();
    let derived = PersistentParameters::new(&sites)
        .derive(&soil, initial)
        .expect("persistent parameters");
    let mut persistent = soil.overlay(&derived, |_| true);
    if let Some(density) = density {
        persistent.insert(names::ANIMAL_DENSITY, filled(density));
    }
    persistent
}

pub fn drivers(precip: f64, min_temp: f64, max_temp: f64) -> StateSnapshot {
    let mut drivers = StateSnapshot::new();
    drivers.insert(PRECIP, filled(precip));
    drivers.insert(ANNUAL_PRECIP, filled(precip * 8.0));
    drivers.insert(MIN_TEMP, Raster::filled(SHAPE, min_temp as f32, IC_NODATA));
    drivers.insert(MAX_TEMP, Raster::filled(SHAPE, max_temp as f32, IC_NODATA));
    drivers
}

pub fn model(animal: Option<AnimalParameters>) -> Model {
    ModelBuilder::new()
        .with_component(Arc::new(Climate::from_parameters(sites())))
        .with_component(Arc::new(SoilWater::from_parameters(sites(), pfts(), N_LAYERS)))
        .with_component(Arc::new(Decomposition::from_parameters(sites(), N_LAYERS, 1)))
        .with_component(Arc::new(Production::from_parameters(
            sites(),
            pfts(),
            animal,
            N_LAYERS,
        )))
        .build()
        .expect("model builds")
}

/// Value of `name` at pixel `idx`, `None` when nodata.
pub fn at(state: &StateSnapshot, name: &str, idx: usize) -> Option<f64> {
    state.get(name).ok().and_then(|r| r.value(idx))
}
