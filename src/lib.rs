//! Raster-based Century rangeland simulation.
//!
//! [`Simulation`] is the entry point: it validates a [`RunConfig`] against
//! the available inputs, derives the persistent parameters and then solves
//! the monthly component graph, writing state snapshots as it goes.
//!
//! Every configuration problem (a missing raster, table column or site code,
//! or less than a year of precipitation) is reported by [`Simulation::setup`]
//! before the first month is solved.

pub use rangeland_components as components;
pub use rangeland_core as core;

#[cfg(feature = "python")]
mod python;

use log::{info, warn};
use rangeland_components::components::{Climate, Decomposition, Production, SoilWater};
use rangeland_components::names::{
    self, ANIMAL_DENSITY, ANNUAL_PRECIP, BULK_DENSITY, CLAY, LATITUDE, MAX_TEMP, MIN_TEMP, PH,
    PRECIP, SAND, SILT, SITE_INDEX,
};
use rangeland_components::persistent::PersistentParameters;
use rangeland_core::config::RunConfig;
use rangeland_core::drivers::{annual_window, month_sequence, DriverCatalog};
use rangeland_core::errors::{RangelandError, RangelandResult};
use rangeland_core::io::{initial_condition_path, snapshot_path, RasterStore, TableStore};
use rangeland_core::model::{Model, ModelBuilder};
use rangeland_core::raster::{Raster, TARGET_NODATA};
use rangeland_core::state::StateSnapshot;
use rangeland_core::tables::{
    AnimalParameters, ParameterTable, PftParameters, SiteParameters, ANIMAL_KEY, PFT_KEY,
    SITE_KEY,
};
use rangeland_core::variable::{all_state_variable_names, MAX_SOIL_LAYERS};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// A validated run, ready to be solved.
#[derive(Debug)]
pub struct Simulation {
    config: RunConfig,
    pfts: Vec<u32>,
    n_layers: usize,
    catalog: DriverCatalog,
    model: Model,
    persistent: StateSnapshot,
    initial: StateSnapshot,
    shape: (usize, usize),
}

impl Simulation {
    /// Load tables and rasters and check every input the run will need.
    pub fn setup(
        config: RunConfig,
        rasters: &dyn RasterStore,
        tables: &dyn TableStore,
    ) -> RangelandResult<Self> {
        config.validate()?;

        let sites = ParameterTable::<SiteParameters>::from_raw(
            &tables.load_table(&config.site_param_table, SITE_KEY)?,
        )?;
        let pft_table = ParameterTable::<PftParameters>::from_raw(
            &tables.load_table(&config.veg_trait_path, PFT_KEY)?,
        )?;
        let animal = load_animal(&config, tables)?;
        let pfts = pft_table.keys();
        if pfts.is_empty() {
            return Err(RangelandError::InvalidConfig(
                "the vegetation trait table has no rows".into(),
            ));
        }

        let mut soil = StateSnapshot::new();
        for (name, path) in [
            (BULK_DENSITY, &config.bulk_density_path),
            (PH, &config.ph_path),
            (SAND, &config.sand_proportion_path),
            (SILT, &config.silt_proportion_path),
            (CLAY, &config.clay_proportion_path),
            (SITE_INDEX, &config.site_param_spatial_index_path),
        ] {
            soil.insert(name, read_required(rasters, path, name)?);
        }
        let shape = soil
            .shape()
            .ok_or_else(|| RangelandError::Error("no soil rasters were read".into()))?;
        soil.check_shapes(shape)?;
        check_site_codes(soil.get(SITE_INDEX)?, &sites)?;

        let latitude = rasters.info(&config.site_param_spatial_index_path)?.latitude_raster();
        soil.insert(LATITUDE, latitude);
        for pft in &pfts {
            let path = config.veg_cover_path(*pft);
            soil.insert(names::pft_cover(*pft), read_required(rasters, &path, "vegetation cover")?);
        }
        if let Some(path) = &config.animal_density_path {
            soil.insert(ANIMAL_DENSITY, read_required(rasters, path, "animal density")?);
        }
        soil.check_shapes(shape)?;

        let n_layers = sites
            .iter()
            .map(|(_, site)| site.n_layers())
            .max()
            .unwrap_or(MAX_SOIL_LAYERS);

        let steps = month_sequence(config.starting_year, config.starting_month, config.n_months);
        let catalog = DriverCatalog::discover(&config.driver_patterns(), &steps, rasters)?;

        let initial = load_initial_state(&config.initial_conditions_dir, rasters, n_layers, &pfts, shape)?;

        let derived = PersistentParameters::new(&sites).derive(&soil, &initial)?;
        let persistent = soil.overlay(&derived, |_| true);

        let model = ModelBuilder::new()
            .with_component(Arc::new(Climate::from_parameters(sites.clone())))
            .with_component(Arc::new(SoilWater::from_parameters(
                sites.clone(),
                pft_table.clone(),
                n_layers,
            )))
            .with_component(Arc::new(Decomposition::from_parameters(
                sites.clone(),
                n_layers,
                config.decomposition_iterations,
            )))
            .with_component(Arc::new(Production::from_parameters(
                sites,
                pft_table,
                animal,
                n_layers,
            )))
            .build()?;
        info!(
            "{} months on a {}x{} grid, {} soil layers, {} PFTs, {} decomposition iteration(s) per month",
            config.n_months, shape.0, shape.1, n_layers, pfts.len(), config.decomposition_iterations
        );

        Ok(Self {
            config,
            pfts,
            n_layers,
            catalog,
            model,
            persistent,
            initial,
            shape,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn persistent(&self) -> &StateSnapshot {
        &self.persistent
    }

    pub fn initial_state(&self) -> &StateSnapshot {
        &self.initial
    }

    /// Names of the state variables written to each snapshot.
    pub fn state_variable_names(&self) -> Vec<String> {
        all_state_variable_names(self.n_layers, &self.pfts)
    }

    /// Solve every month and return the final state.
    ///
    /// The final month's snapshot is always written; earlier ones only when
    /// `save_sv_rasters` is set.
    pub fn run(&self, rasters: &mut dyn RasterStore) -> RangelandResult<StateSnapshot> {
        let steps = self.catalog.steps();
        let precip: Vec<Raster> = self
            .catalog
            .precip_paths()
            .iter()
            .map(|path| rasters.read(path))
            .collect::<RangelandResult<_>>()?;

        let mut state = self.initial.clone();
        for step in steps {
            info!("month {}/{}: {}", step.index + 1, steps.len(), step.label());
            let drivers = self.month_drivers(step.index, &precip, rasters)?;
            state = self
                .model
                .solve_month(*step, &state, &self.persistent, &drivers)?
                .state;

            if self.config.save_sv_rasters || step.index + 1 == steps.len() {
                self.write_snapshot(rasters, step.index as i64, &state)?;
            }
        }
        info!("simulation complete, results in {:?}", self.config.workspace_dir);
        Ok(state)
    }

    /// Set up and run in one call.
    pub fn execute(
        config: RunConfig,
        rasters: &mut dyn RasterStore,
        tables: &dyn TableStore,
    ) -> RangelandResult<StateSnapshot> {
        let simulation = Self::setup(config, rasters, tables)?;
        simulation.run(rasters)
    }

    fn month_drivers(
        &self,
        index: usize,
        precip: &[Raster],
        rasters: &dyn RasterStore,
    ) -> RangelandResult<StateSnapshot> {
        let mut drivers = StateSnapshot::new();
        let window: Vec<&Raster> = precip[annual_window(index, precip.len())].iter().collect();
        drivers.insert(ANNUAL_PRECIP, Raster::sum(&window, TARGET_NODATA)?);
        drivers.insert(PRECIP, precip[index].clone());
        drivers.insert(MIN_TEMP, rasters.read(self.catalog.min_temp_path(index))?);
        drivers.insert(MAX_TEMP, rasters.read(self.catalog.max_temp_path(index))?);
        drivers.check_shapes(self.shape)?;
        Ok(drivers)
    }

    fn write_snapshot(
        &self,
        rasters: &mut dyn RasterStore,
        index: i64,
        state: &StateSnapshot,
    ) -> RangelandResult<()> {
        let workspace = &self.config.workspace_dir;
        let suffix = self.config.results_suffix();
        for name in self.state_variable_names() {
            let raster = state.get(&name)?;
            rasters.write(&snapshot_path(workspace, index, &name, suffix), raster)?;
        }
        Ok(())
    }
}

fn read_required(rasters: &dyn RasterStore, path: &Path, kind: &str) -> RangelandResult<Raster> {
    if !rasters.exists(path) {
        return Err(RangelandError::MissingInput {
            kind: kind.to_string(),
            path: path.to_path_buf(),
        });
    }
    rasters.read(path)
}

fn load_animal(
    config: &RunConfig,
    tables: &dyn TableStore,
) -> RangelandResult<Option<AnimalParameters>> {
    let (Some(_), Some(path), Some(id)) = (
        &config.animal_density_path,
        &config.animal_trait_path,
        config.animal_id,
    ) else {
        return Ok(None);
    };
    let table = ParameterTable::<AnimalParameters>::from_raw(&tables.load_table(path, ANIMAL_KEY)?)?;
    Ok(Some(table.require(id)?.clone()))
}

/// Every integral site code in the raster must have a row in the site table.
fn check_site_codes(index: &Raster, sites: &ParameterTable<SiteParameters>) -> RangelandResult<()> {
    let mut codes = BTreeSet::new();
    let mut fractional = 0;
    for idx in 0..index.len() {
        let Some(code) = index.value(idx) else {
            continue;
        };
        if code < 0.0 || code.fract() != 0.0 {
            fractional += 1;
            continue;
        }
        codes.insert(code as u32);
    }
    if fractional > 0 {
        warn!("{fractional} pixels have a site code that is not a whole number and will be nodata");
    }
    for code in codes {
        sites.require(code)?;
    }
    Ok(())
}

fn load_initial_state(
    dir: &Path,
    rasters: &dyn RasterStore,
    n_layers: usize,
    pfts: &[u32],
    shape: (usize, usize),
) -> RangelandResult<StateSnapshot> {
    let mut initial = StateSnapshot::new();
    for name in all_state_variable_names(n_layers, pfts) {
        let path = initial_condition_path(dir, &name);
        // rooting zone water is recomputed before it is first read
        let optional = pfts.iter().any(|pft| name == names::avh2o_1(*pft));
        if optional && !rasters.exists(&path) {
            initial.insert(name, Raster::filled(shape, 0.0, TARGET_NODATA));
            continue;
        }
        initial.insert(name, read_required(rasters, &path, "initial condition")?);
    }
    initial.check_shapes(shape)?;
    Ok(initial)
}
