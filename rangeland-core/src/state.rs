//! Immutable monthly state snapshots.
//!
//! A month reads the previous snapshot and writes a new one. Rasters are
//! shared between snapshots through `Arc`, so carrying an unchanged
//! variable forward is free and nothing is ever modified in place.

use crate::drivers::MonthStep;
use crate::errors::{RangelandError, RangelandResult};
use crate::raster::Raster;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A named set of rasters sharing one grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    rasters: BTreeMap<String, Arc<Raster>>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, raster: Raster) {
        self.rasters.insert(name.into(), Arc::new(raster));
    }

    pub fn insert_shared(&mut self, name: impl Into<String>, raster: Arc<Raster>) {
        self.rasters.insert(name.into(), raster);
    }

    pub fn get(&self, name: &str) -> RangelandResult<&Raster> {
        self.try_get(name)
            .ok_or_else(|| RangelandError::MissingStateVariable(name.to_string()))
    }

    pub fn try_get(&self, name: &str) -> Option<&Raster> {
        self.rasters.get(name).map(|r| r.as_ref())
    }

    pub fn shared(&self, name: &str) -> Option<Arc<Raster>> {
        self.rasters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rasters.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.rasters.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<Raster>)> {
        self.rasters.iter()
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    /// Shape shared by the rasters, if any are present.
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.rasters.values().next().map(|r| r.shape())
    }

    /// Check that every raster has the same shape.
    pub fn check_shapes(&self, expected: (usize, usize)) -> RangelandResult<()> {
        for (name, raster) in self.rasters.iter() {
            raster.check_shape(name, expected)?;
        }
        Ok(())
    }

    /// Build the next snapshot.
    ///
    /// Every variable in `self` is carried forward, replaced by the version in
    /// `updates` where one exists. Updates for names not already present are
    /// only included when `admit` accepts them.
    pub fn overlay(&self, updates: &StateSnapshot, admit: impl Fn(&str) -> bool) -> StateSnapshot {
        let mut next = self.clone();
        for (name, raster) in updates.rasters.iter() {
            if next.rasters.contains_key(name) || admit(name) {
                next.rasters.insert(name.clone(), raster.clone());
            }
        }
        next
    }
}

impl FromIterator<(String, Raster)> for StateSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, Raster)>>(iter: T) -> Self {
        Self {
            rasters: iter.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        }
    }
}

/// Everything a component can read while solving one month.
///
/// - drivers: exogenous rasters for this month (climate, annual precipitation)
/// - persistent: time-invariant rasters (soil inputs and derived parameters)
/// - previous: the finalized state at the start of the month
/// - register: values written earlier in the same month
#[derive(Debug, Clone, Copy)]
pub struct MonthInputs<'a> {
    pub step: MonthStep,
    previous: &'a StateSnapshot,
    persistent: &'a StateSnapshot,
    drivers: &'a StateSnapshot,
    register: &'a StateSnapshot,
}

impl<'a> MonthInputs<'a> {
    pub fn new(
        step: MonthStep,
        previous: &'a StateSnapshot,
        persistent: &'a StateSnapshot,
        drivers: &'a StateSnapshot,
        register: &'a StateSnapshot,
    ) -> Self {
        Self {
            step,
            previous,
            persistent,
            drivers,
            register,
        }
    }

    pub fn driver(&self, name: &str) -> RangelandResult<&'a Raster> {
        self.drivers.get(name)
    }

    pub fn persistent(&self, name: &str) -> RangelandResult<&'a Raster> {
        self.persistent.get(name)
    }

    pub fn try_persistent(&self, name: &str) -> Option<&'a Raster> {
        self.persistent.try_get(name)
    }

    /// State at the start of the month.
    pub fn previous(&self, name: &str) -> RangelandResult<&'a Raster> {
        self.previous.get(name)
    }

    /// A value produced earlier in this month.
    pub fn input(&self, name: &str) -> RangelandResult<&'a Raster> {
        self.register.get(name)
    }

    /// The most recent version of a state variable.
    ///
    /// Falls back to the previous month when nothing has rewritten it yet.
    pub fn latest(&self, name: &str) -> RangelandResult<&'a Raster> {
        match self.register.try_get(name) {
            Some(r) => Ok(r),
            None => self.previous.get(name),
        }
    }

    /// Grid shape for the run.
    pub fn shape(&self) -> RangelandResult<(usize, usize)> {
        self.previous
            .shape()
            .or_else(|| self.persistent.shape())
            .ok_or_else(|| RangelandError::Error("No rasters available to define the grid".into()))
    }
}
