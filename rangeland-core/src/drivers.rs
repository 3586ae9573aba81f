//! Monthly calendar and discovery of climate driver rasters.
//!
//! Driver rasters are located through path patterns containing `<year>` and
//! `<month>` tokens (the month is zero-padded to two digits). All files are
//! located before the first month runs, so a missing file fails the run
//! up front rather than part way through.

use crate::errors::{RangelandError, RangelandResult};
use crate::io::RasterStore;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::PathBuf;

/// Number of months summed for annual precipitation.
pub const MONTHS_PER_YEAR: usize = 12;

/// One simulated month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthStep {
    /// Zero-based position in the run
    pub index: usize,
    pub year: i32,
    /// Calendar month, 1..=12
    pub month: u32,
}

impl MonthStep {
    pub fn new(index: usize, year: i32, month: u32) -> Self {
        Self { index, year, month }
    }

    /// The step `index` months after `start_year`/`start_month`.
    pub fn offset(start_year: i32, start_month: u32, index: usize) -> Self {
        let zero_based = (start_month as i64 - 1) + index as i64;
        let year = start_year + zero_based.div_euclid(12) as i32;
        let month = zero_based.rem_euclid(12) as u32 + 1;
        Self { index, year, month }
    }

    pub fn label(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }
}

/// The consecutive months simulated by a run.
pub fn month_sequence(start_year: i32, start_month: u32, n_months: usize) -> Vec<MonthStep> {
    (0..n_months)
        .map(|i| MonthStep::offset(start_year, start_month, i))
        .collect()
}

/// Replace `<year>` and `<month>` tokens in a path pattern.
pub fn substitute_date(pattern: &str, year: i32, month: u32) -> PathBuf {
    PathBuf::from(
        pattern
            .replace("<year>", &year.to_string())
            .replace("<month>", &format!("{:02}", month)),
    )
}

/// Path patterns for the monthly climate drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverPatterns {
    pub precip: String,
    pub min_temp: String,
    pub max_temp: String,
}

/// Resolved driver files for every simulated month.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverCatalog {
    steps: Vec<MonthStep>,
    /// Consecutive precipitation files starting at the first simulated month
    precip: Vec<PathBuf>,
    min_temp: Vec<PathBuf>,
    max_temp: Vec<PathBuf>,
}

impl DriverCatalog {
    /// Locate every driver file, failing on the first one that is missing.
    ///
    /// Precipitation is probed beyond the simulated months, up to eleven
    /// months past the end, so that annual totals can look ahead.
    pub fn discover(
        patterns: &DriverPatterns,
        steps: &[MonthStep],
        store: &dyn RasterStore,
    ) -> RangelandResult<Self> {
        let first = steps
            .first()
            .ok_or_else(|| RangelandError::InvalidConfig("At least one month must be simulated".into()))?;

        let probe_len = steps.len() + MONTHS_PER_YEAR - 1;
        let mut precip = Vec::new();
        for i in 0..probe_len {
            let step = MonthStep::offset(first.year, first.month, i);
            let path = substitute_date(&patterns.precip, step.year, step.month);
            if !store.exists(&path) {
                break;
            }
            precip.push(path);
        }
        if precip.len() < MONTHS_PER_YEAR {
            return Err(RangelandError::InsufficientPrecipitation {
                supplied: precip.len(),
            });
        }
        if precip.len() < steps.len() {
            let missing = &steps[precip.len()];
            return Err(RangelandError::MissingInput {
                kind: "precipitation".into(),
                path: substitute_date(&patterns.precip, missing.year, missing.month),
            });
        }

        let mut min_temp = Vec::with_capacity(steps.len());
        let mut max_temp = Vec::with_capacity(steps.len());
        for step in steps {
            for (pattern, kind, out) in [
                (&patterns.min_temp, "minimum temperature", &mut min_temp),
                (&patterns.max_temp, "maximum temperature", &mut max_temp),
            ] {
                let path = substitute_date(pattern, step.year, step.month);
                if !store.exists(&path) {
                    return Err(RangelandError::MissingInput {
                        kind: kind.into(),
                        path,
                    });
                }
                out.push(path);
            }
        }

        Ok(Self {
            steps: steps.to_vec(),
            precip,
            min_temp,
            max_temp,
        })
    }

    pub fn steps(&self) -> &[MonthStep] {
        &self.steps
    }

    pub fn precip_path(&self, index: usize) -> &PathBuf {
        &self.precip[index]
    }

    /// Every supplied precipitation file, including look-ahead months.
    pub fn precip_paths(&self) -> &[PathBuf] {
        &self.precip
    }

    pub fn min_temp_path(&self, index: usize) -> &PathBuf {
        &self.min_temp[index]
    }

    pub fn max_temp_path(&self, index: usize) -> &PathBuf {
        &self.max_temp[index]
    }

    /// Paths of the twelve precipitation rasters summed for month `index`.
    pub fn annual_precip_paths(&self, index: usize) -> &[PathBuf] {
        &self.precip[annual_window(index, self.precip.len())]
    }
}

/// Indices of the twelve months whose precipitation forms the annual total.
///
/// The window starts at `index` and is shifted back so that it ends at the
/// last supplied month when fewer than twelve months remain.
pub fn annual_window(index: usize, supplied: usize) -> Range<usize> {
    let start = index.min(supplied.saturating_sub(MONTHS_PER_YEAR));
    start..(start + MONTHS_PER_YEAR).min(supplied)
}
