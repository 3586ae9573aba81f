//! Collaborator interfaces for raster and table storage.
//!
//! GeoTIFF reading and writing, reprojection and alignment live outside this
//! crate. The model only needs the narrow [`RasterStore`] and [`TableStore`]
//! contracts defined here. [`MemoryRasterStore`] and [`CsvTableStore`] are
//! provided for embedding and testing.

use crate::errors::{RangelandError, RangelandResult};
use crate::raster::{Raster, RasterInfo};
use crate::tables::RawTable;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Read and write single-band float32 rasters.
pub trait RasterStore: Send + Sync {
    fn read(&self, path: &Path) -> RangelandResult<Raster>;
    fn write(&mut self, path: &Path, raster: &Raster) -> RangelandResult<()>;
    fn exists(&self, path: &Path) -> bool;
    fn info(&self, path: &Path) -> RangelandResult<RasterInfo>;
}

/// Load a lookup table keyed by an integer column.
pub trait TableStore {
    fn load_table(&self, path: &Path, key_column: &str) -> RangelandResult<RawTable>;
}

/// An in-memory raster store.
///
/// All rasters share one geotransform.
#[derive(Debug, Clone)]
pub struct MemoryRasterStore {
    rasters: HashMap<PathBuf, Raster>,
    pixel_size: (f64, f64),
    origin: (f64, f64),
}

impl Default for MemoryRasterStore {
    fn default() -> Self {
        Self {
            rasters: HashMap::new(),
            pixel_size: (1.0, -1.0),
            origin: (0.0, 0.0),
        }
    }
}

impl MemoryRasterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geotransform(mut self, pixel_size: (f64, f64), origin: (f64, f64)) -> Self {
        self.pixel_size = pixel_size;
        self.origin = origin;
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, raster: Raster) {
        self.rasters.insert(path.into(), raster);
    }

    pub fn get(&self, path: &Path) -> Option<&Raster> {
        self.rasters.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.rasters.keys()
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }
}

impl RasterStore for MemoryRasterStore {
    fn read(&self, path: &Path) -> RangelandResult<Raster> {
        self.rasters
            .get(path)
            .cloned()
            .ok_or_else(|| RangelandError::MissingInput {
                kind: "raster".into(),
                path: path.to_path_buf(),
            })
    }

    fn write(&mut self, path: &Path, raster: &Raster) -> RangelandResult<()> {
        self.rasters.insert(path.to_path_buf(), raster.clone());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.rasters.contains_key(path)
    }

    fn info(&self, path: &Path) -> RangelandResult<RasterInfo> {
        let raster = self.rasters.get(path).ok_or_else(|| RangelandError::MissingInput {
            kind: "raster".into(),
            path: path.to_path_buf(),
        })?;
        Ok(RasterInfo {
            pixel_size: self.pixel_size,
            origin: self.origin,
            shape: raster.shape(),
            nodata: raster.nodata(),
        })
    }
}

/// Reads comma-separated tables with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableStore;

impl TableStore for CsvTableStore {
    fn load_table(&self, path: &Path, key_column: &str) -> RangelandResult<RawTable> {
        let csv_err = |source| RangelandError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let table_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let row: BTreeMap<String, String> = headers
                .iter()
                .cloned()
                .zip(record.iter().map(|v| v.trim().to_string()))
                .collect();
            rows.push(row);
        }
        RawTable::from_rows(table_name, headers, rows, key_column)
    }
}

/// Directory holding the snapshot for month `index`.
///
/// The initial state is written as month `-1`.
pub fn snapshot_dir(workspace: &Path, index: i64) -> PathBuf {
    workspace.join(format!("state_variables_m{}", index))
}

/// Raster path of one state variable within a monthly snapshot.
pub fn snapshot_path(workspace: &Path, index: i64, name: &str, suffix: Option<&str>) -> PathBuf {
    let file = match suffix {
        Some(s) if !s.is_empty() => format!("{}_{}.tif", name, s),
        _ => format!("{}.tif", name),
    };
    snapshot_dir(workspace, index).join(file)
}

/// Path of the initial condition raster for a state variable.
///
/// `name` is already PFT-qualified for PFT-scoped variables.
pub fn initial_condition_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.tif", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::TARGET_NODATA;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn snapshot_naming() {
        let ws = Path::new("/tmp/run");
        assert_eq!(
            snapshot_path(ws, 3, "minerl_1_1", Some("scenario_a")),
            PathBuf::from("/tmp/run/state_variables_m3/minerl_1_1_scenario_a.tif")
        );
        assert_eq!(
            snapshot_path(ws, -1, "aglivc_2", None),
            PathBuf::from("/tmp/run/state_variables_m-1/aglivc_2.tif")
        );
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryRasterStore::new().with_geotransform((0.25, -0.25), (10.0, 5.0));
        let path = Path::new("a.tif");
        assert!(!store.exists(path));
        store
            .write(path, &Raster::filled((2, 3), 4.0, TARGET_NODATA))
            .unwrap();
        assert!(store.exists(path));
        let info = store.info(path).unwrap();
        assert_eq!(info.shape, (2, 3));
        assert_eq!(info.pixel_size, (0.25, -0.25));
        assert!(matches!(
            store.read(Path::new("b.tif")),
            Err(RangelandError::MissingInput { .. })
        ));
    }

    #[test]
    fn loads_csv_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("site.csv");
        fs::write(&path, "site,edepth,name\n1,0.2,upland\n2.0,0.3,valley\n").unwrap();
        let table = CsvTableStore.load_table(&path, "site").unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(table.value(2, "edepth").unwrap(), 0.3);
    }

    #[test]
    fn malformed_csv_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "site,edepth\n1").unwrap();
        assert!(CsvTableStore.load_table(&path, "site").is_err());
    }
}
