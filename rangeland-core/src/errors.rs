use std::path::PathBuf;
use thiserror::Error;

/// Error type for invalid configurations and failed runs.
///
/// Numerical edge cases inside a pixel (empty pools, nodata inputs, blocked
/// decomposition) never surface here. They are masked in the kernel that
/// produced them.
#[derive(Error, Debug)]
pub enum RangelandError {
    #[error("{0}")]
    Error(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Missing required {kind} input: {path}")]
    MissingInput { kind: String, path: PathBuf },
    #[error("Table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },
    #[error("Table '{table}' has no row for key {key}")]
    MissingParameterKey { table: String, key: u32 },
    #[error("Could not parse '{value}' in column '{column}' of table '{table}'")]
    InvalidValue {
        table: String,
        column: String,
        value: String,
    },
    #[error("At least 12 months of precipitation are required to compute annual totals, {supplied} supplied")]
    InsufficientPrecipitation { supplied: usize },
    #[error("State variable '{0}' is not available")]
    MissingStateVariable(String),
    #[error("Raster '{name}' has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Component {component} produced undeclared output '{variable}'")]
    UndeclaredOutput { component: String, variable: String },
    #[error("Variable '{variable}' required by {component} is not produced by any component")]
    MissingProducer { component: String, variable: String },
    #[error("The component graph contains a cycle through {0}")]
    ComponentCycle(String),
    #[error("I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience type for `Result<T, RangelandError>`.
pub type RangelandResult<T> = Result<T, RangelandError>;
