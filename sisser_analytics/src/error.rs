use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The record source does not carry the expected column set.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A numeric field could not be parsed after decimal-comma substitution.
    #[error("cannot convert {value:?} in column {column} (row {row}) to a number")]
    Conversion {
        column: String,
        row: usize,
        value: String,
    },

    #[error("state {0:?} is not present in the snapshot")]
    UnknownState(String),

    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    GeoJson(#[from] geojson::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn missing_columns<S: AsRef<str>>(missing: &[S]) -> Self {
        let names: Vec<&str> = missing.iter().map(|s| s.as_ref()).collect();
        Self::SchemaMismatch(format!("missing columns [{}]", names.join(", ")))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
