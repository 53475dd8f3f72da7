use std::path::PathBuf;
use thiserror::Error;

/// Failures the library reports to callers.
///
/// Bad data never ends up here: malformed lines are dropped and unparsable
/// values become sentinels. Only caller mistakes and I/O surface as errors.
#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("unknown metric field: '{0}'")]
    UnknownMetric(String),
    #[error("no metric fields supplied")]
    EmptyFieldList,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv write error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InsightsError>;
