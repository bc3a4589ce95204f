use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("failed reading taxonomy at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed taxonomy csv in {source_name}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },
    #[error("malformed taxonomy json in {source_name}")]
    Json {
        source_name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("taxonomy {0} contains no usable rules")]
    Empty(String),
}
