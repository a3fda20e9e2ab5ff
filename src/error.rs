use std::path::PathBuf;

use crate::schemes::SchemeError;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Malformed sweep configuration. Always fatal.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("dataset {path}:{line}: {reason}")]
    Dataset {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{scheme} failed: {source}")]
    Scheme {
        scheme: &'static str,
        #[source]
        source: SchemeError,
    },

    #[error("table `{title}` has an unfilled cell at row {row}, column {col}")]
    IncompleteTable {
        title: String,
        row: usize,
        col: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub fn config(msg: impl Into<String>) -> Self {
        HarnessError::Config(msg.into())
    }
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
