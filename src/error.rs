use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlattenError>;

/// Everything that can go wrong while reading or flattening a table.
///
/// All variants are fatal: nothing is skipped or repaired, the whole
/// `load`/`generate`/`flatten` call fails.
#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable archive {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },

    #[error("malformed record: {0}")]
    Csv(#[from] csv::Error),

    #[error("column `{column}`, row {row}: malformed JSON: {source}")]
    MalformedJson {
        column: String,
        row: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("column `{column}`, row {row}: expected a JSON object, found {found}")]
    NotAnObject {
        column: String,
        row: usize,
        found: &'static str,
    },

    #[error("column `{0}` not found in table")]
    MissingColumn(String),

    #[error("column `{0}` already exists in table")]
    ColumnCollision(String),

    #[error("column `{0}` appears more than once")]
    DuplicateColumn(String),

    #[error("table columns {found:?} do not match the header {expected:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("failed to write output: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to encode row: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("column `{column}` has {actual} rows, expected {expected}")]
    RaggedColumns {
        column: String,
        expected: usize,
        actual: usize,
    },
}

impl FlattenError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FlattenError::Io {
            path: path.into(),
            source,
        }
    }
}
