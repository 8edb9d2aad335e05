use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {} at line {line}: {source}", path.display())]
    MalformedJson {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("timestamp {0}ms is out of range")]
    InvalidTimestamp(i64),

    #[error("store rejected write: {0}")]
    StoreWrite(#[source] rusqlite::Error),

    #[error("song lookup failed: {0}")]
    Lookup(#[source] rusqlite::Error),

    #[error("cannot open store at {}: {source}", path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store is not provisioned, table `{0}` is missing")]
    NotProvisioned(&'static str),

    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl EtlError {
    /// The file itself could not be read as line-delimited JSON.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            EtlError::Unreadable { .. } | EtlError::MalformedJson { .. }
        )
    }
}
