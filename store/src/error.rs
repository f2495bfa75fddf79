use thiserror::Error;

use crate::models::RecordKind;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("fixture {name}: {source}")]
    Fixture {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(kind: RecordKind, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, StoreError>;
