use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "firestore")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Conference not found: {0}")]
    NotFound(String),

    #[error("Malformed conference {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    /// The document changed after it was read; the write was not applied.
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgarError {
    /// Failures that a later reconciliation tick may succeed past.
    pub fn is_transient(&self) -> bool {
        match self {
            AgarError::Io(_)
            | AgarError::StoreUnavailable(_)
            | AgarError::PermissionDenied(_)
            | AgarError::Conflict(_)
            | AgarError::Timeout(_) => true,
            #[cfg(feature = "firestore")]
            AgarError::Http(_) => true,
            AgarError::Serialization(_)
            | AgarError::NotFound(_)
            | AgarError::MalformedRecord { .. }
            | AgarError::Internal(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgarError>;
