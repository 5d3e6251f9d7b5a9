/// Errors raised by the storage layer and settings validation.
#[derive(Debug, thiserror::Error)]
pub enum RangeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid crosshair color {0:?}, expected #rrggbb")]
    InvalidColor(String),

    #[error("{0}")]
    Custom(String),
}

/// Failures of the remote coaching call. All of them end in the fallback feedback.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("coach service returned status {0}")]
    Status(u16),

    #[error("malformed coach response: {0}")]
    Malformed(String),

    #[error("coach unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, RangeError>;
