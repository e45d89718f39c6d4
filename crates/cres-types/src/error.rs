use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Physics constraint violated: {0}")]
    PhysicsViolation(String),

    #[error("Track aborted: {0}")]
    TrackAborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TrackResult<T> = Result<T, TrackError>;
