use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed time value: '{0}'")]
    MalformedTime(String),
    #[error("Unknown stop: {0}")]
    UnknownStop(String),
    #[error("No path found from {from} to {to}")]
    NotFound { from: String, to: String },
    #[error("Graph cache unavailable: {0}")]
    CacheUnavailable(String),
    #[error("Graph cache is stale: {0}")]
    CacheStale(String),
    #[error("No timetable entry matches {from} -> {to}")]
    MissingTimetableMatch { from: String, to: String },
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}
