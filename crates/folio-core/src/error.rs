use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("duration must be a non-negative number of seconds, got {0}")]
    InvalidDuration(f64),
}
