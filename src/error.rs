use std::io;

use thiserror::Error;

/// Errors returned by candidate generation
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The length window is empty or starts below zero
    #[error("invalid length range: min {min}, max {max} (require 0 <= min <= max)")]
    InvalidRange { min: i64, max: i64 },

    /// The output sink refused a write; candidates already written stay written
    #[error("failed to write candidate to output")]
    SinkWriteFailure(#[source] io::Error),
}

impl From<io::Error> for GenerateError {
    fn from(err: io::Error) -> Self {
        GenerateError::SinkWriteFailure(err)
    }
}
