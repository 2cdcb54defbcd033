use thiserror::Error;

use crate::common::error::SbatchError::GenericError;

#[derive(Debug, Error)]
pub enum SbatchError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Submission rejected by Slurm: {0}")]
    SchedulerRejected(String),
    #[error("Cannot query Slurm job status: {0}")]
    SchedulerQuery(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Error: {0}")]
    GenericError(String),
}

impl From<serde_json::error::Error> for SbatchError {
    fn from(e: serde_json::error::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<anyhow::Error> for SbatchError {
    fn from(error: anyhow::Error) -> Self {
        Self::GenericError(error.to_string())
    }
}

impl From<String> for SbatchError {
    fn from(e: String) -> Self {
        GenericError(e)
    }
}

pub fn invalid_input<T>(message: String) -> crate::Result<T> {
    Err(SbatchError::InvalidInput(message))
}
