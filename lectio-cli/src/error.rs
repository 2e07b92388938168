use capture_engine::{CaptureOutcome, SpecError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Spec(#[from] SpecError),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// The capture ran but ended in a terminal failure state.
    #[error("{0}")]
    Capture(CaptureOutcome),
}
