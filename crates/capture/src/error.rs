use thiserror::Error;

/// Raised when the run's cancellation token fires inside a suspension
/// point. Carries the phase for the operator-facing report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("capture cancelled while {phase}")]
pub struct Cancelled {
    pub phase: &'static str,
}

impl Cancelled {
    pub fn during(phase: &'static str) -> Self {
        Self { phase }
    }
}
