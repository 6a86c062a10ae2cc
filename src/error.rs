#![allow(dead_code)]
use thiserror::Error;

/// Crate-wide error kind for operations the control loop and its ports can fail with.
///
/// Subsystems that have a narrower failure mode of their own (schedule validation, TOU
/// segment bounds) keep a local `thiserror` enum and convert into this one at the boundary
/// where the control loop calls them.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or out-of-domain input to the DP optimizer, Time Grid, or TOU compiler.
    /// Raised immediately, never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A sensor reading or price list was unavailable. The affected tick aborts without
    /// mutating state.
    #[error("missing data: {0}")]
    MissingData(String),

    /// Adapter-level I/O failure (sensor, inverter, price feed).
    #[error("io error: {0}")]
    Io(String),

    /// Adapter-level timeout.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Settings update rejected; previous settings remain in effect.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<crate::tou::segment::TouValidationError> for CoreError {
    fn from(e: crate::tou::segment::TouValidationError) -> Self {
        CoreError::InvalidInput(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
