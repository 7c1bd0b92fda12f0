//! Error taxonomy for camera service requests

use thiserror::Error;

use crate::platform::CallerId;

/// Errors returned synchronously to service callers.
///
/// A declined request leaves the machine's observable state unchanged;
/// status listeners only ever see broadcasts for committed transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Priority or ownership conflict; the request was declined
    #[error("service is busy with a higher priority client")]
    Busy,
    /// No usable connection to the camera hardware
    #[error("camera hardware is unavailable")]
    Unavailable,
}

/// Result type for service operations
pub type ServiceResult = Result<(), ServiceError>;

/// Session token issuance failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Only the distinguished system caller may mint session tokens
    #[error("caller {0} is not permitted to mint a session token")]
    NotPrivileged(CallerId),
}
