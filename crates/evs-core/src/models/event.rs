//! External activation signals observed from the vehicle

use crate::models::ServiceType;

/// The last externally observed hardware/vehicle signal.
///
/// Signals are monotonic by timestamp; a repeated or out-of-order delivery
/// is discarded by the event bridge. The stored event also decides whether
/// the viewer activity must be re-requested after a hardware recovery or a
/// consumer death.
#[derive(Debug, Clone, Copy)]
pub struct HalEvent {
    /// Monotonic timestamp of the signal, in nanoseconds
    pub timestamp_ns: i64,
    pub service_type: ServiceType,
    /// True when the signal asks for the viewer activity to be shown
    pub requesting_activity: bool,
}

impl HalEvent {
    /// Zero-timestamp placeholder installed before any real signal arrives,
    /// so a signal that fired before the service was ready still compares
    /// newer than the initial state.
    pub fn initial() -> Self {
        Self {
            timestamp_ns: 0,
            service_type: ServiceType::Rearview,
            requesting_activity: false,
        }
    }
}
