//! Service state, request priority, and status snapshot types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle states of the camera service.
///
/// The machine starts in `Unavailable` and cycles between these states for
/// the lifetime of the process; there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    /// No usable connection to the camera hardware; every request is declined
    Unavailable,
    /// Connected to the camera hardware and ready for service requests
    Inactive,
    /// A privileged client has been asked to present the viewer activity
    Requested,
    /// A video stream is being delivered to the registered consumer
    Active,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Unavailable => "UNAVAILABLE",
            ServiceState::Inactive => "INACTIVE",
            ServiceState::Requested => "REQUESTED",
            ServiceState::Active => "ACTIVE",
        };
        f.write_str(s)
    }
}

/// Priority attached to a service request.
///
/// The ordering is total (`Low < Normal < High`) and is used both as an
/// admission threshold and as a tie-breaker: a request below the last
/// granted priority cannot displace the current grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPriority {
    Low,
    Normal,
    High,
}

/// Logical camera views the service can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Rearview,
    Surroundview,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceType::Rearview => "rearview",
            ServiceType::Surroundview => "surroundview",
        };
        f.write_str(s)
    }
}

/// Snapshot of the service, as returned by `current_status` and delivered
/// to status listeners on every committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service_type: ServiceType,
    pub state: ServiceState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_is_total() {
        assert!(RequestPriority::Low < RequestPriority::Normal);
        assert!(RequestPriority::Normal < RequestPriority::High);
        assert!(RequestPriority::High > RequestPriority::Low);
    }
}
