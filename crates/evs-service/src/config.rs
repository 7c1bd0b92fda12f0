//! Camera service configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the extended-view camera service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvsConfig {
    /// Camera device served for the rearview service type
    #[serde(default = "default_rearview_camera_id")]
    pub rearview_camera_id: String,

    /// How long to wait for a stream-start request after asking the system
    /// viewer to launch, in milliseconds
    #[serde(default = "default_activity_request_timeout_ms")]
    pub activity_request_timeout_ms: u64,

    /// Interval between camera-hardware reconnect attempts, in milliseconds
    #[serde(default = "default_hal_reconnect_interval_ms")]
    pub hal_reconnect_interval_ms: u64,
}

fn default_rearview_camera_id() -> String {
    "/dev/video-rearview".to_string()
}

fn default_activity_request_timeout_ms() -> u64 {
    3000
}

fn default_hal_reconnect_interval_ms() -> u64 {
    1000
}

impl Default for EvsConfig {
    fn default() -> Self {
        Self {
            rearview_camera_id: default_rearview_camera_id(),
            activity_request_timeout_ms: default_activity_request_timeout_ms(),
            hal_reconnect_interval_ms: default_hal_reconnect_interval_ms(),
        }
    }
}

impl EvsConfig {
    pub fn activity_request_timeout(&self) -> Duration {
        Duration::from_millis(self.activity_request_timeout_ms)
    }

    pub fn hal_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.hal_reconnect_interval_ms)
    }
}
