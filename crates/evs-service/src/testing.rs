//! Mock collaborators for exercising the service without real hardware
//!
//! These live in `src/` (not behind `#[cfg(test)]`) so integration tests
//! and the demo daemon can drive the service end to end.

use std::sync::atomic::{AtomicBool, Ordering};

use evs_core::{
    ActivityPresenter, BufferId, CallerId, CameraHal, IdentityVerifier, ServiceType, SessionToken,
};
use parking_lot::Mutex;
use tracing::debug;

/// Mock camera HAL with scriptable failure points and call recording
#[derive(Default)]
pub struct MockCameraHal {
    connected: AtomicBool,
    streaming: AtomicBool,
    fail_connect: AtomicBool,
    fail_open: AtomicBool,
    fail_start: AtomicBool,
    opened: Mutex<Vec<String>>,
    released: Mutex<Vec<BufferId>>,
}

impl MockCameraHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `connect_if_necessary` fail until cleared
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make `open_camera` fail until cleared
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make `start_frame_delivery` fail until cleared
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Simulate a lost hardware session
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.streaming.store(false, Ordering::SeqCst);
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Every camera id passed to `open_camera`, in order
    pub fn opened_cameras(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    /// Every buffer id released back to the HAL, in order
    pub fn released_buffers(&self) -> Vec<BufferId> {
        self.released.lock().clone()
    }
}

impl CameraHal for MockCameraHal {
    fn connect_if_necessary(&self) -> bool {
        if self.fail_connect.load(Ordering::SeqCst) {
            return false;
        }
        self.connected.store(true, Ordering::SeqCst);
        true
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn open_camera(&self, camera_id: &str) -> bool {
        if self.fail_open.load(Ordering::SeqCst) {
            return false;
        }
        self.opened.lock().push(camera_id.to_string());
        true
    }

    fn close_camera(&self) {
        self.streaming.store(false, Ordering::SeqCst);
    }

    fn start_frame_delivery(&self) -> bool {
        if self.fail_start.load(Ordering::SeqCst) {
            return false;
        }
        self.streaming.store(true, Ordering::SeqCst);
        true
    }

    fn stop_frame_delivery(&self) {
        self.streaming.store(false, Ordering::SeqCst);
    }

    fn release_buffer(&self, buffer_id: BufferId) {
        debug!(buffer_id, "Mock HAL: buffer released");
        self.released.lock().push(buffer_id);
    }
}

/// Presenter that records every presentation request
#[derive(Default)]
pub struct RecordingPresenter {
    calls: Mutex<Vec<(ServiceType, Option<SessionToken>)>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(ServiceType, Option<SessionToken>)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// The token attached to the most recent presentation, if any
    pub fn last_token(&self) -> Option<SessionToken> {
        self.calls.lock().last().and_then(|(_, token)| token.clone())
    }
}

impl ActivityPresenter for RecordingPresenter {
    fn present(&self, service_type: ServiceType, token: Option<SessionToken>) {
        debug!(%service_type, with_token = token.is_some(), "Mock presenter: viewer requested");
        self.calls.lock().push((service_type, token));
    }
}

/// Verifier that accepts exactly one privileged caller id
pub struct StaticVerifier {
    privileged: CallerId,
}

impl StaticVerifier {
    pub fn new(privileged: CallerId) -> Self {
        Self { privileged }
    }
}

impl IdentityVerifier for StaticVerifier {
    fn is_privileged(&self, caller: CallerId) -> bool {
        caller == self.privileged
    }
}
