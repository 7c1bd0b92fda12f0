//! Public facade of the camera arbitration service

use std::sync::Arc;

use bytes::Bytes;
use evs_core::{
    ActivityPresenter, BufferId, CallerId, CameraHal, DisplayPowerState, FrameBuffer, HalEvent,
    IdentityVerifier, RequestPriority, ServiceResult, ServiceState, ServiceStatus, ServiceType,
    SessionToken, StreamConsumer, StreamEvent, TokenError,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::bridge::TimerSlot;
use crate::broadcast::{ListenerId, StatusBroadcaster, StatusSubscription};
use crate::config::EvsConfig;
use crate::session::StreamSession;
use crate::token::TokenSlot;

/// Command restoring the configured rearview camera device
const DEFAULT_CAMERA_COMMAND: &str = "default";

/// The aggregate guarded by the service lock. Created once at service
/// start; mutated only while the lock is held.
pub(crate) struct ArbiterState {
    pub(crate) state: ServiceState,
    pub(crate) service_type: ServiceType,
    pub(crate) last_priority: RequestPriority,
    pub(crate) tokens: TokenSlot,
    pub(crate) session: StreamSession,
    pub(crate) last_hal_event: HalEvent,
    pub(crate) camera_override: Option<String>,
    pub(crate) activity_timer: TimerSlot,
    pub(crate) reconnect: TimerSlot,
}

impl ArbiterState {
    fn new() -> Self {
        Self {
            state: ServiceState::Unavailable,
            service_type: ServiceType::Rearview,
            last_priority: RequestPriority::Low,
            tokens: TokenSlot::default(),
            session: StreamSession::default(),
            last_hal_event: HalEvent::initial(),
            camera_override: None,
            activity_timer: TimerSlot::default(),
            reconnect: TimerSlot::default(),
        }
    }
}

pub(crate) struct ServiceInner {
    pub(crate) hal: Arc<dyn CameraHal>,
    pub(crate) presenter: Arc<dyn ActivityPresenter>,
    pub(crate) verifier: Arc<dyn IdentityVerifier>,
    pub(crate) config: EvsConfig,
    pub(crate) state: Mutex<ArbiterState>,
    pub(crate) broadcaster: StatusBroadcaster,
}

impl ServiceInner {
    pub(crate) fn flush_broadcasts(&self, broadcasts: Vec<ServiceStatus>) {
        for status in broadcasts {
            self.broadcaster.broadcast(status);
        }
    }
}

/// Arbitrates access to the extended-view camera among the automatic
/// vehicle-signal trigger, the privileged system viewer, and ordinary
/// clients.
///
/// The service is cheap to clone; clones share the same underlying state.
#[derive(Clone)]
pub struct EvsService {
    inner: Arc<ServiceInner>,
}

impl EvsService {
    pub fn new(
        hal: Arc<dyn CameraHal>,
        presenter: Arc<dyn ActivityPresenter>,
        verifier: Arc<dyn IdentityVerifier>,
        config: EvsConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                hal,
                presenter,
                verifier,
                config,
                state: Mutex::new(ArbiterState::new()),
                broadcaster: StatusBroadcaster::default(),
            }),
        }
    }

    /// Connect to the camera hardware, retrying on a fixed interval until
    /// it becomes reachable.
    pub fn init(&self) {
        self.inner.connect_to_hal_if_necessary();
    }

    /// Tear down the service: cancel timers, stop any active stream, and
    /// drop all status listeners. The service stays usable but reports
    /// UNAVAILABLE afterwards.
    pub fn shutdown(&self) {
        {
            let mut st = self.inner.state.lock();
            st.reconnect.cancel();
            st.activity_timer.cancel();
            self.inner.stop_session_locked(&mut st);
            st.state = ServiceState::Unavailable;
        }
        self.inner.broadcaster.clear();
        info!("Camera service released");
    }

    /// Subscribe to `(service_type, state)` change notifications.
    pub fn register_status_listener(&self) -> StatusSubscription {
        self.inner.broadcaster.register()
    }

    pub fn unregister_status_listener(&self, id: ListenerId) {
        self.inner.broadcaster.unregister(id);
    }

    /// Ask the system to present the viewer for the given service type.
    pub fn start_activity(&self, service_type: ServiceType) -> ServiceResult {
        self.inner.execute(
            RequestPriority::Normal,
            ServiceState::Requested,
            Some(service_type),
            None,
            None,
        )
    }

    /// Cancel a pending activity request, or stop the stream it led to.
    pub fn stop_activity(&self) -> ServiceResult {
        let consumer = self.inner.state.lock().session.consumer().cloned();
        self.inner.execute(
            RequestPriority::Normal,
            ServiceState::Inactive,
            None,
            None,
            consumer.as_ref(),
        )
    }

    /// Start a video stream for `service_type`, delivering frames and
    /// stream events to `consumer`.
    ///
    /// The request is treated as privileged (HIGH priority) only when
    /// `token` matches the live session token; any other token, or none,
    /// makes this a LOW-priority request.
    pub fn start_video_stream(
        &self,
        service_type: ServiceType,
        token: Option<&SessionToken>,
        consumer: StreamConsumer,
    ) -> ServiceResult {
        let priority = {
            let mut st = self.inner.state.lock();
            if st.tokens.matches(token) {
                // The awaited privileged client showed up in time.
                st.activity_timer.cancel();
                RequestPriority::High
            } else {
                RequestPriority::Low
            }
        };

        self.inner.execute(
            priority,
            ServiceState::Active,
            Some(service_type),
            token,
            Some(&consumer),
        )
    }

    /// Stop the video stream. Ignored when `consumer` is not the currently
    /// registered one.
    pub fn stop_video_stream(&self, consumer: &StreamConsumer) {
        self.inner.stop_stream_if_current(consumer);
    }

    /// Return a consumed frame buffer to the camera hardware.
    pub fn return_frame_buffer(&self, buffer_id: BufferId) {
        let known = self.inner.state.lock().session.ledger.release(buffer_id);
        if known {
            self.inner.hal.release_buffer(buffer_id);
        }
    }

    pub fn current_status(&self) -> ServiceStatus {
        let st = self.inner.state.lock();
        ServiceStatus {
            service_type: st.service_type,
            state: st.state,
        }
    }

    /// Mint a session token for the privileged system caller.
    ///
    /// Identity verification is a precondition: a caller that fails it
    /// receives an error and no token is minted, leaving any live token
    /// untouched.
    pub fn generate_session_token(&self, caller: CallerId) -> Result<SessionToken, TokenError> {
        if !self.inner.verifier.is_privileged(caller) {
            warn!(caller, "Declining a session token request");
            return Err(TokenError::NotPrivileged(caller));
        }

        let token = self.inner.state.lock().tokens.mint();
        debug!(caller, %token, "Session token minted");
        Ok(token)
    }

    /// Whether a given service type can currently be served.
    pub fn is_service_type_supported(&self, service_type: ServiceType) -> bool {
        match service_type {
            ServiceType::Rearview => self.inner.hal.is_connected(),
            ServiceType::Surroundview => false,
        }
    }

    /// Override the rearview camera device; `"default"` restores the
    /// configured one.
    pub fn set_rearview_camera_id(&self, camera_id: &str) {
        let mut st = self.inner.state.lock();
        if camera_id.eq_ignore_ascii_case(DEFAULT_CAMERA_COMMAND) {
            st.camera_override = None;
            info!("Using the configured rearview camera device");
        } else {
            st.camera_override = Some(camera_id.to_string());
            info!(camera_id, "Rearview camera device overridden");
        }
    }

    /// The camera device currently used for the rearview service type.
    pub fn rearview_camera_id(&self) -> String {
        self.inner
            .state
            .lock()
            .camera_override
            .clone()
            .unwrap_or_else(|| self.inner.config.rearview_camera_id.clone())
    }

    // =========================================================================
    // HAL callback surface
    // =========================================================================

    /// A frame arrived from the camera hardware. Buffers nobody consumes
    /// are released back to the HAL immediately.
    pub fn on_frame(&self, buffer_id: BufferId, data: Bytes) {
        let taken = {
            let mut st = self.inner.state.lock();
            st.session.forward_frame(FrameBuffer {
                id: buffer_id,
                data,
            })
        };

        if !taken {
            debug!(buffer_id, "Returning frame buffer; no client is using it");
            self.inner.hal.release_buffer(buffer_id);
        }
    }

    /// A stream event arrived from the camera hardware.
    pub fn on_stream_event(&self, event: StreamEvent) {
        self.inner.state.lock().session.notify_event(event);
    }

    /// The camera hardware session died.
    pub fn on_hal_death(&self) {
        self.inner.handle_hal_death();
    }

    /// A vehicle signal (e.g. gear selection) arrived.
    pub fn on_external_signal(&self, service_type: ServiceType, active: bool, timestamp_ns: i64) {
        self.inner
            .handle_external_signal(service_type, active, timestamp_ns);
    }

    /// The primary display changed power state.
    pub fn on_display_event(&self, state: DisplayPowerState) {
        self.inner.handle_display_event(state);
    }
}
