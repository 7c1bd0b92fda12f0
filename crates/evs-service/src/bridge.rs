//! Event bridge: converts external signals (vehicle properties, display
//! power, hardware death) and timer firings into prioritized transition
//! requests against the state machine.

use std::sync::Arc;

use evs_core::{
    DisplayPowerState, HalEvent, RequestPriority, ServiceState, ServiceStatus, ServiceType,
    StreamConsumer,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::machine::requires_activity;
use crate::service::{ArbiterState, ServiceInner};

/// One delayed-execution slot. Arming replaces (and aborts) whatever was
/// armed before, so a purpose never has two live timers. Cancellation is
/// best-effort: a firing that races an abort is tolerated because every
/// handler re-checks state under the lock before acting.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn arm(&mut self, handle: JoinHandle<()>) {
        self.cancel();
        self.handle = Some(handle);
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl ServiceInner {
    /// Record an external activation signal and drive the machine
    /// accordingly. Signals at or before the last seen timestamp are
    /// duplicates and are dropped.
    pub(crate) fn handle_external_signal(
        self: &Arc<Self>,
        service_type: ServiceType,
        active: bool,
        timestamp_ns: i64,
    ) {
        let mut broadcasts = Vec::new();
        {
            let mut st = self.state.lock();
            if timestamp_ns <= st.last_hal_event.timestamp_ns {
                debug!(
                    timestamp_ns,
                    last_ns = st.last_hal_event.timestamp_ns,
                    "Ignoring stale external signal"
                );
                return;
            }

            st.last_hal_event = HalEvent {
                timestamp_ns,
                service_type,
                requesting_activity: active,
            };

            if st.state == ServiceState::Unavailable {
                // No hardware to serve the request; the reconnect path
                // replays the stored event once the hardware returns.
                return;
            }

            let destination = if active {
                ServiceState::Requested
            } else {
                ServiceState::Inactive
            };
            let consumer = st.session.consumer().cloned();
            if let Err(e) = self.execute_locked(
                &mut st,
                RequestPriority::High,
                destination,
                Some(service_type),
                None,
                consumer.as_ref(),
                &mut broadcasts,
            ) {
                warn!(error = %e, "Failed to execute the signalled service request");
            }
        }
        self.flush_broadcasts(broadcasts);
    }

    /// The primary display changed power state: a dark display means
    /// nobody is watching the stream; a lit one may need the viewer back.
    pub(crate) fn handle_display_event(self: &Arc<Self>, state: DisplayPowerState) {
        match state {
            DisplayPowerState::On => {
                let mut broadcasts = Vec::new();
                {
                    let mut st = self.state.lock();
                    if !self.request_activity_if_necessary_locked(&mut st, &mut broadcasts) {
                        debug!("No viewer activity to relaunch");
                    }
                }
                self.flush_broadcasts(broadcasts);
            }
            DisplayPowerState::Off => {
                let consumer = self.state.lock().session.consumer().cloned();
                if let Some(consumer) = consumer {
                    self.stop_stream_if_current(&consumer);
                }
            }
        }
    }

    /// The hardware session died: drop to UNAVAILABLE and keep retrying
    /// the connection until it comes back.
    pub(crate) fn handle_hal_death(self: &Arc<Self>) {
        warn!("Lost the connection to the camera hardware");
        let _ = self.execute(
            RequestPriority::High,
            ServiceState::Unavailable,
            None,
            None,
            None,
        );
        self.connect_to_hal_if_necessary();
    }

    /// Try to promote the machine out of UNAVAILABLE; on failure, retry on
    /// a fixed interval until the hardware answers.
    pub(crate) fn connect_to_hal_if_necessary(self: &Arc<Self>) {
        debug!("Trying to connect to the camera hardware");
        if self
            .execute(
                RequestPriority::High,
                ServiceState::Inactive,
                None,
                None,
                None,
            )
            .is_ok()
        {
            return;
        }

        let weak = Arc::downgrade(self);
        let interval = self.config.hal_reconnect_interval();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(service) = weak.upgrade() else {
                    return;
                };
                debug!("Retrying the camera hardware connection");
                if service
                    .execute(
                        RequestPriority::High,
                        ServiceState::Inactive,
                        None,
                        None,
                        None,
                    )
                    .is_ok()
                {
                    return;
                }
            }
        });
        self.state.lock().reconnect.arm(handle);
    }

    /// A registered consumer's remote side became unreachable.
    pub(crate) fn handle_consumer_death(self: &Arc<Self>, consumer: &StreamConsumer) {
        let mut broadcasts = Vec::new();
        {
            let mut st = self.state.lock();
            if !st.session.is_current(consumer.id()) {
                // The session was already replaced or torn down.
                return;
            }

            if self.request_activity_if_necessary_locked(&mut st, &mut broadcasts) {
                info!("Requested to relaunch the viewer activity");
            } else if let Err(e) = self.execute_locked(
                &mut st,
                RequestPriority::High,
                ServiceState::Inactive,
                None,
                None,
                Some(consumer),
                &mut broadcasts,
            ) {
                warn!(error = %e, "Failed to stop the stream of a dead consumer");
            }
        }
        self.flush_broadcasts(broadcasts);
    }

    /// Relaunch the viewer activity when the machine still needs it, after
    /// a hardware recovery or a consumer death. Returns false when no
    /// relaunch is due.
    pub(crate) fn request_activity_if_necessary_locked(
        self: &Arc<Self>,
        st: &mut ArbiterState,
        broadcasts: &mut Vec<ServiceStatus>,
    ) -> bool {
        if !requires_activity(st) && !st.last_hal_event.requesting_activity {
            return false;
        }

        // Clean up whatever session remains, then ask for the viewer again.
        if let Err(e) = self.execute_locked(
            st,
            RequestPriority::High,
            ServiceState::Inactive,
            None,
            None,
            None,
            broadcasts,
        ) {
            warn!(error = %e, "Failed to reset before relaunching the activity");
        }

        let service = st.last_hal_event.service_type;
        if let Err(e) = self.execute_locked(
            st,
            RequestPriority::High,
            ServiceState::Requested,
            Some(service),
            None,
            None,
            broadcasts,
        ) {
            warn!(error = %e, "Failed to request the viewer activity");
        }
        true
    }

    /// Arm (or re-arm) the activity-request timeout.
    pub(crate) fn arm_activity_timeout(self: &Arc<Self>, st: &mut ArbiterState) {
        let weak = Arc::downgrade(self);
        let timeout = self.config.activity_request_timeout();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(service) = weak.upgrade() {
                service.handle_activity_request_timeout();
            }
        });
        st.activity_timer.arm(handle);
    }

    /// Nobody claimed the session within the timeout window: re-request
    /// the viewer if it is still needed, otherwise settle back to INACTIVE.
    fn handle_activity_request_timeout(self: &Arc<Self>) {
        let mut broadcasts = Vec::new();
        {
            let mut st = self.state.lock();
            match st.state {
                // The timer is only meaningful while waiting for a stream
                // start; anything else means a cancellation raced this
                // firing.
                ServiceState::Requested | ServiceState::Inactive => {}
                _ => return,
            }

            if self.request_activity_if_necessary_locked(&mut st, &mut broadcasts) {
                warn!("Activity request timed out; asking the viewer to launch again");
            } else if st.state == ServiceState::Requested {
                // Nobody needs the camera anymore.
                if let Err(e) = self.execute_locked(
                    &mut st,
                    RequestPriority::High,
                    ServiceState::Inactive,
                    None,
                    None,
                    None,
                    &mut broadcasts,
                ) {
                    warn!(error = %e, "Failed to settle an abandoned request");
                }
            }
        }
        self.flush_broadcasts(broadcasts);
    }
}
