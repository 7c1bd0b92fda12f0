//! Priority arbitration state machine
//!
//! Every request funnels through [`ServiceInner::execute`]: the aggregate
//! lock is taken once, the transition handlers mutate state and drive the
//! camera HAL, and the statuses of committed transitions are collected for
//! broadcast after the lock is released.

use std::sync::Arc;

use evs_core::{
    RequestPriority, ServiceError, ServiceResult, ServiceState, ServiceStatus, ServiceType,
    SessionToken, StreamConsumer, StreamEvent,
};
use tracing::{debug, error, info, warn};

use crate::service::{ArbiterState, ServiceInner};
use crate::session::BoundConsumer;

/// True while the machine is reserved for the privileged viewer: ACTIVE or
/// REQUESTED under a high-priority grant.
pub(crate) fn requires_activity(st: &ArbiterState) -> bool {
    matches!(st.state, ServiceState::Active | ServiceState::Requested)
        && st.last_priority == RequestPriority::High
}

impl ServiceInner {
    /// Run one transition request, broadcasting any committed transitions
    /// after the lock is released.
    pub(crate) fn execute(
        self: &Arc<Self>,
        priority: RequestPriority,
        destination: ServiceState,
        service: Option<ServiceType>,
        token: Option<&SessionToken>,
        consumer: Option<&StreamConsumer>,
    ) -> ServiceResult {
        let mut broadcasts = Vec::new();
        let result = {
            let mut st = self.state.lock();
            self.execute_locked(
                &mut st,
                priority,
                destination,
                service,
                token,
                consumer,
                &mut broadcasts,
            )
        };
        self.flush_broadcasts(broadcasts);
        result
    }

    /// Transition entry point for callers already holding the lock (timer
    /// and death callbacks, and the internal recovery re-request). Pushes
    /// the status of each committed transition onto `broadcasts`; the
    /// caller must flush them once the lock is dropped.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn execute_locked(
        self: &Arc<Self>,
        st: &mut ArbiterState,
        priority: RequestPriority,
        destination: ServiceState,
        service: Option<ServiceType>,
        token: Option<&SessionToken>,
        consumer: Option<&StreamConsumer>,
        broadcasts: &mut Vec<ServiceStatus>,
    ) -> ServiceResult {
        let service = service.unwrap_or(st.service_type);

        // A lower-priority re-entry into a passive state changes nothing.
        if st.state == destination
            && priority < st.last_priority
            && matches!(
                destination,
                ServiceState::Unavailable | ServiceState::Inactive
            )
        {
            return Ok(());
        }

        let previous = st.state;
        debug!(from = %previous, to = %destination, ?priority, "Transition requested");

        let result = match destination {
            ServiceState::Unavailable => self.to_unavailable_locked(st),
            ServiceState::Inactive => self.to_inactive_locked(st, priority, service, consumer),
            ServiceState::Requested => self.to_requested_locked(st, priority, service),
            ServiceState::Active => self.to_active_locked(st, priority, service, token, consumer),
        };

        match result {
            Ok(()) => {
                // A pending activity timeout never survives leaving REQUESTED.
                if previous == ServiceState::Requested && st.state != ServiceState::Requested {
                    st.activity_timer.cancel();
                }
                info!(state = %st.state, service_type = %st.service_type, "Transition completed");
                broadcasts.push(ServiceStatus {
                    service_type: st.service_type,
                    state: st.state,
                });
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "Transition declined");
                Err(e)
            }
        }
    }

    /// Fired on hardware-session loss; always succeeds.
    fn to_unavailable_locked(&self, st: &mut ArbiterState) -> ServiceResult {
        if st.state != ServiceState::Unavailable {
            self.stop_session_locked(st);
        }
        st.state = ServiceState::Unavailable;
        Ok(())
    }

    fn to_inactive_locked(
        self: &Arc<Self>,
        st: &mut ArbiterState,
        priority: RequestPriority,
        service: ServiceType,
        consumer: Option<&StreamConsumer>,
    ) -> ServiceResult {
        match st.state {
            ServiceState::Unavailable => {
                if consumer.is_some() {
                    // A stop request raced a hardware loss; the session is
                    // already gone. Acknowledge and keep waiting for the
                    // hardware to come back.
                    st.session.unregister();
                    return Ok(());
                }

                if !self.hal.connect_if_necessary() {
                    return Err(ServiceError::Unavailable);
                }

                if requires_activity(st) || st.last_hal_event.requesting_activity {
                    // The viewer was (or should be) up when we lost the
                    // hardware; give clients one timeout window to claim
                    // the recovered session before re-requesting it.
                    self.arm_activity_timeout(st);
                }
            }
            ServiceState::Inactive => {}
            ServiceState::Requested => {
                if st.service_type != service || priority < st.last_priority {
                    return Err(ServiceError::Busy);
                }
                st.activity_timer.cancel();
            }
            ServiceState::Active => {
                if st.service_type != service || priority < st.last_priority {
                    return Err(ServiceError::Busy);
                }
                self.stop_session_locked(st);
            }
        }

        st.state = ServiceState::Inactive;
        st.tokens.clear();
        Ok(())
    }

    fn to_requested_locked(
        self: &Arc<Self>,
        st: &mut ArbiterState,
        priority: RequestPriority,
        service: ServiceType,
    ) -> ServiceResult {
        match st.state {
            ServiceState::Unavailable => {
                if !self.hal.connect_if_necessary() {
                    return Err(ServiceError::Unavailable);
                }
            }
            ServiceState::Inactive => {}
            ServiceState::Requested => {
                if priority < st.last_priority {
                    error!("Service is busy with a higher priority client");
                    return Err(ServiceError::Busy);
                }
            }
            ServiceState::Active => {
                if priority < st.last_priority {
                    return Err(ServiceError::Busy);
                } else if priority == st.last_priority {
                    // Already serving at this priority; the grant stands.
                    return Ok(());
                } else {
                    // Preemption: tell the lower-priority consumer its
                    // stream is over before the camera is handed away.
                    st.session.notify_event(StreamEvent::Stopped);
                }
            }
        }

        st.state = ServiceState::Requested;
        st.service_type = service;
        st.last_priority = priority;

        // The timer is reset on every successful (re-)entry; only a
        // high-priority reservation mints a token and waits for its holder.
        let token = if priority == RequestPriority::High {
            self.arm_activity_timeout(st);
            Some(st.tokens.mint())
        } else {
            st.activity_timer.cancel();
            None
        };

        self.presenter.present(service, token);
        Ok(())
    }

    fn to_active_locked(
        self: &Arc<Self>,
        st: &mut ArbiterState,
        priority: RequestPriority,
        service: ServiceType,
        token: Option<&SessionToken>,
        consumer: Option<&StreamConsumer>,
    ) -> ServiceResult {
        let Some(consumer) = consumer else {
            // A stream cannot start without somewhere to deliver it.
            return Err(ServiceError::Unavailable);
        };

        match st.state {
            ServiceState::Unavailable => return Err(ServiceError::Unavailable),
            ServiceState::Inactive => {
                self.start_session_locked(st, service, consumer)?;
            }
            ServiceState::Requested => {
                // Only the holder of the live token may claim a
                // high-priority reservation; a superseded token is stale.
                if priority == RequestPriority::High && !st.tokens.matches(token) {
                    return Err(ServiceError::Busy);
                }
                self.start_session_locked(st, service, consumer)?;
            }
            ServiceState::Active => {
                if priority < st.last_priority {
                    return Err(ServiceError::Busy);
                }

                // Hand the running stream over without restarting the
                // hardware session.
                if let Some(previous) = st.session.unregister() {
                    if !previous.notify_event(StreamEvent::Stopped) {
                        debug!("Previous stream consumer is already gone");
                    }
                }
                let bound = self.bind_consumer(consumer.clone());
                st.session.register(bound);
            }
        }

        st.state = ServiceState::Active;
        st.service_type = service;
        st.last_priority = priority;
        Ok(())
    }

    /// Open the camera for `service` and begin frame delivery to
    /// `consumer`. Any HAL failure maps to UNAVAILABLE.
    fn start_session_locked(
        self: &Arc<Self>,
        st: &mut ArbiterState,
        service: ServiceType,
        consumer: &StreamConsumer,
    ) -> ServiceResult {
        if service == ServiceType::Surroundview {
            // Only the rearview camera is wired up today.
            error!("Surround view is not supported yet");
            return Err(ServiceError::Unavailable);
        }

        if !self.hal.connect_if_necessary() {
            error!("Failed to connect to the camera hardware");
            return Err(ServiceError::Unavailable);
        }

        let camera_id = st
            .camera_override
            .clone()
            .unwrap_or_else(|| self.config.rearview_camera_id.clone());
        if !self.hal.open_camera(&camera_id) {
            error!(camera_id = %camera_id, "Failed to open the camera device");
            return Err(ServiceError::Unavailable);
        }

        let bound = self.bind_consumer(consumer.clone());
        st.session.register(bound);

        if !self.hal.start_frame_delivery() {
            error!("Failed to start frame delivery");
            st.session.unregister();
            self.hal.close_camera();
            return Err(ServiceError::Unavailable);
        }

        Ok(())
    }

    /// Tear the stream session down: unregister the consumer (telling it
    /// the stream stopped), stop frame delivery, bulk-release every
    /// outstanding buffer, cancel the pending activity timeout, and close
    /// the camera.
    pub(crate) fn stop_session_locked(&self, st: &mut ArbiterState) {
        if let Some(consumer) = st.session.unregister() {
            if !consumer.notify_event(StreamEvent::Stopped) {
                debug!("Stream consumer is already gone");
            }
            info!("Stream client has been disconnected");
        }

        self.hal.stop_frame_delivery();
        for id in st.session.drain_buffers() {
            self.hal.release_buffer(id);
        }

        st.activity_timer.cancel();
        self.hal.close_camera();
    }

    /// Attach the disconnect watch to a consumer before registering it.
    /// The watch fires at most once, when the remote receiver goes away;
    /// unregistration aborts it.
    pub(crate) fn bind_consumer(self: &Arc<Self>, consumer: StreamConsumer) -> BoundConsumer {
        let weak = Arc::downgrade(self);
        let watched = consumer.clone();
        let watch = tokio::spawn(async move {
            watched.disconnected().await;
            warn!(consumer_id = ?watched.id(), "Stream consumer has died");
            if let Some(service) = weak.upgrade() {
                service.handle_consumer_death(&watched);
            }
        });
        BoundConsumer::new(consumer, watch)
    }

    /// Stop the stream on behalf of `consumer`; ignored unless it is the
    /// currently registered one.
    pub(crate) fn stop_stream_if_current(self: &Arc<Self>, consumer: &StreamConsumer) {
        {
            let st = self.state.lock();
            if !st.session.is_current(consumer.id()) {
                info!("Ignoring a stream stop request from a non-current client");
                return;
            }
        }

        if self
            .execute(
                RequestPriority::High,
                ServiceState::Inactive,
                None,
                None,
                Some(consumer),
            )
            .is_err()
        {
            warn!("Failed to stop the video stream");
        }
    }
}
