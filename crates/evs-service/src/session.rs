//! Stream session: the registered consumer, its disconnect watch, and the
//! frame-buffer ledger

use evs_core::{BufferId, ConsumerId, FrameBuffer, StreamConsumer, StreamEvent};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::ledger::BufferLedger;

/// A registered consumer paired with its disconnect-watch task.
///
/// The watch fires at most once, when the remote receiver goes away;
/// dropping the binding aborts it, so a replaced or unregistered consumer
/// can never trigger a stale death callback.
pub(crate) struct BoundConsumer {
    consumer: StreamConsumer,
    watch: JoinHandle<()>,
}

impl BoundConsumer {
    pub fn new(consumer: StreamConsumer, watch: JoinHandle<()>) -> Self {
        Self { consumer, watch }
    }
}

impl Drop for BoundConsumer {
    fn drop(&mut self) {
        self.watch.abort();
    }
}

/// Holds the at-most-one registered stream consumer and the accounting for
/// frame buffers in flight to it.
#[derive(Default)]
pub(crate) struct StreamSession {
    consumer: Option<BoundConsumer>,
    pub(crate) ledger: BufferLedger,
}

impl StreamSession {
    pub fn consumer(&self) -> Option<&StreamConsumer> {
        self.consumer.as_ref().map(|bound| &bound.consumer)
    }

    pub fn is_current(&self, id: ConsumerId) -> bool {
        self.consumer().map(|c| c.id() == id).unwrap_or(false)
    }

    /// Install a consumer, replacing any previous one. The caller is
    /// responsible for notifying the previous consumer first.
    pub fn register(&mut self, bound: BoundConsumer) {
        self.consumer = Some(bound);
    }

    /// Remove the registered consumer, cancelling its disconnect watch.
    pub fn unregister(&mut self) -> Option<StreamConsumer> {
        self.consumer.take().map(|bound| bound.consumer.clone())
    }

    /// Forward a stream event to the registered consumer, if any.
    pub fn notify_event(&self, event: StreamEvent) {
        if let Some(consumer) = self.consumer() {
            if !consumer.notify_event(event) {
                debug!(?event, "Stream consumer is gone; event dropped");
            }
        }
    }

    /// Forward a frame to the registered consumer, recording its buffer in
    /// the ledger. Returns false when the frame was not taken (no consumer,
    /// or the remote side is gone); the caller then owns the buffer.
    pub fn forward_frame(&mut self, frame: FrameBuffer) -> bool {
        let id = frame.id;
        let taken = match self.consumer() {
            Some(consumer) => consumer.notify_frame(frame),
            None => false,
        };
        if taken {
            self.ledger.record(id);
        }
        taken
    }

    /// Empty the ledger for session teardown; every returned id still needs
    /// a HAL release.
    pub fn drain_buffers(&mut self) -> Vec<BufferId> {
        self.ledger.drain()
    }
}
