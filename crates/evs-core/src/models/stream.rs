//! Stream consumer handle and the frame/event types it receives

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifier of a frame buffer handed out by the camera HAL
pub type BufferId = u32;

/// Events delivered to a stream consumer alongside frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEvent {
    Started,
    Stopped,
    FrameDropped,
    Timeout,
    ParameterChanged,
    Error,
}

/// A single camera frame: the HAL buffer id plus its payload
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub id: BufferId,
    pub data: Bytes,
}

/// What a consumer receives over its stream channel
#[derive(Debug, Clone)]
pub enum StreamSignal {
    Frame(FrameBuffer),
    Event(StreamEvent),
}

/// Identity of a registered stream consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(Uuid);

/// Handle representing one remote recipient of frames and stream events.
///
/// The handle owns the sending half of an unbounded channel; the remote
/// client holds the receiver. Dropping the receiver is how the remote side
/// (or the transport on its behalf) signals disconnection:
/// [`StreamConsumer::disconnected`] resolves exactly once at that point.
#[derive(Debug, Clone)]
pub struct StreamConsumer {
    id: ConsumerId,
    tx: mpsc::UnboundedSender<StreamSignal>,
}

impl StreamConsumer {
    /// Create a consumer handle together with the receiving end kept by the
    /// remote client.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let consumer = Self {
            id: ConsumerId(Uuid::new_v4()),
            tx,
        };
        (consumer, rx)
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Forward a frame. Returns false when the remote side is gone.
    pub fn notify_frame(&self, frame: FrameBuffer) -> bool {
        self.tx.send(StreamSignal::Frame(frame)).is_ok()
    }

    /// Forward a stream event. Returns false when the remote side is gone.
    pub fn notify_event(&self, event: StreamEvent) -> bool {
        self.tx.send(StreamSignal::Event(event)).is_ok()
    }

    /// Resolves once the receiving side has been dropped or closed.
    pub async fn disconnected(&self) {
        self.tx.closed().await
    }
}

impl PartialEq for StreamConsumer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StreamConsumer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_fails_after_receiver_dropped() {
        let (consumer, rx) = StreamConsumer::new();
        assert!(consumer.notify_event(StreamEvent::Started));

        drop(rx);
        assert!(!consumer.notify_event(StreamEvent::Stopped));
        assert!(!consumer.notify_frame(FrameBuffer {
            id: 1,
            data: Bytes::new(),
        }));
    }

    #[tokio::test]
    async fn disconnected_resolves_on_receiver_drop() {
        let (consumer, rx) = StreamConsumer::new();
        drop(rx);
        consumer.disconnected().await;
    }

    #[test]
    fn clones_share_identity() {
        let (consumer, _rx) = StreamConsumer::new();
        let clone = consumer.clone();
        assert_eq!(consumer, clone);
        assert_eq!(consumer.id(), clone.id());
    }
}
