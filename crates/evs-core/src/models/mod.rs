//! Data model for the camera arbitration service

mod event;
mod status;
mod stream;
mod token;

pub use event::HalEvent;
pub use status::{RequestPriority, ServiceState, ServiceStatus, ServiceType};
pub use stream::{BufferId, ConsumerId, FrameBuffer, StreamConsumer, StreamEvent, StreamSignal};
pub use token::SessionToken;
