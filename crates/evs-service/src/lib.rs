//! evs-service - Priority arbitration for the extended-view camera
//!
//! This crate mediates access to one physical camera among competing
//! callers: the vehicle-signal-driven automatic trigger, the privileged
//! system viewer, and ordinary application clients.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        EvsService                            │
//! │                                                              │
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────────┐  │
//! │  │ EventBridge  │  │ StateMachine  │  │ StatusBroadcaster│  │
//! │  │ (signals,    │─▶│ (UNAVAILABLE/ │─▶│ (listener        │  │
//! │  │  timers)     │  │  INACTIVE/    │  │  fan-out)        │  │
//! │  └──────────────┘  │  REQUESTED/   │  └──────────────────┘  │
//! │                    │  ACTIVE)      │                        │
//! │                    └───────┬───────┘                        │
//! │                    ┌───────┴───────┐                        │
//! │                    │ StreamSession │                        │
//! │                    │ (consumer,    │                        │
//! │                    │  buffer       │                        │
//! │                    │  ledger)      │                        │
//! │                    └───────┬───────┘                        │
//! │                    ┌───────┴───────┐                        │
//! │                    │   CameraHal   │                        │
//! │                    │  (hardware    │                        │
//! │                    │   session)    │                        │
//! │                    └───────────────┘                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All state transitions serialize on a single lock; status broadcasts are
//! delivered after the lock is released.

pub mod broadcast;
pub mod config;
pub mod service;
pub mod testing;

mod bridge;
mod ledger;
mod machine;
mod session;
mod token;

pub use broadcast::{ListenerId, StatusSubscription};
pub use config::EvsConfig;
pub use service::EvsService;

// Re-export for convenience
pub use evs_core::{
    ActivityPresenter, BufferId, CallerId, CameraHal, ConsumerId, DisplayPowerState, FrameBuffer,
    IdentityVerifier, RequestPriority, ServiceError, ServiceResult, ServiceState, ServiceStatus,
    ServiceType, SessionToken, StreamConsumer, StreamEvent, StreamSignal, TokenError,
};
