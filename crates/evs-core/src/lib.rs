//! evs-core - Core traits and types for the extended-view camera service
//!
//! This crate provides the fundamental abstractions shared by the
//! arbitration service and its hosts: the camera HAL contract, the platform
//! collaborator traits, and the data model for states, streams, and session
//! tokens.

pub mod error;
pub mod hal;
pub mod models;
pub mod platform;

pub use error::{ServiceError, ServiceResult, TokenError};
pub use hal::CameraHal;
pub use models::*;
pub use platform::{ActivityPresenter, CallerId, DisplayPowerState, IdentityVerifier};
