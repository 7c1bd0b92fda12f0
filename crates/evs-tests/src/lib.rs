//! Integration tests for the camera arbitration service
//!
//! These tests exercise the public surface of `evs-service` end to end
//! over the mock camera HAL: arbitration scenarios, priority preemption,
//! liveness recovery, and frame-buffer accounting.
//!
//! # Test Structure
//!
//! - `arbitration_test.rs` - state machine scenarios, priorities, tokens
//! - `streaming_test.rs` - frame delivery, buffer conservation, recovery

// This crate only contains tests, no library code
