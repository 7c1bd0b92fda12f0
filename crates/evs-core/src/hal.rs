//! Camera HAL adapter contract

use crate::models::BufferId;

/// Connection to the camera hardware subsystem.
///
/// This trait abstracts the underlying camera stack and provides a unified
/// interface for session lifecycle and frame-buffer bookkeeping. All calls
/// are synchronous with bounded latency: the arbiter invokes them while
/// holding its lock so that state transitions stay atomic relative to each
/// other. Frames and asynchronous hardware events flow back through the
/// service's callback surface (`on_frame`, `on_stream_event`,
/// `on_hal_death`), not through this trait.
pub trait CameraHal: Send + Sync {
    /// Establish the hardware session if one does not already exist.
    /// Returns false when the camera subsystem cannot be reached.
    fn connect_if_necessary(&self) -> bool;

    /// Whether a live hardware session exists
    fn is_connected(&self) -> bool;

    /// Open the named camera device
    fn open_camera(&self, camera_id: &str) -> bool;

    /// Close the currently open camera device
    fn close_camera(&self);

    /// Begin frame delivery from the open device
    fn start_frame_delivery(&self) -> bool;

    /// Stop frame delivery
    fn stop_frame_delivery(&self);

    /// Return a consumed frame buffer to the hardware
    fn release_buffer(&self, buffer_id: BufferId);
}
