//! deskguard-hw: Camera capture and still-image loading.
//!
//! Provides a V4L2 live camera that yields RGB [`Frame`]s and the pixel
//! format conversions it needs.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, LiveCamera, PixelFormat};
pub use deskguard_core::Frame;
pub use frame::load_still;
