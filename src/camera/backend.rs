use futures::future::BoxFuture;

use crate::camera::error::{CameraError, Result};
use crate::camera::types::{CameraDevice, Facing, Resolution};
use crate::capture::frame::Frame;

/// Platform-agnostic camera backend trait.
///
/// Acquisition is asynchronous: opening a device may wait on a permission
/// prompt or on the driver, and must not block the caller's thread.
pub trait CameraBackend: Send + Sync {
    /// Enumerate all currently connected camera devices.
    fn enumerate_devices(&self) -> Result<Vec<CameraDevice>>;

    /// Acquire the camera facing the requested direction.
    fn open(&self, facing: Facing) -> BoxFuture<'_, Result<Box<dyn VideoStream>>>;
}

/// A live video source acquired from a backend.
///
/// The hardware stays acquired until `release` is called or the stream is
/// dropped. `release` must be idempotent.
pub trait VideoStream: Send {
    /// Native capture resolution reported by the device.
    fn native_resolution(&self) -> Resolution;

    /// Enable or disable the video track without releasing the device.
    fn set_active(&mut self, active: bool);

    /// The most recent frame, or `None` when the track is inactive or has
    /// not produced a frame yet.
    fn grab(&mut self) -> Option<Frame>;

    /// Release the hardware resource.
    fn release(&mut self);
}

/// No-op backend used on platforms without a native camera backend.
pub struct NullBackend;

impl CameraBackend for NullBackend {
    fn enumerate_devices(&self) -> Result<Vec<CameraDevice>> {
        Ok(vec![])
    }

    fn open(&self, facing: Facing) -> BoxFuture<'_, Result<Box<dyn VideoStream>>> {
        Box::pin(async move { Err(CameraError::NoDevice(facing)) })
    }
}
