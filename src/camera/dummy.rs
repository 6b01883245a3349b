use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::camera::backend::{CameraBackend, VideoStream};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{CameraDevice, DeviceId, Facing, Resolution};
use crate::capture::frame::Frame;

const DUMMY_FRONT_ID: &str = "dummy:test:front";
const DUMMY_BACK_ID: &str = "dummy:test:back";

/// A fake camera backend for running without real hardware.
///
/// Provides a front and a back camera that produce a moving RGB gradient.
/// Acquisition failures can be injected per facing, and the number of
/// currently held streams is tracked so callers can verify release.
///
/// Enable via `DUMMY_CAMERA=1` environment variable.
pub struct DummyBackend {
    resolution: Resolution,
    acquire_delay: Duration,
    failures: Mutex<HashMap<Facing, CameraError>>,
    open_streams: Arc<AtomicUsize>,
}

impl DummyBackend {
    /// Create a backend whose cameras capture at 1280x720.
    pub fn new() -> Self {
        Self::with_resolution(Resolution::new(1280, 720))
    }

    pub fn with_resolution(resolution: Resolution) -> Self {
        Self {
            resolution,
            acquire_delay: Duration::ZERO,
            failures: Mutex::new(HashMap::new()),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulate a slow permission prompt or driver start.
    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    /// Whether the dummy camera is enabled via environment variable.
    pub fn is_enabled() -> bool {
        std::env::var("DUMMY_CAMERA").is_ok_and(|v| v == "1" || v == "true")
    }

    /// Make every `open` for `facing` fail with `error` (or succeed again
    /// when `None`).
    pub fn set_failure(&self, facing: Facing, error: Option<CameraError>) {
        let mut failures = self.failures.lock();
        match error {
            Some(e) => {
                failures.insert(facing, e);
            }
            None => {
                failures.remove(&facing);
            }
        }
    }

    /// Number of streams acquired and not yet released.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn device_id(facing: Facing) -> DeviceId {
        match facing {
            Facing::Front => DeviceId::new(DUMMY_FRONT_ID),
            Facing::Back => DeviceId::new(DUMMY_BACK_ID),
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for DummyBackend {
    fn enumerate_devices(&self) -> Result<Vec<CameraDevice>> {
        Ok([Facing::Front, Facing::Back]
            .into_iter()
            .map(|facing| CameraDevice {
                id: Self::device_id(facing),
                name: format!("Dummy {facing} camera"),
                facing,
                native_resolution: self.resolution,
            })
            .collect())
    }

    fn open(&self, facing: Facing) -> BoxFuture<'_, Result<Box<dyn VideoStream>>> {
        Box::pin(async move {
            if !self.acquire_delay.is_zero() {
                tokio::time::sleep(self.acquire_delay).await;
            }
            if let Some(err) = self.failures.lock().get(&facing).cloned() {
                return Err(err);
            }
            if self.open_streams.load(Ordering::SeqCst) > 0 {
                return Err(CameraError::DeviceBusy(
                    "dummy camera already streaming".to_string(),
                ));
            }
            self.open_streams.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("dummy {facing} camera acquired");
            let stream: Box<dyn VideoStream> = Box::new(DummyStream {
                facing,
                resolution: self.resolution,
                active: true,
                released: false,
                frame_index: 0,
                open_streams: Arc::clone(&self.open_streams),
            });
            Ok(stream)
        })
    }
}

/// Stream handed out by [`DummyBackend`].
struct DummyStream {
    facing: Facing,
    resolution: Resolution,
    active: bool,
    released: bool,
    frame_index: u32,
    open_streams: Arc<AtomicUsize>,
}

impl DummyStream {
    /// Diagonal gradient that shifts by a few pixels per frame.
    fn test_pattern(&self) -> Vec<u8> {
        let Resolution { width, height } = self.resolution;
        let shift = self.frame_index.wrapping_mul(4);
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.push((x.wrapping_add(shift) % 256) as u8);
                data.push((y % 256) as u8);
                data.push(match self.facing {
                    Facing::Front => 160,
                    Facing::Back => 64,
                });
            }
        }
        data
    }
}

impl VideoStream for DummyStream {
    fn native_resolution(&self) -> Resolution {
        self.resolution
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn grab(&mut self) -> Option<Frame> {
        if !self.active || self.released {
            return None;
        }
        self.frame_index = self.frame_index.wrapping_add(1);
        Some(Frame {
            data: self.test_pattern(),
            width: self.resolution.width,
            height: self.resolution.height,
            captured_at: Utc::now(),
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("dummy {} camera released", self.facing);
        }
    }
}

impl Drop for DummyStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_backend_enumerates_front_and_back() {
        let backend = DummyBackend::new();
        let devices = backend.enumerate_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].facing, Facing::Front);
        assert_eq!(devices[1].facing, Facing::Back);
        assert_eq!(devices[0].id.as_str(), "dummy:test:front");
        assert_eq!(devices[0].native_resolution, Resolution::new(1280, 720));
    }

    #[tokio::test]
    async fn open_tracks_and_release_clears_handle() {
        let backend = DummyBackend::with_resolution(Resolution::new(8, 4));
        let mut stream = backend.open(Facing::Front).await.unwrap();
        assert_eq!(backend.open_streams(), 1);

        stream.release();
        assert_eq!(backend.open_streams(), 0);

        // Idempotent, including the implicit release on drop.
        stream.release();
        drop(stream);
        assert_eq!(backend.open_streams(), 0);
    }

    #[tokio::test]
    async fn second_open_while_streaming_is_busy() {
        let backend = DummyBackend::with_resolution(Resolution::new(8, 4));
        let _held = backend.open(Facing::Front).await.unwrap();
        let result = backend.open(Facing::Back).await;
        assert!(matches!(result, Err(CameraError::DeviceBusy(_))));
    }

    #[tokio::test]
    async fn injected_failure_is_returned() {
        let backend = DummyBackend::new();
        backend.set_failure(Facing::Back, Some(CameraError::PermissionDenied));
        let result = backend.open(Facing::Back).await;
        assert!(matches!(result, Err(CameraError::PermissionDenied)));
        assert_eq!(backend.open_streams(), 0);

        backend.set_failure(Facing::Back, None);
        assert!(backend.open(Facing::Back).await.is_ok());
    }

    #[tokio::test]
    async fn grab_produces_rgb_frames_only_while_active() {
        let backend = DummyBackend::with_resolution(Resolution::new(8, 4));
        let mut stream = backend.open(Facing::Front).await.unwrap();

        let frame = stream.grab().unwrap();
        assert_eq!((frame.width, frame.height), (8, 4));
        assert_eq!(frame.data.len(), 8 * 4 * 3);
        assert!(frame.validate().is_ok());

        stream.set_active(false);
        assert!(stream.grab().is_none());
        stream.set_active(true);
        assert!(stream.grab().is_some());
    }

    #[tokio::test]
    async fn consecutive_frames_differ() {
        let backend = DummyBackend::with_resolution(Resolution::new(8, 4));
        let mut stream = backend.open(Facing::Front).await.unwrap();
        let a = stream.grab().unwrap();
        let b = stream.grab().unwrap();
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn dummy_backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DummyBackend>();
    }
}
