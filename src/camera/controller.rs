use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::camera::backend::{CameraBackend, VideoStream};
use crate::camera::error::Result;
use crate::camera::types::{CameraDevice, CameraState, CameraStatus, Facing, Resolution};
use crate::capture::frame::Frame;

/// Monotonic lifecycle counter shared with in-flight detection requests.
///
/// Bumped on every `start` attempt and every `stop` that releases the
/// camera. A result tagged with an older generation belongs to a superseded
/// session and must be discarded.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Owns the camera hardware handle and its on/off/paused/facing/mirror state.
///
/// Invariant: `stream` is `Some` iff `state` is `Running` or `Paused`.
pub struct CameraController {
    backend: Arc<dyn CameraBackend>,
    state: CameraState,
    facing: Facing,
    mirrored: bool,
    stream: Option<Box<dyn VideoStream>>,
    native_resolution: Option<Resolution>,
    generation: Generation,
}

impl CameraController {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        Self {
            backend,
            state: CameraState::Stopped,
            facing: Facing::default(),
            mirrored: false,
            stream: None,
            native_resolution: None,
            generation: Generation::default(),
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Native resolution of the current stream, if one is held.
    pub fn native_resolution(&self) -> Option<Resolution> {
        self.native_resolution
    }

    /// Shared handle to the lifecycle counter.
    pub fn generation(&self) -> Generation {
        self.generation.clone()
    }

    pub fn status(&self) -> CameraStatus {
        CameraStatus {
            state: self.state,
            facing: self.facing,
            mirrored: self.mirrored,
            has_stream: self.stream.is_some(),
            native_resolution: self.native_resolution,
            generation: self.generation.current(),
        }
    }

    /// Cameras the backend can see.
    pub fn devices(&self) -> Result<Vec<CameraDevice>> {
        self.backend.enumerate_devices()
    }

    /// Acquire the camera facing `facing` and transition to `Running`.
    ///
    /// Starting while already running or paused restarts on the requested
    /// camera. On failure the controller is left `Stopped` with no stream.
    pub async fn start(&mut self, facing: Facing) -> Result<Resolution> {
        self.release();
        self.generation.advance();
        self.facing = facing;

        let stream = self.backend.open(facing).await?;
        let resolution = stream.native_resolution();
        tracing::info!(
            "{facing} camera started at {}x{}",
            resolution.width,
            resolution.height
        );
        self.stream = Some(stream);
        self.native_resolution = Some(resolution);
        self.state = CameraState::Running;
        Ok(resolution)
    }

    /// Release the camera. Idempotent; a no-op when already stopped.
    ///
    /// Returns `true` when a stream was actually released.
    pub fn stop(&mut self) -> bool {
        if self.release() {
            self.generation.advance();
            tracing::info!("{} camera stopped", self.facing);
            true
        } else {
            false
        }
    }

    /// Disable the video track, keeping the device acquired.
    pub fn pause(&mut self) -> CameraState {
        if self.state == CameraState::Running {
            if let Some(stream) = self.stream.as_mut() {
                stream.set_active(false);
            }
            self.state = CameraState::Paused;
        }
        self.state
    }

    /// Re-enable the video track after `pause`.
    pub fn resume(&mut self) -> CameraState {
        if self.state == CameraState::Paused {
            if let Some(stream) = self.stream.as_mut() {
                stream.set_active(true);
            }
            self.state = CameraState::Running;
        }
        self.state
    }

    /// Restart on the opposite camera.
    ///
    /// A no-op returning `Ok(None)` while stopped. If the restart fails the
    /// controller ends `Stopped`.
    pub async fn switch_facing(&mut self) -> Result<Option<Resolution>> {
        if self.state == CameraState::Stopped {
            return Ok(None);
        }
        let next = self.facing.opposite();
        self.stop();
        self.start(next).await.map(Some)
    }

    /// Display-only mirror flag; never touches the stream.
    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    /// The latest frame while `Running`.
    pub fn grab_frame(&mut self) -> Option<Frame> {
        if self.state != CameraState::Running {
            return None;
        }
        self.stream.as_mut().and_then(|stream| stream.grab())
    }

    fn release(&mut self) -> bool {
        let released = match self.stream.take() {
            Some(mut stream) => {
                stream.release();
                true
            }
            None => false,
        };
        self.state = CameraState::Stopped;
        self.native_resolution = None;
        released
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        self.release();
    }
}
