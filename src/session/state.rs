use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};

use crate::camera::backend::CameraBackend;
use crate::camera::controller::{CameraController, Generation};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{CameraDevice, CameraState, CameraStatus, Facing, Resolution};
use crate::capture::scheduler::{self, CaptureLoopHandle, Pipeline};
use crate::detection::client::DetectionService;
use crate::diagnostics::stats::{DetectionStats, DiagnosticSnapshot};
use crate::export::frame;
use crate::export::snapshot::{self, SessionSnapshot};
use crate::geometry::view::{PointerEvents, Preset, ViewGeometry, ViewGeometryManager};
use crate::notify::{Notice, NoticeKind, Notifier};
use crate::overlay::renderer::{OverlayRenderer, OverlayScene};
use crate::roster::aggregator::{Roster, RosterAggregator};
use crate::settings::types::SessionSettings;

/// One live detection session: a camera, its capture loop, and everything
/// the loop feeds.
///
/// The capture loop runs exactly while the camera is `Running` and
/// detection is enabled.
pub struct Session<D: DetectionService> {
    settings: SessionSettings,
    controller: Arc<AsyncMutex<CameraController>>,
    generation: Generation,
    client: Arc<D>,
    in_flight: Arc<Semaphore>,
    renderer: Arc<Mutex<OverlayRenderer>>,
    roster: Arc<Mutex<RosterAggregator>>,
    stats: Arc<Mutex<DetectionStats>>,
    notifier: Arc<Notifier>,
    geometry: Mutex<ViewGeometryManager>,
    detection_enabled: AtomicBool,
    capture_loop: Mutex<Option<CaptureLoopHandle>>,
}

impl<D: DetectionService> Session<D> {
    pub fn new(settings: SessionSettings, backend: Arc<dyn CameraBackend>, client: D) -> Self {
        let controller = CameraController::new(backend);
        let generation = controller.generation();
        Self {
            controller: Arc::new(AsyncMutex::new(controller)),
            generation,
            client: Arc::new(client),
            in_flight: Arc::new(Semaphore::new(1)),
            renderer: Arc::new(Mutex::new(OverlayRenderer::new(settings.overlay_style()))),
            roster: Arc::new(Mutex::new(RosterAggregator::new(
                settings.unknown_labels.clone(),
            ))),
            stats: Arc::new(Mutex::new(DetectionStats::new())),
            notifier: Arc::new(Notifier::new(settings.notice_ttl())),
            geometry: Mutex::new(ViewGeometryManager::new(
                settings.container_width,
                settings.min_width,
            )),
            detection_enabled: AtomicBool::new(settings.detect_on_start),
            capture_loop: Mutex::new(None),
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn client(&self) -> &D {
        &self.client
    }

    // ------------------------------------------------------------------
    // Camera lifecycle
    // ------------------------------------------------------------------

    /// Acquire the camera and begin detection.
    ///
    /// On failure the session is `Stopped` and an acquisition notice is
    /// raised.
    pub async fn start(&self, facing: Facing) -> Result<Resolution> {
        let mut controller = self.controller.lock().await;
        self.halt_loop();
        let was_live = controller.state().holds_resource();
        let result = controller.start(facing).await;
        if was_live {
            self.reset_detection_state();
        }
        self.after_start(&controller, result)
    }

    /// Release the camera. Returns `false` (and changes nothing) when the
    /// session was already stopped.
    pub async fn stop(&self) -> bool {
        let mut controller = self.controller.lock().await;
        self.halt_loop();
        if !controller.stop() {
            return false;
        }
        self.reset_detection_state();
        true
    }

    pub async fn pause(&self) -> CameraState {
        let state = self.controller.lock().await.pause();
        if state == CameraState::Paused {
            self.halt_loop();
        }
        state
    }

    pub async fn resume(&self) -> CameraState {
        let mut controller = self.controller.lock().await;
        let state = controller.resume();
        if state == CameraState::Running && self.is_detection_enabled() {
            self.ensure_loop();
        }
        state
    }

    /// Restart on the opposite camera. A no-op returning `Ok(None)` while
    /// stopped; on failure the session ends `Stopped`.
    pub async fn switch_facing(&self) -> Result<Option<Resolution>> {
        let mut controller = self.controller.lock().await;
        if controller.state() == CameraState::Stopped {
            return Ok(None);
        }
        self.halt_loop();
        let result = controller.switch_facing().await;
        self.reset_detection_state();
        match result.transpose() {
            Some(result) => self.after_start(&controller, result).map(Some),
            None => Ok(None),
        }
    }

    pub async fn set_mirrored(&self, mirrored: bool) {
        self.controller.lock().await.set_mirrored(mirrored);
    }

    pub async fn status(&self) -> CameraStatus {
        self.controller.lock().await.status()
    }

    pub async fn devices(&self) -> Result<Vec<CameraDevice>> {
        self.controller.lock().await.devices()
    }

    // ------------------------------------------------------------------
    // Detection
    // ------------------------------------------------------------------

    /// Turn detection on or off without touching the camera.
    pub async fn set_detection_enabled(&self, enabled: bool) {
        let controller = self.controller.lock().await;
        self.detection_enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.halt_loop();
        } else if controller.state() == CameraState::Running {
            self.ensure_loop();
        }
    }

    pub fn is_detection_enabled(&self) -> bool {
        self.detection_enabled.load(Ordering::SeqCst)
    }

    pub fn is_detecting(&self) -> bool {
        self.capture_loop.lock().is_some()
    }

    pub fn clear_roster(&self) {
        self.roster.lock().clear();
    }

    pub fn roster_snapshot(&self) -> Roster {
        self.roster.lock().snapshot()
    }

    pub fn overlay(&self) -> Option<OverlayScene> {
        self.renderer.lock().latest().cloned()
    }

    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        self.stats.lock().snapshot()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notifier.active()
    }

    // ------------------------------------------------------------------
    // View geometry
    // ------------------------------------------------------------------

    pub fn geometry(&self) -> ViewGeometry {
        self.geometry.lock().geometry()
    }

    pub fn apply_preset(&self, preset: Preset) -> ViewGeometry {
        let mut geometry = self.geometry.lock();
        geometry.apply_preset(preset);
        geometry.geometry()
    }

    pub fn set_container_width(&self, width: f64) -> ViewGeometry {
        let mut geometry = self.geometry.lock();
        geometry.set_container_width(width);
        geometry.geometry()
    }

    pub fn begin_resize(&self, events: Arc<dyn PointerEvents>, pointer_x: f64) {
        self.geometry.lock().begin_resize(events, pointer_x);
    }

    pub fn update_resize(&self, pointer_x: f64) -> ViewGeometry {
        let mut geometry = self.geometry.lock();
        geometry.update_resize(pointer_x);
        geometry.geometry()
    }

    pub fn end_resize(&self) {
        self.geometry.lock().end_resize();
    }

    pub fn on_blur(&self) {
        self.geometry.lock().on_blur();
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    pub async fn export_snapshot(&self) -> SessionSnapshot {
        let resolution = self.controller.lock().await.native_resolution();
        SessionSnapshot::new(self.roster_snapshot(), resolution)
    }

    /// Write a snapshot into `dir`. Returns the file written.
    pub async fn export_to_dir(&self, dir: &Path) -> snapshot::Result<PathBuf> {
        let snapshot = self.export_snapshot().await;
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || snapshot::write_snapshot(&dir, &snapshot)).await?
    }

    /// Save the current frame with the latest overlay drawn on it.
    /// `Ok(None)` when the camera is not running.
    pub async fn export_annotated_frame(&self, dir: &Path) -> snapshot::Result<Option<PathBuf>> {
        let (grabbed, mirrored) = {
            let mut controller = self.controller.lock().await;
            (controller.grab_frame(), controller.is_mirrored())
        };
        let Some(grabbed) = grabbed else {
            return Ok(None);
        };
        let scene = self.overlay();
        let dir = dir.to_path_buf();
        let path = tokio::task::spawn_blocking(move || {
            frame::write_annotated_frame(&dir, &grabbed, scene.as_ref(), mirrored)
        })
        .await??;
        Ok(Some(path))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn after_start(
        &self,
        controller: &CameraController,
        result: Result<Resolution>,
    ) -> Result<Resolution> {
        match result {
            Ok(resolution) => {
                {
                    let mut geometry = self.geometry.lock();
                    geometry.reset_aspect();
                    geometry.set_native_resolution(resolution);
                }
                if self.is_detection_enabled() {
                    self.ensure_loop();
                }
                tracing::info!(
                    "session running on {} camera, detection {}",
                    controller.facing(),
                    if self.is_detecting() { "on" } else { "off" }
                );
                Ok(resolution)
            }
            Err(e) => {
                tracing::warn!("camera acquisition failed: {e}");
                self.notifier
                    .raise(NoticeKind::Acquisition, acquisition_message(&e));
                Err(e)
            }
        }
    }

    /// Clear everything derived from the previous camera run. Must follow
    /// the generation bump so in-flight results can't land afterwards.
    fn reset_detection_state(&self) {
        self.roster.lock().clear();
        self.renderer.lock().clear();
        self.stats.lock().reset();
        self.geometry.lock().reset_aspect();
        self.detection_enabled
            .store(self.settings.detect_on_start, Ordering::SeqCst);
    }

    fn pipeline(&self) -> Pipeline<D> {
        Pipeline {
            config: self.settings.capture_config(),
            controller: self.controller.clone(),
            generation: self.generation.clone(),
            client: self.client.clone(),
            in_flight: self.in_flight.clone(),
            renderer: self.renderer.clone(),
            roster: self.roster.clone(),
            stats: self.stats.clone(),
            notifier: self.notifier.clone(),
        }
    }

    fn ensure_loop(&self) {
        let mut capture_loop = self.capture_loop.lock();
        if capture_loop.is_none() {
            *capture_loop = Some(scheduler::spawn(self.pipeline()));
        }
    }

    fn halt_loop(&self) {
        self.capture_loop.lock().take();
    }
}

fn acquisition_message(error: &CameraError) -> String {
    match error {
        CameraError::PermissionDenied => {
            "Camera access was denied. Allow camera access and try again.".to_string()
        }
        CameraError::NoDevice(facing) => format!("No {facing} camera found."),
        CameraError::DeviceBusy(_) => "The camera is in use by another application.".to_string(),
    }
}
