use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::camera::controller::{CameraController, Generation};
use crate::capture::compress;
use crate::capture::frame::Frame;
use crate::detection::client::DetectionService;
use crate::detection::types::{DetectionOutcome, EncodedFrame};
use crate::diagnostics::stats::DetectionStats;
use crate::notify::{NoticeKind, Notifier};
use crate::overlay::renderer::{FrameView, OverlayRenderer};
use crate::roster::aggregator::RosterAggregator;

pub const DEFAULT_TICK: Duration = Duration::from_millis(300);
/// Floor for the loop period; `tokio::time::interval` rejects zero.
pub const MIN_TICK: Duration = Duration::from_millis(1);
pub const DEFAULT_JPEG_QUALITY: u8 = 92;
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 160;

/// Capture loop tuning.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub tick: Duration,
    pub jpeg_quality: u8,
    /// Flip frames before sending when the display is mirrored.
    pub bake_mirror: bool,
    pub thumbnail_width: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            bake_mirror: false,
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A round trip was started.
    Dispatched,
    /// A round trip was already in flight.
    Skipped,
    /// The camera had no frame to give (not running, or warming up).
    NoFrame,
    /// The frame failed validation.
    Invalid,
}

/// Everything a round trip touches. Cheap to clone; all fields are shared.
pub struct Pipeline<D> {
    pub config: CaptureConfig,
    pub controller: Arc<AsyncMutex<CameraController>>,
    pub generation: Generation,
    pub client: Arc<D>,
    pub in_flight: Arc<Semaphore>,
    pub renderer: Arc<Mutex<OverlayRenderer>>,
    pub roster: Arc<Mutex<RosterAggregator>>,
    pub stats: Arc<Mutex<DetectionStats>>,
    pub notifier: Arc<Notifier>,
}

impl<D> Clone for Pipeline<D> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
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
}

impl<D: DetectionService> Pipeline<D> {
    /// Run one tick: capture and dispatch a frame unless a round trip is
    /// already in flight. Never waits for the round trip itself.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(permit) = self.in_flight.clone().try_acquire_owned() else {
            self.stats.lock().record_skip();
            tracing::debug!("detection in flight, skipping tick");
            return TickOutcome::Skipped;
        };

        let (frame, mirrored, generation) = {
            let mut controller = self.controller.lock().await;
            (
                controller.grab_frame(),
                controller.is_mirrored(),
                self.generation.current(),
            )
        };
        let Some(frame) = frame else {
            return TickOutcome::NoFrame;
        };
        if let Err(e) = frame.validate() {
            self.stats.lock().record_invalid_frame();
            tracing::debug!("skipping frame: {e}");
            return TickOutcome::Invalid;
        }

        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.round_trip(permit, frame, mirrored, generation).await;
        });
        TickOutcome::Dispatched
    }

    async fn round_trip(
        &self,
        _permit: OwnedSemaphorePermit,
        frame: Frame,
        display_mirrored: bool,
        generation: u64,
    ) {
        let started = Instant::now();
        let send_mirrored = self.config.bake_mirror && display_mirrored;
        let quality = self.config.jpeg_quality;

        let (frame, encoded) = match tokio::task::spawn_blocking(move || {
            let jpeg =
                compress::compress_jpeg(&frame.data, frame.width, frame.height, quality, send_mirrored);
            (frame, jpeg)
        })
        .await
        {
            Ok((frame, Ok(jpeg))) => (frame, jpeg),
            Ok((_, Err(e))) => {
                self.stats.lock().record_invalid_frame();
                tracing::debug!("skipping frame: {e}");
                return;
            }
            Err(e) => {
                tracing::warn!("frame encoding task failed: {e}");
                return;
            }
        };

        let outcome = self
            .client
            .detect(EncodedFrame {
                jpeg: encoded,
                width: frame.width,
                height: frame.height,
                mirrored: send_mirrored,
            })
            .await;
        let latency = started.elapsed();

        let thumbnail = match &outcome {
            Ok(outcome) => self.thumbnail_for(outcome, &frame).await,
            Err(_) => None,
        };

        // Checked under the roster lock: `stop` advances the generation
        // before it clears, so a result that passes here is either applied
        // before the clear or not at all.
        let mut roster = self.roster.lock();
        if self.generation.current() != generation {
            self.stats.lock().record_discard();
            tracing::debug!("discarding result from superseded generation {generation}");
            return;
        }

        match outcome {
            Ok(outcome) => {
                self.stats.lock().record_round_trip(started, latency);
                self.renderer.lock().render(
                    &outcome,
                    FrameView {
                        size: frame.resolution(),
                        display_mirrored,
                        frame_mirrored: send_mirrored,
                    },
                );
                if let Some(result) = outcome.result() {
                    roster.apply(result, Utc::now(), thumbnail.as_deref());
                }
            }
            Err(e) => {
                self.stats.lock().record_failure();
                tracing::warn!("detection round trip failed: {e}");
                self.notifier
                    .raise(NoticeKind::Detection, format!("Detection failed: {e}"));
            }
        }
    }

    /// Thumbnail of `frame`, computed only when the result names someone
    /// the roster hasn't seen.
    async fn thumbnail_for(&self, outcome: &DetectionOutcome, frame: &Frame) -> Option<String> {
        let result = outcome.result()?;
        if !self.roster.lock().has_unseen(result) {
            return None;
        }
        let data = frame.data.clone();
        let (width, height) = (frame.width, frame.height);
        let thumb_width = self.config.thumbnail_width;
        match tokio::task::spawn_blocking(move || {
            compress::thumbnail_data_url(&data, width, height, thumb_width)
        })
        .await
        {
            Ok(Ok(url)) => Some(url),
            Ok(Err(e)) => {
                tracing::warn!("thumbnail failed: {e}");
                None
            }
            Err(e) => {
                tracing::warn!("thumbnail task failed: {e}");
                None
            }
        }
    }
}

/// Owns the ticking task. Dropping the handle stops the loop; a round trip
/// already in flight runs to completion and is then checked against the
/// generation like any other.
pub struct CaptureLoopHandle {
    task: JoinHandle<()>,
}

impl CaptureLoopHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CaptureLoopHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start ticking at the configured cadence. The first tick fires
/// immediately.
pub fn spawn<D: DetectionService>(pipeline: Pipeline<D>) -> CaptureLoopHandle {
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(pipeline.config.tick.max(MIN_TICK));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            pipeline.tick().await;
        }
    });
    CaptureLoopHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::dummy::DummyBackend;
    use crate::camera::types::{Facing, Resolution};
    use crate::detection::error::DetectionError;
    use crate::detection::mock::MockDetection;

    struct Fixture {
        pipeline: Pipeline<MockDetection>,
        client: Arc<MockDetection>,
    }

    async fn fixture(delay: Duration, identities: &[(&str, f32)]) -> Fixture {
        let backend = Arc::new(DummyBackend::with_resolution(Resolution::new(64, 48)));
        let mut controller = CameraController::new(backend);
        controller.start(Facing::Front).await.unwrap();
        let generation = controller.generation();
        let client = Arc::new(MockDetection::new(delay).with_identities(identities));
        let pipeline = Pipeline {
            config: CaptureConfig::default(),
            controller: Arc::new(AsyncMutex::new(controller)),
            generation,
            client: client.clone(),
            in_flight: Arc::new(Semaphore::new(1)),
            renderer: Arc::new(Mutex::new(OverlayRenderer::default())),
            roster: Arc::new(Mutex::new(RosterAggregator::new(vec!["Unknown".into()]))),
            stats: Arc::new(Mutex::new(DetectionStats::new())),
            notifier: Arc::new(Notifier::default()),
        };
        Fixture { pipeline, client }
    }

    /// Let spawned tasks (including blocking-pool encodes) settle.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tick_while_in_flight_is_skipped() {
        let f = fixture(Duration::from_millis(1000), &[("Alice", 0.9)]).await;

        assert_eq!(f.pipeline.tick().await, TickOutcome::Dispatched);
        settle().await;
        assert_eq!(f.pipeline.tick().await, TickOutcome::Skipped);
        assert_eq!(f.pipeline.tick().await, TickOutcome::Skipped);
        assert_eq!(f.pipeline.stats.lock().skipped_ticks(), 2);
        assert_eq!(f.pipeline.stats.lock().fps(), None);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        settle().await;
        assert_eq!(f.client.calls(), 1);
        assert_eq!(f.pipeline.tick().await, TickOutcome::Dispatched);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_never_exceeds_one_request_in_flight() {
        let f = fixture(Duration::from_millis(700), &[("Alice", 0.9)]).await;
        let handle = spawn(f.pipeline.clone());

        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(handle);

        assert!(f.client.calls() >= 5);
        assert_eq!(f.client.max_in_flight(), 1);
        assert!(f.pipeline.stats.lock().skipped_ticks() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_tick_still_runs_the_loop() {
        let mut f = fixture(Duration::from_millis(50), &[("Alice", 0.9)]).await;
        f.pipeline.config.tick = Duration::ZERO;
        let handle = spawn(f.pipeline.clone());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!handle.is_finished());
        drop(handle);
        assert!(f.client.calls() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fps_reflects_completed_round_trips() {
        let f = fixture(Duration::from_millis(50), &[]).await;
        let handle = spawn(f.pipeline.clone());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        drop(handle);
        settle().await;

        // Fast service: one round trip per 300 ms tick.
        assert_eq!(f.pipeline.stats.lock().fps(), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_reported_and_next_tick_recovers() {
        let f = fixture(Duration::from_millis(10), &[("Alice", 0.9)]).await;
        f.client.push(Err(DetectionError::Status(503)));

        f.pipeline.tick().await;
        settle().await;
        assert_eq!(f.pipeline.stats.lock().failures(), 1);
        let notices = f.pipeline.notifier.active();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Detection);
        assert!(f.pipeline.roster.lock().is_empty());

        assert_eq!(f.pipeline.tick().await, TickOutcome::Dispatched);
        settle().await;
        assert_eq!(f.pipeline.stats.lock().round_trips(), 1);
        assert!(f.pipeline.roster.lock().get("Alice").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_result_is_discarded_after_stop() {
        let f = fixture(Duration::from_millis(500), &[("Alice", 0.9)]).await;
        f.pipeline.tick().await;
        settle().await;

        f.pipeline.controller.lock().await.stop();
        f.pipeline.roster.lock().clear();

        tokio::time::sleep(Duration::from_millis(600)).await;
        settle().await;
        assert!(f.pipeline.roster.lock().is_empty());
        assert!(f.pipeline.renderer.lock().latest().is_none());
        assert_eq!(f.pipeline.stats.lock().discarded(), 1);
        // The permit came back even though the result was dropped.
        assert_eq!(f.pipeline.in_flight.available_permits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_camera_yields_no_frame() {
        let f = fixture(Duration::from_millis(10), &[]).await;
        f.pipeline.controller.lock().await.stop();
        assert_eq!(f.pipeline.tick().await, TickOutcome::NoFrame);
        assert_eq!(f.client.calls(), 0);
        assert_eq!(f.pipeline.in_flight.available_permits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn result_updates_overlay_and_roster_with_thumbnail() {
        let f = fixture(Duration::from_millis(10), &[("Alice", 0.9), ("Unknown", 0.2)]).await;
        f.pipeline.tick().await;
        settle().await;

        let scene = f.pipeline.renderer.lock().latest().cloned().unwrap();
        assert_eq!(scene.width, 64);
        // Clear + two boxes with label background and text each.
        assert_eq!(scene.ops.len(), 7);

        let roster = f.pipeline.roster.lock();
        assert_eq!(roster.len(), 1);
        let alice = roster.get("Alice").unwrap();
        assert!(alice
            .thumbnail
            .as_deref()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test(start_paused = true)]
    async fn mirror_is_baked_only_when_configured() {
        let mut f = fixture(Duration::from_millis(10), &[]).await;
        f.pipeline.controller.lock().await.set_mirrored(true);

        f.pipeline.tick().await;
        settle().await;
        f.pipeline.config.bake_mirror = true;
        f.pipeline.tick().await;
        settle().await;

        assert_eq!(f.client.mirrored_flags(), vec![false, true]);
    }
}
