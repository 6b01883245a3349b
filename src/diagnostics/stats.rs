use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Collects detection-loop statistics for one camera session.
#[derive(Debug, Default)]
pub struct DetectionStats {
    fps: Option<u32>,
    round_trips: u64,
    skipped_ticks: u64,
    failures: u64,
    discarded: u64,
    invalid_frames: u64,
    last_latency: Option<Duration>,
    last_completed_start: Option<Instant>,
}

/// Snapshot of detection stats for serialisation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSnapshot {
    pub fps: Option<u32>,
    pub round_trips: u64,
    pub skipped_ticks: u64,
    pub failures: u64,
    pub discarded: u64,
    pub invalid_frames: u64,
    pub last_latency_ms: Option<f64>,
}

impl DetectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed round trip that began at `started`.
    ///
    /// FPS is derived from the gap between the starts of this and the
    /// previous completed round trip, so it only moves when a request
    /// actually finishes.
    pub fn record_round_trip(&mut self, started: Instant, latency: Duration) {
        self.round_trips += 1;
        self.last_latency = Some(latency);
        if let Some(previous) = self.last_completed_start {
            let elapsed_ms = started.saturating_duration_since(previous).as_secs_f64() * 1000.0;
            if elapsed_ms > 0.0 {
                self.fps = Some((1000.0 / elapsed_ms).round() as u32);
            }
        }
        self.last_completed_start = Some(started);
    }

    /// A tick found a request already in flight.
    pub fn record_skip(&mut self) {
        self.skipped_ticks += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// A result arrived for a superseded generation.
    pub fn record_discard(&mut self) {
        self.discarded += 1;
    }

    pub fn record_invalid_frame(&mut self) {
        self.invalid_frames += 1;
    }

    /// Frames per second, once two round trips have completed.
    pub fn fps(&self) -> Option<u32> {
        self.fps
    }

    pub fn round_trips(&self) -> u64 {
        self.round_trips
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn invalid_frames(&self) -> u64 {
        self.invalid_frames
    }

    /// Reset all counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            fps: self.fps,
            round_trips: self.round_trips,
            skipped_ticks: self.skipped_ticks,
            failures: self.failures,
            discarded: self.discarded,
            invalid_frames: self.invalid_frames,
            last_latency_ms: self.last_latency.map(|d| d.as_secs_f64() * 1000.0),
        }
    }
}
