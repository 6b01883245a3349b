use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::detection::client::DetectionService;
use crate::detection::error::Result;
use crate::detection::types::{Detection, DetectionOutcome, DetectionResult, EncodedFrame, Rect};

/// Scriptable in-process detection service.
///
/// Each call sleeps for `delay` (virtual time under `start_paused`), then
/// pops the next scripted outcome or falls back to the fixed identities.
pub(crate) struct MockDetection {
    delay: Duration,
    script: Mutex<VecDeque<Result<DetectionOutcome>>>,
    identities: Mutex<Vec<(String, f32)>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    mirrored_flags: Mutex<Vec<bool>>,
}

impl MockDetection {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            script: Mutex::new(VecDeque::new()),
            identities: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            mirrored_flags: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_identities(self, identities: &[(&str, f32)]) -> Self {
        self.set_identities(identities);
        self
    }

    pub(crate) fn set_identities(&self, identities: &[(&str, f32)]) {
        *self.identities.lock() = identities
            .iter()
            .map(|(name, confidence)| (name.to_string(), *confidence))
            .collect();
    }

    pub(crate) fn push(&self, outcome: Result<DetectionOutcome>) {
        self.script.lock().push_back(outcome);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn mirrored_flags(&self) -> Vec<bool> {
        self.mirrored_flags.lock().clone()
    }

    fn fallback(&self) -> DetectionOutcome {
        let identities = self
            .identities
            .lock()
            .iter()
            .enumerate()
            .map(|(i, (name, confidence))| Detection {
                name: name.clone(),
                confidence: *confidence,
                bbox: Some(Rect {
                    x: 40.0 + 100.0 * i as f32,
                    y: 60.0,
                    width: 80.0,
                    height: 80.0,
                }),
            })
            .collect();
        DetectionOutcome::Structured(DetectionResult {
            identities,
            received_at: Utc::now(),
        })
    }
}

impl DetectionService for MockDetection {
    async fn detect(&self, frame: EncodedFrame) -> Result<DetectionOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.mirrored_flags.lock().push(frame.mirrored);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(self.fallback()))
    }
}
