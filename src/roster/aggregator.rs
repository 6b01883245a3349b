use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::types::DetectionResult;

/// Accumulated record for one recognised identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub name: String,
    /// Number of detections of this name since the last clear. Always >= 1.
    pub count: u32,
    /// Highest confidence seen so far.
    pub confidence: f32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// JPEG data URL of the frame the identity was first seen in.
    pub thumbnail: Option<String>,
}

/// Roster keyed by identity name.
pub type Roster = BTreeMap<String, RosterEntry>;

/// Fold one detection result into `roster` at time `now`.
///
/// New names are inserted with `thumbnail`; known names get their count
/// bumped, `last_seen` moved forward and confidence raised to the running
/// max. `first_seen` and the thumbnail of an existing entry never change.
/// Detections named by any of `unknown_labels` are skipped.
pub fn merge(
    roster: &mut Roster,
    result: &DetectionResult,
    now: DateTime<Utc>,
    thumbnail: Option<&str>,
    unknown_labels: &[String],
) {
    for detection in &result.identities {
        if is_placeholder(unknown_labels, &detection.name) {
            continue;
        }
        match roster.get_mut(&detection.name) {
            Some(entry) => {
                entry.count += 1;
                // Wall clocks can step backwards; keep first_seen <= last_seen.
                entry.last_seen = entry.last_seen.max(now);
                entry.confidence = entry.confidence.max(detection.confidence);
            }
            None => {
                roster.insert(
                    detection.name.clone(),
                    RosterEntry {
                        name: detection.name.clone(),
                        count: 1,
                        confidence: detection.confidence,
                        first_seen: now,
                        last_seen: now,
                        thumbnail: thumbnail.map(str::to_string),
                    },
                );
            }
        }
    }
}

fn is_placeholder(unknown_labels: &[String], name: &str) -> bool {
    unknown_labels.iter().any(|label| label == name)
}

/// Owner of the session roster. The only writer; everyone else reads
/// snapshots.
#[derive(Debug, Default)]
pub struct RosterAggregator {
    roster: Roster,
    unknown_labels: Vec<String>,
}

impl RosterAggregator {
    pub fn new(unknown_labels: Vec<String>) -> Self {
        Self {
            roster: Roster::new(),
            unknown_labels,
        }
    }

    /// Apply one completed round trip.
    pub fn apply(&mut self, result: &DetectionResult, now: DateTime<Utc>, thumbnail: Option<&str>) {
        merge(
            &mut self.roster,
            result,
            now,
            thumbnail,
            &self.unknown_labels,
        );
    }

    /// Whether `result` names anyone not yet in the roster, i.e. whether a
    /// thumbnail is worth computing.
    pub fn has_unseen(&self, result: &DetectionResult) -> bool {
        result.identities.iter().any(|d| {
            !self.roster.contains_key(&d.name) && !is_placeholder(&self.unknown_labels, &d.name)
        })
    }

    pub fn clear(&mut self) {
        self.roster.clear();
    }

    pub fn get(&self, name: &str) -> Option<&RosterEntry> {
        self.roster.get(name)
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Detached copy of the roster.
    pub fn snapshot(&self) -> Roster {
        self.roster.clone()
    }
}
