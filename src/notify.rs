use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

/// How long a notice stays visible.
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// The camera could not be acquired.
    Acquisition,
    /// A single detection round trip failed.
    Detection,
}

/// A user-visible, self-expiring message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

struct Entry {
    notice: Notice,
    /// `None` when the TTL is too large to represent; such a notice stays
    /// until cleared or replaced.
    expires: Option<Instant>,
}

/// Holds transient notices and drops them once their TTL has passed.
pub struct Notifier {
    ttl: Duration,
    entries: Mutex<Vec<Entry>>,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Raise a notice. A detection notice replaces any earlier one so
    /// repeated failures don't pile up.
    pub fn raise(&self, kind: NoticeKind, message: impl Into<String>) {
        let notice = Notice {
            kind,
            message: message.into(),
            raised_at: Utc::now(),
        };
        let mut entries = self.entries.lock();
        if kind == NoticeKind::Detection {
            entries.retain(|e| e.notice.kind != NoticeKind::Detection);
        }
        entries.push(Entry {
            notice,
            expires: Instant::now().checked_add(self.ttl),
        });
    }

    /// Notices still within their TTL. Expired ones are pruned.
    pub fn active(&self) -> Vec<Notice> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|e| e.expires.map_or(true, |at| at > now));
        entries.iter().map(|e| e.notice.clone()).collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_TTL)
    }
}
