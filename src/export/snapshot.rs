use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::types::Resolution;
use crate::overlay::raster::RasterError;
use crate::roster::aggregator::Roster;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialise export: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("frame buffer does not match {width}x{height}")]
    InvalidFrame { width: u32, height: u32 },

    #[error("failed to draw overlay: {0}")]
    Raster(#[from] RasterError),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),

    #[error("export task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// The exported document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub timestamp: DateTime<Utc>,
    pub roster: Roster,
    /// `null` when no camera was running at export time.
    pub video_resolution: Option<Resolution>,
}

impl SessionSnapshot {
    pub fn new(roster: Roster, video_resolution: Option<Resolution>) -> Self {
        Self {
            timestamp: Utc::now(),
            roster,
            video_resolution,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `roster-<YYYYmmddTHHMMSS.mmmZ>.json`
    pub fn file_name(&self) -> String {
        format!("roster-{}.json", file_stamp(self.timestamp))
    }
}

/// Millisecond UTC stamp used in export file names.
pub(crate) fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// `dir/name`, or `dir/<stem>-N.<ext>` for the first N that is free.
pub(crate) fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if !path.exists() {
        return path;
    }
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    (1u32..)
        .map(|n| dir.join(format!("{stem}-{n}.{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(path)
}

/// Write `bytes` to `path` atomically (write .tmp then rename).
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Write `snapshot` into `dir` atomically, creating the directory if
/// needed. An existing file of the same name is never overwritten.
/// Returns the final path.
///
/// Blocking; async callers run it on the blocking pool.
pub fn write_snapshot(dir: &Path, snapshot: &SessionSnapshot) -> Result<PathBuf> {
    let json = snapshot.to_json()?;
    std::fs::create_dir_all(dir)?;

    let path = unique_path(dir, &snapshot.file_name());
    write_atomic(&path, json.as_bytes())?;

    tracing::info!("exported {} roster entries to {}", snapshot.roster.len(), path.display());
    Ok(path)
}
