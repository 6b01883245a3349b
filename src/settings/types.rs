use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::types::Facing;
use crate::capture::scheduler::{CaptureConfig, DEFAULT_JPEG_QUALITY, DEFAULT_THUMBNAIL_WIDTH};
use crate::detection::client::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_DETECT_PATH};
use crate::detection::types::ResponseFormat;
use crate::geometry::view::DEFAULT_MIN_WIDTH;
use crate::overlay::renderer::{OverlayStyle, DEFAULT_CONFIDENCE_THRESHOLD};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Everything configurable about a detection session. Every field has a
/// default, so a settings file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub endpoint: String,
    pub detect_path: String,
    pub request_timeout_ms: u64,
    pub response_format: ResponseFormat,
    pub tick_ms: u64,
    pub jpeg_quality: u8,
    /// Send mirrored pixels when the display is mirrored.
    pub bake_mirror: bool,
    pub thumbnail_width: u32,
    /// Placeholder names the service uses for unmatched faces.
    pub unknown_labels: Vec<String>,
    pub confidence_threshold: f32,
    pub notice_ttl_ms: u64,
    pub detect_on_start: bool,
    pub initial_facing: Facing,
    pub container_width: f64,
    pub min_width: f64,
    pub export_dir: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_BASE_URL.to_string(),
            detect_path: DEFAULT_DETECT_PATH.to_string(),
            request_timeout_ms: 10_000,
            response_format: ResponseFormat::Structured,
            tick_ms: 300,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            bake_mirror: false,
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
            unknown_labels: vec!["Unknown".to_string(), "Inconnu".to_string()],
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            notice_ttl_ms: 5_000,
            detect_on_start: true,
            initial_facing: Facing::Front,
            container_width: 1280.0,
            min_width: DEFAULT_MIN_WIDTH,
            export_dir: PathBuf::from("exports"),
        }
    }
}

/// Longest a notice may stay on screen.
pub const MAX_NOTICE_TTL_MS: u64 = 60 * 60 * 1000;

impl SessionSettings {
    /// Reject values the session cannot run with. Serde only checks types,
    /// so every path that builds settings from outside input calls this.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, value: impl ToString) -> SettingsError {
            SettingsError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            }
        }

        if self.tick_ms == 0 {
            return Err(invalid("tick_ms", self.tick_ms));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", self.request_timeout_ms));
        }
        if self.notice_ttl_ms == 0 || self.notice_ttl_ms > MAX_NOTICE_TTL_MS {
            return Err(invalid("notice_ttl_ms", self.notice_ttl_ms));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(invalid("jpeg_quality", self.jpeg_quality));
        }
        if self.thumbnail_width == 0 {
            return Err(invalid("thumbnail_width", self.thumbnail_width));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid("confidence_threshold", self.confidence_threshold));
        }
        if !self.container_width.is_finite() || self.container_width < 0.0 {
            return Err(invalid("container_width", self.container_width));
        }
        if !self.min_width.is_finite() || self.min_width < 0.0 {
            return Err(invalid("min_width", self.min_width));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.endpoint.clone(),
            detect_path: self.detect_path.clone(),
            timeout: Duration::from_millis(self.request_timeout_ms),
            response_format: self.response_format,
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            tick: self.tick(),
            jpeg_quality: self.jpeg_quality,
            bake_mirror: self.bake_mirror,
            thumbnail_width: self.thumbnail_width,
        }
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            threshold: self.confidence_threshold,
            ..OverlayStyle::default()
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }
}
