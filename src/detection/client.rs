use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use reqwest::multipart::{Form, Part};

use crate::detection::error::{DetectionError, Result};
use crate::detection::types::{
    AnnotatedImage, DetectionOutcome, EncodedFrame, ResponseFormat, WireResponse,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_DETECT_PATH: &str = "/api/detect";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The sole boundary to the remote detection service.
///
/// Implementations are stateless and never retry; a failed round trip is
/// simply reported and the caller tries again on its next tick.
pub trait DetectionService: Send + Sync + 'static {
    fn detect(
        &self,
        frame: EncodedFrame,
    ) -> impl Future<Output = Result<DetectionOutcome>> + Send;
}

/// Connection settings for [`HttpDetectionClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub detect_path: String,
    pub timeout: Duration,
    pub response_format: ResponseFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            detect_path: DEFAULT_DETECT_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            response_format: ResponseFormat::default(),
        }
    }
}

/// HTTP client posting JPEG frames as multipart form data.
pub struct HttpDetectionClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpDetectionClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DetectionError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn detect_url(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.detect_path
        )
    }

    /// Check the service root. `false` on any failure.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/", self.config.base_url.trim_end_matches('/'));
        match self.client.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!("detection service health check failed: {e}");
                false
            }
        }
    }

    async fn post_frame(&self, frame: EncodedFrame) -> Result<DetectionOutcome> {
        let part = Part::bytes(frame.jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .part("file", part)
            .text("mirrored", if frame.mirrored { "true" } else { "false" });

        let resp = self
            .client
            .post(self.detect_url())
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DetectionError::Status(status.as_u16()));
        }

        let received_at = Utc::now();
        match self.config.response_format {
            ResponseFormat::Structured => {
                let body = resp.bytes().await?;
                let wire: WireResponse = serde_json::from_slice(&body)
                    .map_err(|e| DetectionError::Decode(e.to_string()))?;
                if let Some(message) = wire.service_error() {
                    return Err(DetectionError::Service(message));
                }
                Ok(DetectionOutcome::Structured(wire.into_result(received_at)))
            }
            ResponseFormat::AnnotatedImage => {
                let content_type = resp
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("application/octet-stream")
                    .to_string();
                if !content_type.starts_with("image/") {
                    return Err(DetectionError::Decode(format!(
                        "expected an image, got {content_type}"
                    )));
                }
                let bytes = resp.bytes().await?.to_vec();
                Ok(DetectionOutcome::Annotated(AnnotatedImage {
                    content_type,
                    bytes,
                    received_at,
                }))
            }
        }
    }
}

impl DetectionService for HttpDetectionClient {
    fn detect(
        &self,
        frame: EncodedFrame,
    ) -> impl Future<Output = Result<DetectionOutcome>> + Send {
        self.post_frame(frame)
    }
}
