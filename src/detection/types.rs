use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Build from corner coordinates, normalising swapped corners.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    /// Reflect across the vertical centre line of a frame `frame_width` wide.
    pub fn mirrored(&self, frame_width: f32) -> Self {
        Self {
            x: frame_width - self.x - self.width,
            ..*self
        }
    }
}

/// One recognised (or unrecognised) face in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub name: String,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    pub bbox: Option<Rect>,
}

/// Structured output of one completed round trip. May be empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub identities: Vec<Detection>,
    pub received_at: DateTime<Utc>,
}

/// Image returned by a service that draws its own annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

/// What a round trip produced, depending on the configured response format.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Structured(DetectionResult),
    Annotated(AnnotatedImage),
}

impl DetectionOutcome {
    /// The structured result, if the service returned one.
    pub fn result(&self) -> Option<&DetectionResult> {
        match self {
            Self::Structured(result) => Some(result),
            Self::Annotated(_) => None,
        }
    }
}

/// A compressed frame ready to send.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Whether the pixels were flipped before encoding.
    pub mirrored: bool,
}

/// Which response contract the detection service speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Structured,
    AnnotatedImage,
}

// ----------------------------------------------------------------------------
// Wire format
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct WireResponse {
    /// `"success"` or `"error"`; older services omit it.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "detections")]
    pub faces: Vec<WireFace>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireFace {
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
    pub identity: WireIdentity,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireIdentity {
    pub name: String,
    #[serde(default)]
    pub confidence: f32,
}

impl WireResponse {
    /// The in-band failure message, when the body reports `status: "error"`
    /// under an HTTP success code.
    pub(crate) fn service_error(&self) -> Option<String> {
        match self.status.as_deref() {
            Some(status) if status.eq_ignore_ascii_case("error") => Some(
                self.message
                    .clone()
                    .unwrap_or_else(|| "unspecified error".to_string()),
            ),
            _ => None,
        }
    }

    pub(crate) fn into_result(self, received_at: DateTime<Utc>) -> DetectionResult {
        let identities = self
            .faces
            .into_iter()
            .map(|face| Detection {
                name: face.identity.name,
                confidence: clamp_confidence(face.identity.confidence),
                bbox: face
                    .bbox
                    .map(|[x1, y1, x2, y2]| Rect::from_corners(x1, y1, x2, y2)),
            })
            .collect();
        DetectionResult {
            identities,
            received_at,
        }
    }
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
