use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Serialize, Serializer};

use crate::camera::types::Resolution;
use crate::detection::types::{AnnotatedImage, Detection, DetectionOutcome, Rect};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.8;

/// Boxes at or above the threshold.
pub const CONFIDENT: Color = Color(0x22, 0xc5, 0x5e);
/// Boxes below the threshold.
pub const UNCERTAIN: Color = Color(0xf5, 0x9e, 0x0b);
pub const LABEL_TEXT: Color = Color(0x00, 0x00, 0x00);

/// 24-bit RGB colour, serialised as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One drawing instruction, in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawOp {
    /// Wipe whatever the previous scene drew.
    Clear,
    /// Show an image (data URL) stretched over the whole canvas.
    Image { src: String },
    #[serde(rename_all = "camelCase")]
    StrokeRect {
        rect: Rect,
        color: Color,
        line_width: u32,
    },
    FillRect { rect: Rect, color: Color },
    #[serde(rename_all = "camelCase")]
    Text {
        x: f32,
        y: f32,
        text: String,
        color: Color,
        font_px: u32,
    },
}

/// A complete overlay drawing. Each scene fully replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayScene {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
}

/// How the frame that produced a result relates to what is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView {
    pub size: Resolution,
    /// The display shows the video mirrored.
    pub display_mirrored: bool,
    /// The pixels sent for detection were already mirrored.
    pub frame_mirrored: bool,
}

impl FrameView {
    fn flips_boxes(&self) -> bool {
        self.display_mirrored && !self.frame_mirrored
    }
}

/// Label and box styling.
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub threshold: f32,
    pub line_width: u32,
    pub font_px: u32,
    /// Horizontal advance per character at `font_px`.
    pub char_advance: f32,
    pub padding: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            line_width: 3,
            font_px: 16,
            char_advance: 9.0,
            padding: 4.0,
        }
    }
}

impl OverlayStyle {
    pub fn color_for(&self, confidence: f32) -> Color {
        if confidence >= self.threshold {
            CONFIDENT
        } else {
            UNCERTAIN
        }
    }

    pub fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.char_advance
    }

    fn label_height(&self) -> f32 {
        self.font_px as f32 + 2.0 * self.padding
    }
}

/// `"{name} {pct}%"` with the confidence rounded to a whole percent.
pub fn label_text(detection: &Detection) -> String {
    format!(
        "{} {}%",
        detection.name,
        (detection.confidence * 100.0).round() as u32
    )
}

/// Produces the overlay for each completed round trip.
pub struct OverlayRenderer {
    style: OverlayStyle,
    sequence: u64,
    latest: Option<OverlayScene>,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self {
            style,
            sequence: 0,
            latest: None,
        }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Build the scene for `outcome`, replacing the previous one.
    pub fn render(&mut self, outcome: &DetectionOutcome, view: FrameView) -> &OverlayScene {
        self.sequence += 1;
        let mut ops = vec![DrawOp::Clear];
        match outcome {
            DetectionOutcome::Annotated(image) => ops.push(image_op(image)),
            DetectionOutcome::Structured(result) => {
                for detection in &result.identities {
                    self.push_detection(&mut ops, detection, view);
                }
            }
        }
        self.latest.insert(OverlayScene {
            sequence: self.sequence,
            width: view.size.width,
            height: view.size.height,
            ops,
        })
    }

    /// Drop the current drawing, e.g. when the camera stops.
    pub fn clear(&mut self) {
        self.latest = None;
    }

    pub fn latest(&self) -> Option<&OverlayScene> {
        self.latest.as_ref()
    }

    fn push_detection(&self, ops: &mut Vec<DrawOp>, detection: &Detection, view: FrameView) {
        let Some(mut bbox) = detection.bbox else {
            return;
        };
        if view.flips_boxes() {
            bbox = bbox.mirrored(view.size.width as f32);
        }
        let style = &self.style;
        let color = style.color_for(detection.confidence);
        let text = label_text(detection);
        let label_w = style.text_width(&text) + 2.0 * style.padding;
        let label_h = style.label_height();

        let canvas_w = view.size.width as f32;
        let label_x = bbox.x.min(canvas_w - label_w).max(0.0);
        // Above the box unless that would leave the canvas.
        let label_y = if bbox.y - label_h >= 0.0 {
            bbox.y - label_h
        } else {
            bbox.y
        };

        ops.push(DrawOp::StrokeRect {
            rect: bbox,
            color,
            line_width: style.line_width,
        });
        ops.push(DrawOp::FillRect {
            rect: Rect {
                x: label_x,
                y: label_y,
                width: label_w,
                height: label_h,
            },
            color,
        });
        ops.push(DrawOp::Text {
            x: label_x + style.padding,
            y: label_y + style.padding,
            text,
            color: LABEL_TEXT,
            font_px: style.font_px,
        });
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(OverlayStyle::default())
    }
}

fn image_op(image: &AnnotatedImage) -> DrawOp {
    DrawOp::Image {
        src: format!(
            "data:{};base64,{}",
            image.content_type,
            BASE64.encode(&image.bytes)
        ),
    }
}
