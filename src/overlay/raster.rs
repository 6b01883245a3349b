use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect as PixelRect;
use thiserror::Error;

use crate::detection::types::Rect;
use crate::overlay::renderer::{Color, DrawOp, OverlayScene};

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("image op source is not a base64 data URL")]
    InvalidDataUrl,

    #[error("failed to decode overlay image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Paint `scene` onto `target`, a copy of the frame the scene was built for.
///
/// Boxes and label backgrounds are drawn; text glyphs are left to the
/// display surface. `Clear` is a no-op since the target starts clean.
pub fn rasterize(scene: &OverlayScene, target: &mut RgbImage) -> Result<(), RasterError> {
    for op in &scene.ops {
        match op {
            DrawOp::Clear | DrawOp::Text { .. } => {}
            DrawOp::Image { src } => {
                let decoded = decode_data_url(src)?;
                let resized = imageops::resize(
                    &decoded,
                    target.width(),
                    target.height(),
                    FilterType::Triangle,
                );
                imageops::replace(target, &resized, 0, 0);
            }
            DrawOp::StrokeRect {
                rect,
                color,
                line_width,
            } => {
                for inset in 0..*line_width as i32 {
                    if let Some(r) = pixel_rect(rect, inset) {
                        draw_hollow_rect_mut(target, r, rgb(*color));
                    }
                }
            }
            DrawOp::FillRect { rect, color } => {
                if let Some(r) = pixel_rect(rect, 0) {
                    draw_filled_rect_mut(target, r, rgb(*color));
                }
            }
        }
    }
    Ok(())
}

fn decode_data_url(src: &str) -> Result<RgbImage, RasterError> {
    let (_, payload) = src
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .ok_or(RasterError::InvalidDataUrl)?;
    let bytes = BASE64
        .decode(payload)
        .map_err(|_| RasterError::InvalidDataUrl)?;
    Ok(image::load_from_memory(&bytes)?.to_rgb8())
}

/// Rectangle shrunk by `inset` on every side, or `None` when nothing is left.
fn pixel_rect(rect: &Rect, inset: i32) -> Option<PixelRect> {
    let width = rect.width.round() as i32 - 2 * inset;
    let height = rect.height.round() as i32 - 2 * inset;
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(
        PixelRect::at(rect.x.round() as i32 + inset, rect.y.round() as i32 + inset)
            .of_size(width as u32, height as u32),
    )
}

fn rgb(color: Color) -> Rgb<u8> {
    Rgb([color.0, color.1, color.2])
}
