use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};

use crate::capture::frame::Frame;
use crate::export::snapshot::{file_stamp, unique_path, write_atomic, ExportError, Result};
use crate::overlay::raster;
use crate::overlay::renderer::OverlayScene;

pub const ANNOTATED_JPEG_QUALITY: u8 = 90;

/// Draw `scene` over `frame` as the operator sees it.
///
/// Scenes are laid out in display coordinates, so a mirrored display gets
/// a flipped canvas before the boxes go on.
pub fn annotate(
    frame: &Frame,
    scene: Option<&OverlayScene>,
    display_mirrored: bool,
) -> Result<RgbImage> {
    let mut canvas = RgbImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or(
        ExportError::InvalidFrame {
            width: frame.width,
            height: frame.height,
        },
    )?;
    if display_mirrored {
        imageops::flip_horizontal_in_place(&mut canvas);
    }
    if let Some(scene) = scene {
        raster::rasterize(scene, &mut canvas)?;
    }
    Ok(canvas)
}

/// Save an annotated copy of `frame` as `frame-<stamp>.jpg` in `dir`.
///
/// Blocking; async callers run it on the blocking pool.
pub fn write_annotated_frame(
    dir: &Path,
    frame: &Frame,
    scene: Option<&OverlayScene>,
    display_mirrored: bool,
) -> Result<PathBuf> {
    let canvas = annotate(frame, scene, display_mirrored)?;

    let mut jpeg = Vec::new();
    canvas.write_with_encoder(JpegEncoder::new_with_quality(
        &mut jpeg,
        ANNOTATED_JPEG_QUALITY,
    ))?;

    std::fs::create_dir_all(dir)?;
    let path = unique_path(dir, &format!("frame-{}.jpg", file_stamp(frame.captured_at)));
    write_atomic(&path, &jpeg)?;

    tracing::info!("exported annotated frame to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::types::Resolution;
    use crate::detection::types::{Detection, DetectionOutcome, DetectionResult, Rect};
    use crate::overlay::renderer::{FrameView, OverlayRenderer, CONFIDENT};
    use chrono::Utc;
    use image::Rgb;
    use tempfile::TempDir;

    fn frame(width: u32, height: u32) -> Frame {
        Frame {
            data: vec![0; (width * height * 3) as usize],
            width,
            height,
            captured_at: Utc::now(),
        }
    }

    fn scene(display_mirrored: bool) -> OverlayScene {
        let outcome = DetectionOutcome::Structured(DetectionResult {
            identities: vec![Detection {
                name: "Alice".to_string(),
                confidence: 0.95,
                bbox: Some(Rect {
                    x: 10.0,
                    y: 40.0,
                    width: 30.0,
                    height: 30.0,
                }),
            }],
            received_at: Utc::now(),
        });
        OverlayRenderer::default()
            .render(
                &outcome,
                FrameView {
                    size: Resolution::new(100, 100),
                    display_mirrored,
                    frame_mirrored: false,
                },
            )
            .clone()
    }

    fn green() -> Rgb<u8> {
        Rgb([CONFIDENT.0, CONFIDENT.1, CONFIDENT.2])
    }

    #[test]
    fn boxes_land_where_the_scene_put_them() {
        let img = annotate(&frame(100, 100), Some(&scene(false)), false).unwrap();
        assert_eq!(*img.get_pixel(10, 55), green());
        assert_eq!(*img.get_pixel(25, 55), Rgb([0, 0, 0]));
    }

    #[test]
    fn mirrored_display_flips_the_canvas_not_the_boxes_twice() {
        let mut source = frame(100, 100);
        // Mark the left edge so the flip is visible.
        source.data[0..3].copy_from_slice(&[255, 255, 255]);

        let img = annotate(&source, Some(&scene(true)), true).unwrap();
        assert_eq!(*img.get_pixel(99, 0), Rgb([255, 255, 255]));
        // Box at x=10..40 in the frame shows at x=60..90 on screen.
        assert_eq!(*img.get_pixel(89, 55), green());
        assert_ne!(*img.get_pixel(10, 55), green());
    }

    #[test]
    fn bad_buffer_is_rejected() {
        let mut bad = frame(10, 10);
        bad.data.truncate(5);
        assert!(matches!(
            annotate(&bad, None, false),
            Err(ExportError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn write_produces_a_decodable_jpeg() {
        let dir = TempDir::new().unwrap();
        let source = frame(64, 48);
        let first = write_annotated_frame(dir.path(), &source, None, false).unwrap();
        let second = write_annotated_frame(dir.path(), &source, None, false).unwrap();

        assert_ne!(first, second);
        let decoded = image::open(&first).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }
}
