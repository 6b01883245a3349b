use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ImageBuffer, Rgb};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("pixel buffer does not match {width}x{height}")]
    InvalidBuffer { width: u32, height: u32 },

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("resize failed: {0}")]
    Resize(String),
}

/// Compress raw RGB pixel data to JPEG at the given quality (1-100),
/// optionally flipping it horizontally first.
pub fn compress_jpeg(
    data: &[u8],
    width: u32,
    height: u32,
    quality: u8,
    mirror: bool,
) -> Result<Vec<u8>, CompressError> {
    let mut img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_raw(width, height, data.to_vec())
            .ok_or(CompressError::InvalidBuffer { width, height })?;
    if mirror {
        imageops::flip_horizontal_in_place(&mut img);
    }

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    img.write_with_encoder(encoder)?;
    Ok(buf)
}

/// Downscale raw RGB data to `thumb_width` wide, preserving aspect ratio,
/// and encode it as a JPEG data URL for roster thumbnails.
///
/// Uses `fast_image_resize` for SIMD-accelerated resizing.
pub fn thumbnail_data_url(
    data: &[u8],
    width: u32,
    height: u32,
    thumb_width: u32,
) -> Result<String, CompressError> {
    use fast_image_resize as fr;
    use fr::images::Image;

    if width == 0 || height == 0 {
        return Err(CompressError::InvalidBuffer { width, height });
    }
    let thumb_width = thumb_width.clamp(1, width);
    let thumb_height =
        ((u64::from(height) * u64::from(thumb_width)) / u64::from(width)).max(1) as u32;

    let src_image = Image::from_vec_u8(width, height, data.to_vec(), fr::PixelType::U8x3)
        .map_err(|_| CompressError::InvalidBuffer { width, height })?;
    let mut dst_image = Image::new(thumb_width, thumb_height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, None)
        .map_err(|e| CompressError::Resize(e.to_string()))?;

    let jpeg = compress_jpeg(&dst_image.into_vec(), thumb_width, thumb_height, 70, false)?;
    Ok(format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(jpeg)
    ))
}
