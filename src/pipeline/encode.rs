//! Image-to-data-URL encoding for vision calls.
//!
//! The vision API takes images inline as base64 data URLs, so nothing is
//! ever uploaded out-of-band. Rasterised pages are already PNG and embed
//! directly; keyframes arrive as raw rgb24 and are compressed to JPEG
//! first (photographic frames compress far better as JPEG than PNG).

use crate::error::IngestError;
use crate::pipeline::convert::PageImage;
use crate::pipeline::frames::Frame;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// Wrap already-encoded image bytes in a data URL.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Data URL for a page image, sniffing the container from the bytes.
///
/// PNG and JPEG embed as-is; anything else (or unrecognisable bytes) is
/// re-encoded to PNG so the model always receives a format it accepts.
pub fn page_data_url(page: &PageImage) -> Result<String, IngestError> {
    match image::guess_format(&page.bytes) {
        Ok(ImageFormat::Png) => Ok(data_url("image/png", &page.bytes)),
        Ok(ImageFormat::Jpeg) => Ok(data_url("image/jpeg", &page.bytes)),
        _ => {
            let decoded = image::load_from_memory(&page.bytes).map_err(|e| {
                IngestError::ConversionFailed {
                    tool: "image decode".to_string(),
                    detail: format!("page {}: {e}", page.number),
                }
            })?;
            let mut out = Vec::new();
            decoded
                .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                .map_err(|e| IngestError::Internal(format!("png encode: {e}")))?;
            Ok(data_url("image/png", &out))
        }
    }
}

/// Compress a raw rgb24 frame to JPEG.
pub fn frame_to_jpeg(frame: &Frame) -> Result<Vec<u8>, IngestError> {
    let img = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone()).ok_or_else(
        || IngestError::Internal(format!("frame {} buffer/dimension mismatch", frame.index)),
    )?;
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .map_err(|e| IngestError::Internal(format!("jpeg encode: {e}")))?;
    Ok(out)
}

/// Data URL for a keyframe.
pub fn frame_data_url(frame: &Frame) -> Result<String, IngestError> {
    Ok(data_url("image/jpeg", &frame_to_jpeg(frame)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = RgbImage::from_fn(2, 2, |x, y| image::Rgb([(x * 100) as u8, (y * 100) as u8, 0]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn data_url_has_scheme_mime_and_base64() {
        let url = data_url("image/png", b"abc");
        assert_eq!(url, format!("data:image/png;base64,{}", BASE64.encode(b"abc")));
    }

    #[test]
    fn png_pages_embed_without_reencoding() {
        let bytes = tiny_png();
        let page = PageImage { number: 1, bytes: bytes.clone() };
        let url = page_data_url(&page).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        let payload = url.split(',').nth(1).unwrap();
        assert_eq!(BASE64.decode(payload).unwrap(), bytes);
    }

    #[test]
    fn undecodable_page_is_rejected() {
        let page = PageImage { number: 3, bytes: vec![0xde, 0xad, 0xbe, 0xef] };
        let err = page_data_url(&page).unwrap_err();
        assert!(err.to_string().contains("page 3"), "got {err}");
    }

    #[test]
    fn frames_encode_to_jpeg_data_urls() {
        let frame = Frame::from_rgb(0, 4, 4, vec![128; 4 * 4 * 3]);
        let url = frame_data_url(&frame).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let payload = BASE64.decode(url.split(',').nth(1).unwrap()).unwrap();
        assert_eq!(image::guess_format(&payload).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn mismatched_frame_buffer_is_an_internal_error() {
        let frame = Frame { index: 9, width: 10, height: 10, rgb: vec![0; 5], gray: vec![0; 5] };
        assert!(frame_to_jpeg(&frame).is_err());
    }
}
