//! Still-frame rasterization and JPEG encoding.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use farma_core::error::FarmaError;

/// MIME type of every captured still.
pub const JPEG_MIME: &str = "image/jpeg";

/// One video frame as packed RGB8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Number of bytes a well-formed frame of this size carries.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Encode a frame as a lossy JPEG at `quality` (clamped to 1-100).
///
/// The raster is exactly the frame's native resolution; no scaling happens.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, FarmaError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(FarmaError::Encode(format!(
            "frame has zero size ({}x{})",
            frame.width, frame.height
        )));
    }
    if frame.pixels.len() != frame.expected_len() {
        return Err(FarmaError::Encode(format!(
            "frame buffer is {} bytes, expected {} for {}x{} RGB",
            frame.pixels.len(),
            frame.expected_len(),
            frame.width,
            frame.height
        )));
    }

    let raster = RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
        .ok_or_else(|| FarmaError::Encode("frame buffer does not fit raster".to_string()))?;

    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&raster)
        .map_err(|e| FarmaError::Encode(e.to_string()))?;

    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Frame {
            width,
            height,
            pixels,
        }
    }

    #[test]
    fn test_encode_produces_jpeg_markers() {
        let bytes = encode_jpeg(&solid(16, 8, [200, 30, 30]), 80).unwrap();
        assert!(bytes.len() > 4);
        // SOI ... EOI
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_keeps_native_resolution() {
        let bytes = encode_jpeg(&solid(32, 24, [0, 128, 255]), 80).unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, image::ImageFormat::Jpeg)
            .unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 24);
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let mut frame = solid(4, 4, [1, 2, 3]);
        frame.pixels.truncate(10);
        let err = encode_jpeg(&frame, 80).unwrap_err();
        assert!(matches!(err, FarmaError::Encode(_)));
        assert!(err.to_string().contains("expected 48"));
    }

    #[test]
    fn test_encode_rejects_zero_size() {
        let frame = Frame {
            width: 0,
            height: 10,
            pixels: Vec::new(),
        };
        assert!(matches!(encode_jpeg(&frame, 80), Err(FarmaError::Encode(_))));
    }

    #[test]
    fn test_lower_quality_is_not_larger() {
        // Noisy content so quality actually matters.
        let pixels = (0..64 * 64 * 3).map(|i| ((i * 7919) % 251) as u8).collect();
        let frame = Frame {
            width: 64,
            height: 64,
            pixels,
        };
        let high = encode_jpeg(&frame, 95).unwrap();
        let low = encode_jpeg(&frame, 10).unwrap();
        assert!(low.len() < high.len());
    }
}
