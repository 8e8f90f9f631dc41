//! Error types for the sprite-prep crate.

use image::RgbaImage;

/// Errors that can occur while preparing an asset.
///
/// Missing optional capabilities and watermark detection misses are not
/// errors; they select a fallback path instead. Only malformed input, failing
/// external services and the I/O layer surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The image has no pixels.
    #[error("empty image ({width}x{height})")]
    EmptyImage {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// A raw pixel buffer does not describe a full RGBA grid.
    #[error("malformed pixel buffer: {len} bytes cannot hold {width}x{height} RGBA pixels")]
    MalformedBuffer {
        /// Declared width in pixels.
        width: u32,
        /// Declared height in pixels.
        height: u32,
        /// Actual buffer length in bytes.
        len: usize,
    },

    /// An external service returned an image of unexpected size.
    #[error("{service} returned {actual_w}x{actual_h}, expected {expected_w}x{expected_h}")]
    DimensionMismatch {
        /// Name of the service that produced the image.
        service: &'static str,
        /// Expected width.
        expected_w: u32,
        /// Expected height.
        expected_h: u32,
        /// Returned width.
        actual_w: u32,
        /// Returned height.
        actual_h: u32,
    },

    /// An external capability (inpainting model, background remover) failed.
    #[error("{service} failed: {message}")]
    External {
        /// Name of the failing service.
        service: &'static str,
        /// Failure description as reported by the service.
        message: String,
    },

    /// A user-supplied parameter could not be parsed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image decoding or encoding.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// A manifest or parameter file could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Reject zero-area images before any transform touches them.
pub(crate) fn ensure_not_empty(image: &RgbaImage) -> Result<()> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::EmptyImage { width, height });
    }
    Ok(())
}

/// Check that an image returned by an external service matches the input size.
pub(crate) fn ensure_same_size(
    service: &'static str,
    expected: &RgbaImage,
    actual: &RgbaImage,
) -> Result<()> {
    if expected.dimensions() != actual.dimensions() {
        return Err(Error::DimensionMismatch {
            service,
            expected_w: expected.width(),
            expected_h: expected.height(),
            actual_w: actual.width(),
            actual_h: actual.height(),
        });
    }
    Ok(())
}

/// Build an RGBA image from a raw, row-major pixel buffer.
///
/// # Errors
///
/// Returns [`Error::MalformedBuffer`] if `bytes` is not exactly
/// `width * height * 4` long, and [`Error::EmptyImage`] for a zero-area grid.
pub fn rgba_from_raw(width: u32, height: u32, bytes: Vec<u8>) -> Result<RgbaImage> {
    let len = bytes.len();
    let expected = width as usize * height as usize * 4;
    if len != expected {
        return Err(Error::MalformedBuffer { width, height, len });
    }
    let image = RgbaImage::from_raw(width, height, bytes).ok_or(Error::MalformedBuffer {
        width,
        height,
        len,
    })?;
    ensure_not_empty(&image)?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("tiff".to_string());
        assert!(unsupported.to_string().contains("tiff"));

        let empty = Error::EmptyImage {
            width: 0,
            height: 20,
        };
        assert!(empty.to_string().contains("0x20"));

        let mismatch = Error::DimensionMismatch {
            service: "inpainter",
            expected_w: 64,
            expected_h: 64,
            actual_w: 32,
            actual_h: 32,
        };
        let msg = mismatch.to_string();
        assert!(msg.contains("inpainter"));
        assert!(msg.contains("32x32"));
        assert!(msg.contains("64x64"));
    }

    #[test]
    fn rgba_from_raw_accepts_exact_buffer() {
        let img = rgba_from_raw(2, 3, vec![7; 2 * 3 * 4]).unwrap();
        assert_eq!(img.dimensions(), (2, 3));
        assert_eq!(img.get_pixel(1, 2).0, [7, 7, 7, 7]);
    }

    #[test]
    fn rgba_from_raw_rejects_short_and_long_buffers() {
        assert!(matches!(
            rgba_from_raw(4, 4, vec![0; 10]),
            Err(Error::MalformedBuffer { len: 10, .. })
        ));
        assert!(matches!(
            rgba_from_raw(1, 1, vec![0; 8]),
            Err(Error::MalformedBuffer { len: 8, .. })
        ));
    }

    #[test]
    fn rgba_from_raw_rejects_empty_grid() {
        assert!(matches!(
            rgba_from_raw(0, 5, Vec::new()),
            Err(Error::EmptyImage { .. })
        ));
    }

    #[test]
    fn ensure_same_size_flags_resized_output() {
        let a = RgbaImage::new(8, 8);
        let b = RgbaImage::new(8, 4);
        assert!(ensure_same_size("svc", &a, &a.clone()).is_ok());
        assert!(matches!(
            ensure_same_size("svc", &a, &b),
            Err(Error::DimensionMismatch { actual_h: 4, .. })
        ));
    }
}
