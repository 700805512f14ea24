use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("frame decode failed: {0}")]
    Malformed(#[from] image::ImageError),
    #[error("pixel buffer length {got} does not match {width}x{height} RGB")]
    BufferSize { width: u32, height: u32, got: usize },
}

/// A single decoded camera frame: contiguous RGB pixels, row-major.
///
/// Chronological position in the capture sequence matters for liveness
/// variance; quality selection ignores ordering.
#[derive(Clone)]
pub struct Frame {
    pixels: RgbImage,
}

impl Frame {
    /// Wrap a raw RGB buffer. Fails if the buffer length does not match
    /// `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self, DecodeError> {
        let got = data.len();
        let pixels = RgbImage::from_raw(width, height, data)
            .ok_or(DecodeError::BufferSize { width, height, got })?;
        Ok(Self { pixels })
    }

    /// Decode an encoded image (PNG, JPEG, ...) into a frame.
    ///
    /// A malformed payload is fatal for the request that supplied it —
    /// callers must not silently drop undecodable frames from a liveness
    /// sequence, since that would change its temporal basis.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let pixels = image::load_from_memory(bytes)?.to_rgb8();
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub(crate) fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_checks_buffer_length() {
        let err = Frame::from_rgb(10, 10, vec![0u8; 5]).unwrap_err();
        assert!(matches!(err, DecodeError::BufferSize { got: 5, .. }));

        let frame = Frame::from_rgb(10, 10, vec![0u8; 300]).unwrap();
        assert_eq!(frame.width(), 10);
        assert_eq!(frame.height(), 10);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = Frame::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn decode_roundtrip_png() {
        let img = RgbImage::from_pixel(4, 3, image::Rgb([200, 10, 30]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();

        let frame = Frame::decode(bytes.get_ref()).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
    }
}
