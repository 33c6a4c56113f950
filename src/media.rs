//! Immutable image handles.
//!
//! An [`ImageData`] is the opaque byte source shared by catalog entries,
//! placements and session images. Cloning is cheap; the bytes are never
//! mutated after construction.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::{Result, RoomstageError};

/// Mime type used when the bytes do not look like any known image format.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Encoded image bytes plus their mime type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageData {
    /// Wrap bytes with an explicit mime type.
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Wrap bytes, sniffing the mime type from magic bytes.
    pub fn sniff(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let mime_type = image::guess_format(&bytes)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| UNKNOWN_MIME.to_string());
        Self { bytes, mime_type }
    }

    /// Encode a decoded image in the given format.
    pub fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Self> {
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), format)?;
        Ok(Self::new(out, format.to_mime_type()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True if the bytes are non-empty and in a recognised image format,
    /// i.e. they can be sent to an external service as an inline image.
    pub fn is_transmittable(&self) -> bool {
        !self.is_empty() && self.mime_type != UNKNOWN_MIME
    }

    /// File extension matching the mime type.
    pub fn extension(&self) -> &'static str {
        ImageFormat::from_mime_type(&self.mime_type)
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin")
    }

    /// Natural pixel dimensions, read from the header without a full decode.
    ///
    /// Returns `None` when the header is unreadable or either dimension is zero.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let reader = ImageReader::new(Cursor::new(self.bytes()))
            .with_guessed_format()
            .ok()?;
        match reader.into_dimensions() {
            Ok((w, h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    /// Fully decode the image.
    pub fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory(self.bytes())
            .map_err(|e| RoomstageError::Image(format!("Failed to decode image: {}", e)))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::solid_png;
    use super::*;

    #[test]
    fn test_sniff_png() {
        let png = solid_png(4, 3, [255, 0, 0, 255]);
        let sniffed = ImageData::sniff(png.bytes().to_vec());
        assert_eq!(sniffed.mime_type(), "image/png");
        assert_eq!(sniffed.extension(), "png");
        assert!(sniffed.is_transmittable());
    }

    #[test]
    fn test_sniff_garbage() {
        let data = ImageData::sniff(b"definitely not an image".to_vec());
        assert_eq!(data.mime_type(), UNKNOWN_MIME);
        assert!(!data.is_transmittable());
        assert_eq!(data.dimensions(), None);
    }

    #[test]
    fn test_empty_is_not_transmittable() {
        let data = ImageData::sniff(Vec::new());
        assert!(data.is_empty());
        assert!(!data.is_transmittable());
    }

    #[test]
    fn test_dimensions_from_header() {
        let png = solid_png(300, 200, [0, 0, 0, 255]);
        assert_eq!(png.dimensions(), Some((300, 200)));
    }
}
