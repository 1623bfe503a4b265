//! Image inputs and the data URI encoding the try-on service expects.

use std::io::Cursor;
use std::path::Path;
use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageFormat};
use crate::error::{Result, TryOnError};

pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Encode raw image bytes as a JPEG-labelled data URI.
///
/// The bytes are not inspected: PNG input is forwarded under the JPEG label
/// and the service sniffs the real format.
pub fn encode_data_uri(bytes: &[u8]) -> String {
    let mut uri = String::with_capacity(JPEG_DATA_URI_PREFIX.len() + bytes.len() * 4 / 3 + 4);
    uri.push_str(JPEG_DATA_URI_PREFIX);
    general_purpose::STANDARD.encode_string(bytes, &mut uri);
    uri
}

/// Re-encode a decoded image as JPEG. Alpha is dropped.
pub fn to_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?;
    Ok(buf)
}

/// One of the two photographs of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    bytes: Vec<u8>,
}

impl ImageInput {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            TryOnError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self { bytes })
    }

    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        Ok(Self { bytes: to_jpeg(image)? })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_data_uri(&self) -> String {
        encode_data_uri(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_data_uri_prefix() {
        for bytes in [&b""[..], &b"\xff\xd8\xff"[..], &b"\x89PNG\r\n\x1a\n"[..]] {
            assert!(encode_data_uri(bytes).starts_with(JPEG_DATA_URI_PREFIX));
        }
    }

    #[test]
    fn test_payload_decodes_to_input() {
        let input = ImageInput::from_bytes(b"fake_image_data".to_vec());
        let uri = input.to_data_uri();
        let payload = uri.strip_prefix(JPEG_DATA_URI_PREFIX).unwrap();
        let decoded = general_purpose::STANDARD.decode(payload).unwrap();
        assert_eq!(decoded, b"fake_image_data");
    }

    #[test]
    fn test_from_image_is_jpeg() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([255, 0, 0, 128])));
        let input = ImageInput::from_image(&img).unwrap();
        assert_eq!(&input.bytes()[..2], &[0xff, 0xd8]);
        assert_eq!(image::guess_format(input.bytes()).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_from_missing_path() {
        let err = ImageInput::from_path("does/not/exist.jpg").unwrap_err();
        assert!(matches!(err, TryOnError::InvalidInput(_)));
    }
}
