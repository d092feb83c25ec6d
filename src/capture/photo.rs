use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// Image bytes ready to embed in an inference request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: String,
}

impl EncodedImage {
    pub fn encode(bytes: &[u8], mime_type: &str) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            mime_type: mime_type.to_string(),
        }
    }

    /// Accepts either a bare base64 payload or a `data:<mime>;base64,<payload>`
    /// URL and keeps only the payload. Without a prefix the MIME type comes
    /// from `fallback_mime`.
    pub fn from_data_url(input: &str, fallback_mime: &str) -> Self {
        let input = input.trim();
        if let Some(rest) = input.strip_prefix("data:") {
            if let Some((header, payload)) = rest.split_once(',') {
                let mime = header
                    .split(';')
                    .next()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(fallback_mime);
                return Self {
                    data: payload.to_string(),
                    mime_type: mime.to_string(),
                };
            }
        }
        Self {
            data: input.to_string(),
            mime_type: fallback_mime.to_string(),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Approximate decoded size, for logging.
    pub fn decoded_len(&self) -> usize {
        self.data.len() / 4 * 3
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagePreview {
    pub path: PathBuf,
    pub mime_type: String,
    pub byte_len: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// An image picked by the user, held in memory for the rest of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    pub preview: ImagePreview,
    bytes: Vec<u8>,
}

impl SelectedImage {
    pub fn from_bytes(path: PathBuf, bytes: Vec<u8>, max_bytes: u64) -> Result<Self> {
        let byte_len = bytes.len() as u64;
        if byte_len == 0 {
            return Err(AppError::Validation(format!(
                "{} is empty.",
                path.display()
            )));
        }
        if byte_len > max_bytes {
            return Err(AppError::Validation(format!(
                "{} is {} bytes; the limit is {} bytes.",
                path.display(),
                byte_len,
                max_bytes
            )));
        }

        let mime_type = sniff_mime(&bytes, &path).ok_or_else(|| {
            AppError::Validation(format!("{} is not a recognised image.", path.display()))
        })?;

        let (width, height) = match image::load_from_memory(&bytes) {
            Ok(img) => (Some(img.width()), Some(img.height())),
            Err(e) => {
                log::debug!("No dimensions for {}: {}", path.display(), e);
                (None, None)
            }
        };

        Ok(Self {
            preview: ImagePreview {
                path,
                mime_type,
                byte_len,
                width,
                height,
            },
            bytes,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encode(&self) -> EncodedImage {
        EncodedImage::encode(&self.bytes, &self.preview.mime_type)
    }
}

/// Reads the whole file. This is the one await point before a request can
/// be built.
pub async fn select_image(path: impl AsRef<Path>, max_bytes: u64) -> Result<SelectedImage> {
    let path = path.as_ref().to_path_buf();

    let meta = tokio::fs::metadata(&path).await.map_err(|source| AppError::Read {
        path: path.display().to_string(),
        source,
    })?;
    if meta.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "{} is {} bytes; the limit is {} bytes.",
            path.display(),
            meta.len(),
            max_bytes
        )));
    }

    let bytes = tokio::fs::read(&path).await.map_err(|source| AppError::Read {
        path: path.display().to_string(),
        source,
    })?;

    SelectedImage::from_bytes(path, bytes, max_bytes)
}

/// The bytes decide. The extension is only consulted for formats without a
/// signature (TGA), and then the bytes must still decode as that format.
fn sniff_mime(bytes: &[u8], path: &Path) -> Option<String> {
    let format = match image::guess_format(bytes) {
        Ok(format) => format,
        Err(_) => match image::ImageFormat::from_path(path) {
            Ok(image::ImageFormat::Tga)
                if image::load_from_memory_with_format(bytes, image::ImageFormat::Tga).is_ok() =>
            {
                image::ImageFormat::Tga
            }
            _ => return None,
        },
    };
    Some(format.to_mime_type().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([200, 10, 10]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        let img = EncodedImage::from_data_url("data:image/png;base64,AAAA", "image/jpeg");
        assert_eq!(img.data, "AAAA");
        assert_eq!(img.mime_type, "image/png");
    }

    #[test]
    fn bare_payload_uses_fallback_mime() {
        let img = EncodedImage::from_data_url("AAAA", "image/jpeg");
        assert_eq!(img.data, "AAAA");
        assert_eq!(img.mime_type, "image/jpeg");
        assert_eq!(img.data_url(), "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn encode_uses_standard_alphabet() {
        let img = EncodedImage::encode(&[0xfb, 0xff], "image/png");
        assert_eq!(img.data, "+/8=");
    }

    #[test]
    fn png_bytes_are_sniffed_and_measured() {
        let selected =
            SelectedImage::from_bytes(PathBuf::from("menu.bin"), tiny_png(), 1024 * 1024).unwrap();
        assert_eq!(selected.preview.mime_type, "image/png");
        assert_eq!(selected.preview.width, Some(3));
        assert_eq!(selected.preview.height, Some(2));
    }

    #[test]
    fn image_extension_does_not_vouch_for_text() {
        assert!(matches!(
            SelectedImage::from_bytes(
                PathBuf::from("notes.jpg"),
                b"hello, this is a text file".to_vec(),
                1024
            ),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            SelectedImage::from_bytes(PathBuf::from("receipt.tga"), vec![1, 2, 3], 1024),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn signature_wins_over_extension() {
        let selected =
            SelectedImage::from_bytes(PathBuf::from("receipt.jpg"), tiny_png(), 1024 * 1024)
                .unwrap();
        assert_eq!(selected.preview.mime_type, "image/png");
    }

    #[test]
    fn unknown_and_oversized_files_are_rejected() {
        assert!(matches!(
            SelectedImage::from_bytes(PathBuf::from("notes.txt"), b"hello".to_vec(), 1024),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            SelectedImage::from_bytes(PathBuf::from("big.png"), tiny_png(), 10),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            SelectedImage::from_bytes(PathBuf::from("empty.png"), Vec::new(), 10),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let err = select_image("/definitely/not/here.png", 1024).await.unwrap_err();
        assert!(matches!(err, AppError::Read { .. }));
    }
}
