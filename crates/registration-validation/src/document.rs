//! Signature / ID document checks
//!
//! Only still images are accepted. The declared content type must agree with
//! the format detected from the file's magic bytes.

use serde::{Deserialize, Serialize};

use crate::result::{ValidationErrorCode, ValidationResult};

/// Default upload limit (5 MiB)
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

pub const ACCEPTED_CONTENT_TYPES: [&str; 4] =
    ["image/png", "image/jpeg", "image/gif", "image/webp"];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl ImageFormat {
    /// Detect the image format from the leading bytes
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::WebP)
        } else {
            None
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageFormat::Jpeg),
            "image/gif" => Some(ImageFormat::Gif),
            "image/webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Guess from a file extension, for callers without a declared type
    pub fn from_extension(file_name: &str) -> Option<Self> {
        let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "gif" => Some(ImageFormat::Gif),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
        }
    }
}

/// Validate a selected document before it is held for upload
pub fn validate_document(
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
    max_bytes: usize,
) -> ValidationResult {
    let mut result = ValidationResult::new();

    if file_name.trim().is_empty() {
        result.add_error(
            "document",
            "Document file name is required",
            ValidationErrorCode::Required,
        );
    }

    if bytes.is_empty() {
        result.add_error("document", "Document is empty", ValidationErrorCode::Required);
        return result;
    }

    if bytes.len() > max_bytes {
        result.add_error(
            "document",
            &format!("Document is {} bytes, limit is {}", bytes.len(), max_bytes),
            ValidationErrorCode::TooLong,
        );
    }

    let declared = match ImageFormat::from_content_type(content_type) {
        Some(format) => format,
        None => {
            result.add_error(
                "document",
                &format!(
                    "Unsupported content type '{}'. Accepted: {}",
                    content_type,
                    ACCEPTED_CONTENT_TYPES.join(", ")
                ),
                ValidationErrorCode::InvalidFormat,
            );
            return result;
        }
    };

    match ImageFormat::detect(bytes) {
        Some(detected) if detected == declared => {}
        Some(detected) => result.add_error(
            "document",
            &format!(
                "Document declared as {} but contains {} data",
                declared.content_type(),
                detected.content_type()
            ),
            ValidationErrorCode::InvalidFormat,
        ),
        None => result.add_error(
            "document",
            "Document is not a recognizable image",
            ValidationErrorCode::InvalidFormat,
        ),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F'];

    #[test]
    fn test_detect_formats() {
        assert_eq!(ImageFormat::detect(PNG), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::detect(JPEG), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::detect(b"GIF89a\x01\x00"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::detect(b"RIFF\x24\x00\x00\x00WEBPVP8 "), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::detect(b"%PDF-1.7"), None);
        assert_eq!(ImageFormat::detect(b""), None);
    }

    #[test]
    fn test_content_type_parsing() {
        assert_eq!(ImageFormat::from_content_type("image/png"), Some(ImageFormat::Png));
        assert_eq!(
            ImageFormat::from_content_type("IMAGE/JPEG; charset=binary"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::from_content_type("application/pdf"), None);
        assert_eq!(ImageFormat::from_extension("scan.JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("noext"), None);
    }

    #[test]
    fn test_valid_document() {
        let result = validate_document(
            "signature.png",
            "image/png",
            PNG,
            DEFAULT_MAX_DOCUMENT_BYTES,
        );
        assert!(result.is_valid(), "{}", result);
    }

    #[test]
    fn test_empty_document() {
        let result = validate_document(
            "signature.png",
            "image/png",
            &[],
            DEFAULT_MAX_DOCUMENT_BYTES,
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ValidationErrorCode::Required);
    }

    #[test]
    fn test_oversized_document() {
        let result = validate_document("signature.png", "image/png", PNG, 4);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ValidationErrorCode::TooLong);
    }

    #[test]
    fn test_unsupported_content_type() {
        let result = validate_document(
            "id.pdf",
            "application/pdf",
            b"%PDF-1.7",
            DEFAULT_MAX_DOCUMENT_BYTES,
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ValidationErrorCode::InvalidFormat);
    }

    #[test]
    fn test_mismatched_content_type() {
        let result = validate_document(
            "signature.png",
            "image/png",
            JPEG,
            DEFAULT_MAX_DOCUMENT_BYTES,
        );
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("declared as image/png"));
    }
}
