//! Document capture
//!
//! Holds the one signature / ID image selected for an entity. Selecting a
//! file produces a local preview straight away, with no network involved.
//! Once the upload succeeds the capture is locked: the digest of the
//! uploaded bytes is fixed and further selections are refused.

use std::sync::Arc;

use registration_validation::{validate_document, ImageFormat, ValidationResult};
use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;

/// The raw bytes of a selected document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentAsset {
    pub file_name: String,
    pub content_type: String,
    bytes: Arc<[u8]>,
}

impl DocumentAsset {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Locally produced description of the selected document
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentPreview {
    pub file_name: String,
    pub content_type: String,
    pub format: ImageFormat,
    pub byte_len: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    #[error("document is locked after a successful upload")]
    Locked,
    #[error("{0}")]
    Invalid(ValidationResult),
}

#[derive(Clone, Debug)]
pub struct DocumentCapture {
    max_bytes: usize,
    asset: Option<DocumentAsset>,
    preview: Option<DocumentPreview>,
    locked_digest: Option<ContentDigest>,
}

impl DocumentCapture {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            asset: None,
            preview: None,
            locked_digest: None,
        }
    }

    /// Select a document, replacing any previous selection and its preview
    pub fn select(
        &mut self,
        file_name: &str,
        content_type: &str,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<&DocumentPreview, CaptureError> {
        if self.is_locked() {
            return Err(CaptureError::Locked);
        }

        let bytes: Arc<[u8]> = bytes.into();
        validate_document(file_name, content_type, &bytes, self.max_bytes)
            .into_result()
            .map_err(CaptureError::Invalid)?;

        // validate_document only passes when the magic bytes were recognized
        let format = ImageFormat::detect(&bytes)
            .or_else(|| ImageFormat::from_content_type(content_type))
            .unwrap_or(ImageFormat::Png);

        let preview = DocumentPreview {
            file_name: file_name.to_string(),
            content_type: format.content_type().to_string(),
            format,
            byte_len: bytes.len(),
        };
        self.asset = Some(DocumentAsset::new(file_name, format.content_type(), bytes));
        Ok(self.preview.insert(preview))
    }

    pub fn is_attached(&self) -> bool {
        self.asset.is_some()
    }

    pub fn asset(&self) -> Option<&DocumentAsset> {
        self.asset.as_ref()
    }

    pub fn preview(&self) -> Option<&DocumentPreview> {
        self.preview.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked_digest.is_some()
    }

    pub fn digest(&self) -> Option<ContentDigest> {
        self.locked_digest
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Lock the capture to the bytes that were uploaded.
    ///
    /// The digest is computed once; later calls return the stored value.
    pub fn lock(&mut self, uploaded: &DocumentAsset) -> ContentDigest {
        *self
            .locked_digest
            .get_or_insert_with(|| ContentDigest::of(uploaded.bytes()))
    }

    /// Drop the document bytes once they are no longer needed
    pub fn release(&mut self) {
        self.asset = None;
    }

    pub(crate) fn restore(
        &mut self,
        asset: Option<DocumentAsset>,
        preview: Option<DocumentPreview>,
        locked_digest: Option<ContentDigest>,
    ) {
        self.asset = asset;
        self.preview = preview;
        self.locked_digest = locked_digest;
    }
}
