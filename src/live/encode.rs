//! Image-to-text encoding for image turns.
//!
//! The AR shell hands the client an opaque captured image; before an image
//! turn can be sent it must be encoded to base64 on a worker task. The trait
//! seam exists so tests can inject encoders that fail on demand.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;
use tracing::debug;

/// Target encoding for an image part. Chooses the mime type on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

impl Default for ImageFormat {
    fn default() -> Self {
        ImageFormat::Jpeg
    }
}

/// Compression quality hint passed through to the capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionQuality {
    Low,
    Medium,
    High,
}

impl Default for CompressionQuality {
    fn default() -> Self {
        CompressionQuality::High
    }
}

/// An opaque image handle produced by the capture collaborator.
///
/// Holds the already-compressed image bytes in the configured format.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    bytes: Vec<u8>,
}

impl CapturedImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EncodeError(pub String);

/// Asynchronous binary-to-text image encoding.
#[async_trait]
pub trait ImageEncoder: Send + Sync {
    async fn encode(
        &self,
        image: &CapturedImage,
        quality: CompressionQuality,
        format: ImageFormat,
    ) -> Result<String, EncodeError>;
}

/// Base64 encoder over the captured bytes.
pub struct Base64ImageEncoder;

#[async_trait]
impl ImageEncoder for Base64ImageEncoder {
    async fn encode(
        &self,
        image: &CapturedImage,
        quality: CompressionQuality,
        format: ImageFormat,
    ) -> Result<String, EncodeError> {
        if image.bytes.is_empty() {
            return Err(EncodeError("image contains no data".to_string()));
        }

        let encoded = BASE64.encode(&image.bytes);
        debug!(
            input_bytes = image.bytes.len(),
            output_chars = encoded.len(),
            ?quality,
            ?format,
            "Encoded image for transmission"
        );
        Ok(encoded)
    }
}
