#![warn(missing_docs)]
//! # dermalens-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `dermalens` workspace.
//!
//! ## Responsibilities
//! - Represent decoded camera frames with validated pixel geometry.
//! - Represent compressed image payloads ready for submission.
//! - Build immutable diagnostic requests and their wire encodings.
//!
//! ## Data flow
//! Capture sources emit [`Frame`] values, encode them into [`ImagePayload`],
//! and wrap the payload into a [`DiagnosticRequest`] that the submission
//! client sends as base64 inline data.
//!
//! ## Ownership and lifetimes
//! Frames and payloads own their backing buffers (`Vec<u8>`) so that a
//! request can outlive the stream or file it was produced from.
//!
//! ## Error model
//! Validation failures (shape mismatch, empty payload, non-image MIME type)
//! return [`CoreError`] variants.
//!
//! ## Security and privacy notes
//! Image bytes are never formatted into `Debug` output or logs; use
//! [`DiagnosticRequest::fingerprint`] for correlation instead.
//!
//! ## Example
//! ```rust
//! use dermalens_core::{DiagnosticRequest, ImagePayload, MIME_JPEG};
//!
//! let payload = ImagePayload::new(vec![0xff, 0xd8, 0xff], MIME_JPEG).unwrap();
//! let request = DiagnosticRequest::from_payload(payload);
//! assert_eq!(request.to_base64(), "/9j/");
//! ```

use std::fmt;

use base64::Engine as _;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// MIME type used for every encoded capture.
pub const MIME_JPEG: &str = "image/jpeg";

/// Represents one decoded frame from a live stream or an uploaded file.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Label of the source that produced the frame (stream id or file name).
    pub source_id: String,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Capture time in Unix epoch milliseconds.
    pub captured_at_ms: u64,
    /// Raw RGBA pixel buffer (`width * height * 4` bytes).
    pub rgba: Vec<u8>,
}

impl Frame {
    /// Constructs a validated frame.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyFrame`] for zero-sized geometry and
    /// [`CoreError::InvalidFrameShape`] when the pixel buffer length is not
    /// exactly `width * height * 4`.
    pub fn new(
        source_id: impl Into<String>,
        width: u32,
        height: u32,
        captured_at_ms: u64,
        rgba: Vec<u8>,
    ) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::EmptyFrame);
        }

        let expected_len = required_rgba_len(width, height)?;
        if rgba.len() != expected_len {
            return Err(CoreError::InvalidFrameShape {
                expected: expected_len,
                actual: rgba.len(),
            });
        }

        Ok(Self {
            source_id: source_id.into(),
            width,
            height,
            captured_at_ms,
            rgba,
        })
    }

    /// Returns the RGB bytes of this frame with the alpha channel dropped.
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity((self.rgba.len() / 4) * 3);
        for px in self.rgba.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }
        rgb
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("source_id", &self.source_id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at_ms", &self.captured_at_ms)
            .field("rgba_len", &self.rgba.len())
            .finish()
    }
}

/// Compressed image bytes plus their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImagePayload {
    /// Creates a payload from already-encoded image bytes.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyPayload`] when `bytes` is empty and
    /// [`CoreError::InvalidMimeType`] when the MIME type is not `image/*`.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<Self, CoreError> {
        if bytes.is_empty() {
            return Err(CoreError::EmptyPayload);
        }

        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(CoreError::InvalidMimeType(mime_type));
        }

        Ok(Self { bytes, mime_type })
    }

    /// Returns encoded image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the MIME type.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Returns the encoded size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false` for a constructed payload.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Immutable value sent to the diagnostic service, one per submission attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct DiagnosticRequest {
    image_bytes: Vec<u8>,
    mime_type: String,
}

impl DiagnosticRequest {
    /// Wraps a normalized image payload.
    pub fn from_payload(payload: ImagePayload) -> Self {
        Self {
            image_bytes: payload.bytes,
            mime_type: payload.mime_type,
        }
    }

    /// Returns raw image bytes.
    pub fn image_bytes(&self) -> &[u8] {
        &self.image_bytes
    }

    /// Returns the image MIME type.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Encodes image bytes as standard base64 for inline transport.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.image_bytes)
    }

    /// Returns a short, stable SHA-256 fingerprint of the image bytes.
    ///
    /// The fingerprint is safe to log; the bytes themselves are not.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.image_bytes);
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for DiagnosticRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticRequest")
            .field("mime_type", &self.mime_type)
            .field("len", &self.image_bytes.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Error type for core model validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Frame geometry must be non-zero.
    #[error("frame has zero width or height")]
    EmptyFrame,
    /// Frame buffer shape does not match declared geometry.
    #[error("invalid frame shape: expected {expected} bytes, got {actual}")]
    InvalidFrameShape {
        /// Expected RGBA byte count.
        expected: usize,
        /// Actual RGBA byte count.
        actual: usize,
    },
    /// Frame dimensions overflow addressable memory.
    #[error("frame dimensions overflow")]
    Overflow,
    /// Encoded image payload contained no bytes.
    #[error("image payload is empty")]
    EmptyPayload,
    /// MIME type is not an image type.
    #[error("unsupported mime type: {0}")]
    InvalidMimeType(String),
}

fn required_rgba_len(width: u32, height: u32) -> Result<usize, CoreError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(CoreError::Overflow)
}
