//! Capture sources that normalize a live stream or an uploaded file into one
//! JPEG [`ImagePayload`].

use std::io::Cursor;

use dermalens_core::{Frame, ImagePayload, MIME_JPEG};
use image::codecs::jpeg::JpegEncoder;

use crate::{CaptureError, MediaStream};

/// JPEG quality used for every normalized capture (roughly 0.8).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// A place an image can be acquired from.
///
/// Implementations are selected at runtime: devices without a camera only
/// ever use [`FileSource`].
pub trait CaptureSource {
    /// Short source label for logs.
    fn kind(&self) -> &'static str;

    /// Produces one normalized image payload.
    ///
    /// # Errors
    /// Returns [`CaptureError`] when the source has nothing to read, or when
    /// decode/encode fails.
    fn acquire(&self) -> Result<ImagePayload, CaptureError>;
}

/// One frame grabbed from a live stream at its native resolution.
///
/// Grabbing needs the stream; encoding does not, so callers can release the
/// stream's owner before calling [`CaptureSource::acquire`].
pub struct LiveStreamSource {
    frame: Frame,
    quality: u8,
}

impl LiveStreamSource {
    /// Reads the current frame of `stream`.
    ///
    /// # Errors
    /// Returns [`CaptureError::StreamEnded`] once the stream was stopped.
    pub fn grab(
        stream: &dyn MediaStream,
        captured_at_ms: u64,
        quality: u8,
    ) -> Result<Self, CaptureError> {
        if !stream.is_live() {
            return Err(CaptureError::StreamEnded(stream.id().to_string()));
        }

        let frame = stream.grab_frame(captured_at_ms)?;
        Ok(Self { frame, quality })
    }
}

impl CaptureSource for LiveStreamSource {
    fn kind(&self) -> &'static str {
        "live"
    }

    fn acquire(&self) -> Result<ImagePayload, CaptureError> {
        encode_jpeg(&self.frame, self.quality)
    }
}

/// Decodes user-selected file bytes.
///
/// The only validation is that the bytes decode as an image; the result is
/// re-encoded so that files and live frames share one representation.
pub struct FileSource<'a> {
    name: &'a str,
    bytes: &'a [u8],
    captured_at_ms: u64,
    quality: u8,
}

impl<'a> FileSource<'a> {
    /// Wraps borrowed file bytes.
    pub fn new(name: &'a str, bytes: &'a [u8], captured_at_ms: u64, quality: u8) -> Self {
        Self {
            name,
            bytes,
            captured_at_ms,
            quality,
        }
    }
}

impl CaptureSource for FileSource<'_> {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn acquire(&self) -> Result<ImagePayload, CaptureError> {
        if self.bytes.is_empty() {
            return Err(CaptureError::Decode(format!("{} is empty", self.name)));
        }

        let decoded = image::load_from_memory(self.bytes)
            .map_err(|error| CaptureError::Decode(format!("{}: {error}", self.name)))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        let frame = Frame::new(
            self.name,
            width,
            height,
            self.captured_at_ms,
            decoded.into_raw(),
        )?;

        encode_jpeg(&frame, self.quality)
    }
}

/// Encodes one frame as JPEG.
///
/// # Errors
/// Returns [`CaptureError::Encode`] when the encoder fails and
/// [`CaptureError::EmptyEncode`] when it produced no bytes.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<ImagePayload, CaptureError> {
    let rgb = frame.to_rgb();
    let mut jpeg_bytes = Cursor::new(Vec::new());

    JpegEncoder::new_with_quality(&mut jpeg_bytes, quality.clamp(1, 100))
        .encode(&rgb, frame.width, frame.height, image::ColorType::Rgb8.into())
        .map_err(|error| CaptureError::Encode(error.to_string()))?;

    let jpeg_bytes = jpeg_bytes.into_inner();
    if jpeg_bytes.is_empty() {
        return Err(CaptureError::EmptyEncode);
    }

    Ok(ImagePayload::new(jpeg_bytes, MIME_JPEG)?)
}
