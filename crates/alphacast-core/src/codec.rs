//! Binary frame codec for alphacast
//!
//! Each frame is sent as one self-describing binary WebSocket message:
//! - 4 bytes: width (little-endian u32)
//! - 4 bytes: height (little-endian u32)
//! - 4 bytes: color segment length (little-endian u32)
//! - Variable: JPEG-compressed RGB plane
//! - Remainder: zlib-compressed alpha plane (no length prefix)
//!
//! JPEG keeps the color plane small at a tunable quality; the alpha plane is
//! single-channel and compresses well even at the fastest zlib level.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;

use crate::frame::Frame;

/// Size of the payload header in bytes (width + height + color length)
pub const HEADER_SIZE: usize = 12;

/// Default JPEG quality, balancing encode speed against size
pub const DEFAULT_QUALITY: u8 = 80;

/// Errors that can occur while encoding or decoding frames
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame planes are missing or do not match the stated dimensions
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Payload does not follow the wire format
    #[error("malformed payload: {0}")]
    Format(String),

    /// JPEG encoder or decoder failure
    #[error("jpeg error: {0}")]
    Jpeg(#[from] image::ImageError),

    /// zlib stream failure
    #[error("zlib error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoded payload header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    pub width: u32,
    pub height: u32,
    /// Exact byte length of the JPEG segment following the header
    pub color_len: u32,
}

impl PayloadHeader {
    /// Parse the header from the start of a payload
    ///
    /// Also checks that the color segment fits in the buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CodecError::Format(format!(
                "need at least {} header bytes, have {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let header = PayloadHeader {
            width: read_u32_le(bytes, 0),
            height: read_u32_le(bytes, 4),
            color_len: read_u32_le(bytes, 8),
        };

        let available = bytes.len() - HEADER_SIZE;
        if header.color_len as usize > available {
            return Err(CodecError::Format(format!(
                "color segment length {} exceeds remaining {} bytes",
                header.color_len, available
            )));
        }

        Ok(header)
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.color_len.to_le_bytes());
    }
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// An encoded frame ready to be sent
///
/// Cloning is cheap: all clones share the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Bytes);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Shared handle to the underlying buffer
    pub fn bytes(&self) -> Bytes {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn header(&self) -> Result<PayloadHeader, CodecError> {
        PayloadHeader::parse(&self.0)
    }
}

/// Turns frames into wire payloads
///
/// Implemented by [`FrameCodec`]; the server holds it as
/// `Arc<dyn PayloadEncoder>` so encoding can be moved onto the blocking pool.
pub trait PayloadEncoder: Send + Sync {
    fn encode(&self, frame: &Frame) -> Result<Payload, CodecError>;
}

/// JPEG + zlib frame codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    quality: u8,
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new(DEFAULT_QUALITY)
    }
}

impl FrameCodec {
    /// Create a codec with the given JPEG quality (clamped to 1..=100)
    pub fn new(quality: u8) -> Self {
        FrameCodec {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// JPEG-encode an RGB plane at this codec's quality
    ///
    /// Baseline encoding without an optimized Huffman pass.
    pub fn encode_color(&self, frame: &Frame) -> Result<Vec<u8>, CodecError> {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode(
            frame.color(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(jpeg)
    }

    /// zlib-compress the alpha plane at the fastest level
    pub fn encode_alpha(&self, frame: &Frame) -> Result<Vec<u8>, CodecError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(frame.alpha())?;
        Ok(encoder.finish()?)
    }

    /// Encode a frame into a single wire payload
    pub fn encode(&self, frame: &Frame) -> Result<Payload, CodecError> {
        let color = self.encode_color(frame)?;
        let alpha = self.encode_alpha(frame)?;

        let color_len = u32::try_from(color.len()).map_err(|_| {
            CodecError::InvalidFrame(format!("color segment too large: {} bytes", color.len()))
        })?;

        let header = PayloadHeader {
            width: frame.width(),
            height: frame.height(),
            color_len,
        };

        let mut out = Vec::with_capacity(HEADER_SIZE + color.len() + alpha.len());
        header.write_to(&mut out);
        out.extend_from_slice(&color);
        out.extend_from_slice(&alpha);

        Ok(Payload(Bytes::from(out)))
    }

    /// Decode a wire payload back into a frame
    ///
    /// The color plane is lossy; dimensions and alpha round-trip exactly.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Format`] if the header is truncated, the color
    /// segment overruns the buffer, the JPEG dimensions disagree with the
    /// header, or the alpha plane does not hold exactly `width * height`
    /// bytes.
    pub fn decode(bytes: &[u8]) -> Result<Frame, CodecError> {
        let header = PayloadHeader::parse(bytes)?;
        let pixels = crate::frame::pixel_count(header.width, header.height)
            .map_err(|e| CodecError::Format(e.to_string()))?;

        let color_end = HEADER_SIZE + header.color_len as usize;
        let color_segment = &bytes[HEADER_SIZE..color_end];
        let alpha_segment = &bytes[color_end..];

        let rgb = image::load_from_memory_with_format(color_segment, ImageFormat::Jpeg)?.to_rgb8();
        if rgb.width() != header.width || rgb.height() != header.height {
            return Err(CodecError::Format(format!(
                "jpeg is {}x{}, header says {}x{}",
                rgb.width(),
                rgb.height(),
                header.width,
                header.height
            )));
        }

        // Read one byte past the expected size so oversize planes are caught
        // without inflating an unbounded stream.
        let mut alpha = Vec::with_capacity(pixels);
        ZlibDecoder::new(alpha_segment)
            .take(pixels as u64 + 1)
            .read_to_end(&mut alpha)?;
        if alpha.len() != pixels {
            return Err(CodecError::Format(format!(
                "alpha plane decompressed to {} bytes, expected {}",
                alpha.len(),
                pixels
            )));
        }

        Frame::new(header.width, header.height, rgb.into_raw(), alpha)
    }
}

impl PayloadEncoder for FrameCodec {
    fn encode(&self, frame: &Frame) -> Result<Payload, CodecError> {
        FrameCodec::encode(self, frame)
    }
}
