//! Color + transparency frame model
//!
//! A [`Frame`] is one finished video frame as handed over by the matting
//! stage: an interleaved RGB plane plus a single-channel alpha plane of the
//! same dimensions. Frames are validated on construction and immutable after.

use crate::codec::CodecError;

/// Bytes per pixel in the color plane (RGB)
pub const COLOR_CHANNELS: usize = 3;

/// A video frame carrying a transparency channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    color: Vec<u8>,
    alpha: Vec<u8>,
}

impl Frame {
    /// Create a frame from separate planes
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidFrame`] if either dimension is zero or a
    /// plane length does not match `width * height` (times 3 for color).
    pub fn new(width: u32, height: u32, color: Vec<u8>, alpha: Vec<u8>) -> Result<Self, CodecError> {
        let pixels = pixel_count(width, height)?;

        if color.len() != pixels * COLOR_CHANNELS {
            return Err(CodecError::InvalidFrame(format!(
                "color plane has {} bytes, expected {} for {}x{}",
                color.len(),
                pixels * COLOR_CHANNELS,
                width,
                height
            )));
        }

        if alpha.len() != pixels {
            return Err(CodecError::InvalidFrame(format!(
                "alpha plane has {} bytes, expected {} for {}x{}",
                alpha.len(),
                pixels,
                width,
                height
            )));
        }

        Ok(Frame {
            width,
            height,
            color,
            alpha,
        })
    }

    /// Split an interleaved BGRA buffer into RGB and alpha planes
    pub fn from_bgra(width: u32, height: u32, bgra: &[u8]) -> Result<Self, CodecError> {
        let pixels = pixel_count(width, height)?;
        if bgra.len() != pixels * 4 {
            return Err(CodecError::InvalidFrame(format!(
                "bgra buffer has {} bytes, expected {}",
                bgra.len(),
                pixels * 4
            )));
        }

        let mut color = Vec::with_capacity(pixels * COLOR_CHANNELS);
        let mut alpha = Vec::with_capacity(pixels);
        for px in bgra.chunks_exact(4) {
            color.extend_from_slice(&[px[2], px[1], px[0]]);
            alpha.push(px[3]);
        }

        Frame::new(width, height, color, alpha)
    }

    /// Uniformly filled frame
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], alpha: u8) -> Result<Self, CodecError> {
        let pixels = pixel_count(width, height)?;
        Frame::new(width, height, rgb.repeat(pixels), vec![alpha; pixels])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Interleaved RGB bytes, row-major
    pub fn color(&self) -> &[u8] {
        &self.color
    }

    /// Alpha bytes, row-major
    pub fn alpha(&self) -> &[u8] {
        &self.alpha
    }

    /// Number of pixels in the frame
    pub fn pixel_count(&self) -> usize {
        self.alpha.len()
    }
}

/// `width * height`, rejecting empty and overflowing shapes
pub(crate) fn pixel_count(width: u32, height: u32) -> Result<usize, CodecError> {
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidFrame(format!(
            "empty frame: {}x{}",
            width, height
        )));
    }

    (width as usize)
        .checked_mul(height as usize)
        .and_then(|p| p.checked_mul(COLOR_CHANNELS).map(|_| p))
        .ok_or_else(|| CodecError::InvalidFrame(format!("frame too large: {}x{}", width, height)))
}
