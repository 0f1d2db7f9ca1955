//! Upstream frame sources
//!
//! The matting stage is an opaque producer: every call yields one color plane
//! with its transparency channel, and it keeps temporal state between calls
//! that must be dropped on a scene change.

use crate::frame::Frame;

/// A producer of color + transparency frames
///
/// Sources run on plain threads, never on the async runtime.
pub trait MatteSource: Send {
    /// Produce the next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Option<Frame>;

    /// Drop any temporal state carried between frames
    fn reset(&mut self);
}

/// Synthetic source: a soft-edged disc orbiting over a transparent background
#[derive(Debug, Clone)]
pub struct TestPattern {
    width: u32,
    height: u32,
    tick: u64,
    limit: Option<u64>,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
            limit: None,
        }
    }

    /// Stop after `frames` frames
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Frames produced since the last reset
    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn render(&self) -> Option<Frame> {
        let (w, h) = (self.width as f32, self.height as f32);
        let phase = self.tick as f32 * 0.05;
        let radius = w.min(h) * 0.25;
        let cx = w * 0.5 + phase.cos() * w * 0.2;
        let cy = h * 0.5 + phase.sin() * h * 0.2;
        // 2px feathered edge
        let feather = 2.0;

        let pixels = self.width as usize * self.height as usize;
        let mut color = Vec::with_capacity(pixels * 3);
        let mut alpha = Vec::with_capacity(pixels);

        let hue = (self.tick % 256) as u8;
        for y in 0..self.height {
            for x in 0..self.width {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let dist = (dx * dx + dy * dy).sqrt();
                let coverage = ((radius - dist) / feather + 0.5).clamp(0.0, 1.0);

                color.extend_from_slice(&[hue, 255 - hue, (x * 255 / self.width) as u8]);
                alpha.push((coverage * 255.0).round() as u8);
            }
        }

        Frame::new(self.width, self.height, color, alpha).ok()
    }
}

impl MatteSource for TestPattern {
    fn next_frame(&mut self) -> Option<Frame> {
        if self.limit.is_some_and(|limit| self.tick >= limit) {
            return None;
        }
        let frame = self.render()?;
        self.tick += 1;
        Some(frame)
    }

    fn reset(&mut self) {
        self.tick = 0;
    }
}
