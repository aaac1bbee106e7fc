//! Frame sampling layer.
//!
//! - `PixelBuffer`: RGBA pixels of one video frame. Ephemeral, rewritten every tick.
//! - `FrameSurface`: Backing surface the current frame is drawn into. Owns the buffer.
//! - `VideoSource`: Boundary to the live video supplied by the camera lifecycle.
//! - `FrameSampler`: Draws the current frame and lends the buffer out for one pass.
//!
//! The classifier only ever receives `&PixelBuffer` borrowed from the sampler, so a
//! frame cannot outlive the tick that produced it.

use anyhow::{anyhow, Result};

/// RGBA, one byte per channel.
pub const BYTES_PER_PIXEL: usize = 4;

// ----------------------------------------------------------------------------
// PixelBuffer: RGBA frame pixels
// ----------------------------------------------------------------------------

/// RGBA pixel data for a single frame.
///
/// Width and height are nonzero and `data.len() == width * height * 4` always holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    /// Wrap existing RGBA bytes. Fails on zero dimensions or a length mismatch.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = rgba_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGBA frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// A frame where every pixel has the same RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let len = rgba_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..(len / BYTES_PER_PIXEL) {
            data.extend_from_slice(&rgba);
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    /// RGB channels at `(x, y)`, or `None` outside the frame.
    pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Overwrite one pixel. Out-of-frame writes are ignored.
    pub fn put_rgba(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.offset(x, y);
        self.data[i..i + BYTES_PER_PIXEL].copy_from_slice(&rgba);
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }
}

fn rgba_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(anyhow!(
            "frame dimensions must be nonzero (got {}x{})",
            width,
            height
        ));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| anyhow!("frame dimensions overflow ({}x{})", width, height))
}

// ----------------------------------------------------------------------------
// FrameSurface: backing surface for frame draws
// ----------------------------------------------------------------------------

/// Backing surface sized to the video's native resolution.
///
/// A read only succeeds when the source drew into the surface during the current
/// frame; a stale surface from an earlier tick is never handed out.
#[derive(Debug, Default)]
pub struct FrameSurface {
    buffer: Option<PixelBuffer>,
    drawn: bool,
}

impl FrameSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current `(width, height)`, `(0, 0)` before the first resize.
    pub fn dimensions(&self) -> (u32, u32) {
        match &self.buffer {
            Some(buf) => (buf.width, buf.height),
            None => (0, 0),
        }
    }

    /// Resize to `width x height`. Returns true when the size actually changed.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool> {
        if self.dimensions() == (width, height) {
            return Ok(false);
        }
        self.buffer = Some(PixelBuffer::filled(width, height, [0, 0, 0, 255])?);
        self.drawn = false;
        Ok(true)
    }

    /// Copy a complete RGBA frame into the surface.
    pub fn draw_rgba(&mut self, rgba: &[u8]) -> Result<()> {
        let buf = self
            .buffer
            .as_mut()
            .ok_or_else(|| anyhow!("surface has no size yet"))?;
        if rgba.len() != buf.data.len() {
            return Err(anyhow!(
                "frame does not match surface: {} bytes for {}x{}",
                rgba.len(),
                buf.width,
                buf.height
            ));
        }
        buf.data.copy_from_slice(rgba);
        self.drawn = true;
        Ok(())
    }

    /// Mutable access for sources that render in place. Marks the frame as drawn.
    pub fn pixels_mut(&mut self) -> Result<&mut PixelBuffer> {
        let buf = self
            .buffer
            .as_mut()
            .ok_or_else(|| anyhow!("surface has no size yet"))?;
        self.drawn = true;
        Ok(buf)
    }

    /// Read back the frame drawn this tick.
    pub fn read(&self) -> Result<&PixelBuffer> {
        match (&self.buffer, self.drawn) {
            (Some(buf), true) => Ok(buf),
            (Some(_), false) => Err(anyhow!("no frame drawn into surface this tick")),
            (None, _) => Err(anyhow!("surface has no size yet")),
        }
    }

    fn begin_frame(&mut self) {
        self.drawn = false;
    }
}

// ----------------------------------------------------------------------------
// VideoSource: live video boundary
// ----------------------------------------------------------------------------

/// Live video supplied by the camera lifecycle.
///
/// The core never acquires a device itself. It only needs the native dimensions,
/// a readiness signal (metadata loaded and playback started), and the ability to
/// draw the current frame.
pub trait VideoSource {
    /// Source identifier for logs.
    fn name(&self) -> &str;

    /// Native `(width, height)`. Either component is zero until metadata is known.
    fn dimensions(&self) -> (u32, u32);

    /// True once metadata is loaded and playback has started.
    fn is_ready(&mut self) -> bool;

    /// Draw the current frame into `surface`, already sized to `dimensions()`.
    fn draw_frame(&mut self, surface: &mut FrameSurface) -> Result<()>;

    /// Stop the underlying tracks. Called exactly once per session.
    fn release(&mut self) {}
}

// ----------------------------------------------------------------------------
// FrameSampler
// ----------------------------------------------------------------------------

/// Result of one sampling attempt.
#[derive(Debug)]
pub enum SampleOutcome<'a> {
    /// A full-resolution frame, valid for this tick only.
    Frame(&'a PixelBuffer),
    /// The source reports zero width or height.
    NotReady,
    /// Drawing or reading the frame failed. Logged, never fatal.
    ReadFailed(String),
}

/// Pulls the current frame of a `VideoSource` into its backing surface.
#[derive(Debug, Default)]
pub struct FrameSampler {
    surface: FrameSurface,
    frames_sampled: u64,
    read_failures: u64,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample<'a>(&'a mut self, source: &mut dyn VideoSource) -> SampleOutcome<'a> {
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return SampleOutcome::NotReady;
        }

        match self.surface.resize(width, height) {
            Ok(true) => log::debug!(
                "FrameSampler: surface resized to {}x{} for {}",
                width,
                height,
                source.name()
            ),
            Ok(false) => {}
            Err(e) => return read_failed(&mut self.read_failures, source.name(), e),
        }

        self.surface.begin_frame();
        if let Err(e) = source.draw_frame(&mut self.surface) {
            return read_failed(&mut self.read_failures, source.name(), e);
        }
        match self.surface.read() {
            Ok(buf) => {
                self.frames_sampled += 1;
                SampleOutcome::Frame(buf)
            }
            Err(e) => read_failed(&mut self.read_failures, source.name(), e),
        }
    }

    pub fn frames_sampled(&self) -> u64 {
        self.frames_sampled
    }

    pub fn read_failures(&self) -> u64 {
        self.read_failures
    }

    pub fn surface(&self) -> &FrameSurface {
        &self.surface
    }
}

fn read_failed<'a>(failures: &mut u64, source: &str, err: anyhow::Error) -> SampleOutcome<'a> {
    *failures += 1;
    log::warn!("FrameSampler: skipping tick, frame read from {} failed: {}", source, err);
    SampleOutcome::ReadFailed(err.to_string())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
