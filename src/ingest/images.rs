//! Local frame directory replay.
//!
//! Replays a directory of still frames as if it were a live camera, looping at the
//! end. Supported files:
//! - PNG and JPEG, decoded with the `image` crate
//! - raw `.rgb`, `.rgba` and `.nv12` dumps at the configured frame size
//!
//! A frame that fails to decode is reported as a read failure for that tick only.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::normalize::{normalize_to_rgba, PixelFormat};
use crate::frame::{FrameSurface, PixelBuffer, VideoSource};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub struct ImageDirSource {
    name: String,
    files: Vec<PathBuf>,
    raw_width: u32,
    raw_height: u32,
    next_index: usize,
    /// Next frame, decoded ahead so its native size is known before drawing.
    pending: Option<std::result::Result<PixelBuffer, String>>,
    last_dims: (u32, u32),
    frames_drawn: u64,
    released: bool,
}

impl ImageDirSource {
    /// Open `dir`. `raw_width` x `raw_height` applies to raw dumps only.
    pub fn open(dir: &Path, raw_width: u32, raw_height: u32) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to open frame directory {}", dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_frame_file(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no frames found in {}", dir.display()));
        }
        files.sort();
        log::info!(
            "ImageDirSource: {} frames in {}",
            files.len(),
            dir.display()
        );
        Ok(Self {
            name: dir.display().to_string(),
            files,
            raw_width,
            raw_height,
            next_index: 0,
            pending: None,
            last_dims: (0, 0),
            frames_drawn: 0,
            released: false,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.files.len()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    fn prefetch(&mut self) {
        let path = &self.files[self.next_index];
        self.next_index = (self.next_index + 1) % self.files.len();
        let decoded = decode_frame(path, self.raw_width, self.raw_height)
            .map_err(|e| format!("{}: {:#}", path.display(), e));
        if let Ok(frame) = &decoded {
            self.last_dims = (frame.width(), frame.height());
        }
        self.pending = Some(decoded);
    }

    fn pending_failed(&self) -> bool {
        matches!(self.pending, Some(Err(_)))
    }
}

impl VideoSource for ImageDirSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> (u32, u32) {
        if self.released {
            return (0, 0);
        }
        match &self.pending {
            Some(Ok(frame)) => (frame.width(), frame.height()),
            _ => self.last_dims,
        }
    }

    fn is_ready(&mut self) -> bool {
        if self.released {
            return false;
        }
        // Skip leading files that fail to decode; readiness needs a known frame size.
        if self.pending.is_none() || self.pending_failed() {
            self.prefetch();
        }
        self.dimensions() != (0, 0)
    }

    fn draw_frame(&mut self, surface: &mut FrameSurface) -> Result<()> {
        if self.released {
            return Err(anyhow!("{} was released", self.name));
        }
        if self.pending.is_none() {
            self.prefetch();
        }
        let current = self.pending.take();
        self.prefetch();
        match current {
            Some(Ok(frame)) => {
                surface.draw_rgba(frame.as_rgba())?;
                self.frames_drawn += 1;
                Ok(())
            }
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no frame pending")),
        }
    }

    fn release(&mut self) {
        self.released = true;
        self.pending = None;
    }
}

fn is_frame_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    PixelFormat::from_extension(ext).is_some()
        || IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known))
}

fn decode_frame(path: &Path, raw_width: u32, raw_height: u32) -> Result<PixelBuffer> {
    let bytes = std::fs::read(path).context("read frame")?;
    let raw_format = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(PixelFormat::from_extension);
    match raw_format {
        Some(format) => {
            let rgba = normalize_to_rgba(&bytes, raw_width, raw_height, format)?;
            PixelBuffer::from_rgba(raw_width, raw_height, rgba)
        }
        None => {
            let image = image::load_from_memory(&bytes).context("decode image")?;
            let rgba = image.into_rgba8();
            let (width, height) = (rgba.width(), rgba.height());
            PixelBuffer::from_rgba(width, height, rgba.into_raw())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameSampler, SampleOutcome};
    use tempfile::tempdir;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32, rgb: [u8; 3]) {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn replays_frames_in_name_order_and_loops() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "b.png", 4, 2, [0, 0, 200]);
        write_png(dir.path(), "a.png", 4, 2, [200, 0, 0]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageDirSource::open(dir.path(), 0, 0).unwrap();
        assert_eq!(source.frame_count(), 2);
        assert!(source.is_ready());
        assert_eq!(source.dimensions(), (4, 2));

        let mut sampler = FrameSampler::new();
        let mut reds = Vec::new();
        for _ in 0..3 {
            match sampler.sample(&mut source) {
                SampleOutcome::Frame(frame) => reds.push(frame.rgb_at(0, 0).unwrap()[0]),
                other => panic!("expected frame, got {:?}", other),
            }
        }
        assert_eq!(reds, vec![200, 0, 200]);
    }

    #[test]
    fn raw_dumps_use_configured_size() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("frame.rgb"), [225u8, 125, 45].repeat(6)).unwrap();
        let mut source = ImageDirSource::open(dir.path(), 3, 2).unwrap();
        assert!(source.is_ready());
        assert_eq!(source.dimensions(), (3, 2));
        let mut sampler = FrameSampler::new();
        match sampler.sample(&mut source) {
            SampleOutcome::Frame(frame) => assert_eq!(frame.rgb_at(2, 1), Some([225, 125, 45])),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn corrupt_frame_is_a_transient_failure() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "a.png", 4, 4, [10, 10, 10]);
        std::fs::write(dir.path().join("b.png"), b"not a png").unwrap();

        let mut source = ImageDirSource::open(dir.path(), 0, 0).unwrap();
        assert!(source.is_ready());
        let mut sampler = FrameSampler::new();
        assert!(matches!(sampler.sample(&mut source), SampleOutcome::Frame(_)));
        assert!(matches!(
            sampler.sample(&mut source),
            SampleOutcome::ReadFailed(_)
        ));
        assert!(matches!(sampler.sample(&mut source), SampleOutcome::Frame(_)));
    }

    #[test]
    fn odd_sized_nv12_dump_is_a_transient_failure() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rgb"), [10u8, 10, 10].repeat(6)).unwrap();
        std::fs::write(dir.path().join("b.nv12"), [128u8; 9]).unwrap();

        let mut source = ImageDirSource::open(dir.path(), 3, 2).unwrap();
        assert!(source.is_ready());
        let mut sampler = FrameSampler::new();
        assert!(matches!(sampler.sample(&mut source), SampleOutcome::Frame(_)));
        match sampler.sample(&mut source) {
            SampleOutcome::ReadFailed(message) => assert!(message.contains("must be even")),
            other => panic!("expected read failure, got {:?}", other),
        }
        assert!(matches!(sampler.sample(&mut source), SampleOutcome::Frame(_)));
    }

    #[test]
    fn empty_or_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(ImageDirSource::open(dir.path(), 0, 0).is_err());
        assert!(ImageDirSource::open(&dir.path().join("missing"), 0, 0).is_err());
    }
}
