use anyhow::{anyhow, Result};
use rand::Rng;

use crate::frame::{FrameSurface, VideoSource};

/// Polls of `is_ready` answered with false before playback "starts".
pub const DEFAULT_WARMUP_POLLS: u32 = 3;

/// Frames the pot stays out of (then in) view.
pub const DEFAULT_POT_PERIOD: u64 = 90;

/// Mid-tone pot color, inside the orange-pot rule even with noise added.
const POT_RGB: [u8; 3] = [225, 125, 45];
const WALL_LEVEL: u8 = 110;
const NOISE: i16 = 12;

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

/// Synthetic camera for `stub://` URLs.
///
/// Produces a noisy gray scene. Every `pot_period` frames a pot-colored disc enters
/// (or leaves) the middle of the frame, so the overlay toggles without hardware.
pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    warmup_polls: u32,
    polls: u32,
    pot_period: u64,
    frame_count: u64,
    released: bool,
}

impl SyntheticSource {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            warmup_polls: DEFAULT_WARMUP_POLLS,
            polls: 0,
            pot_period: DEFAULT_POT_PERIOD,
            frame_count: 0,
            released: false,
        }
    }

    pub fn with_warmup(mut self, polls: u32) -> Self {
        self.warmup_polls = polls;
        self
    }

    pub fn with_pot_period(mut self, frames: u64) -> Self {
        self.pot_period = frames.max(1);
        self
    }

    /// Whether the frame about to be drawn shows the pot.
    pub fn pot_in_view(&self) -> bool {
        (self.frame_count / self.pot_period) % 2 == 1
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frame_count
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn started(&self) -> bool {
        self.polls > self.warmup_polls
    }
}

impl VideoSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> (u32, u32) {
        if self.started() && !self.released {
            (self.width, self.height)
        } else {
            (0, 0)
        }
    }

    fn is_ready(&mut self) -> bool {
        if !self.started() {
            self.polls += 1;
        }
        self.started()
    }

    fn draw_frame(&mut self, surface: &mut FrameSurface) -> Result<()> {
        if self.released {
            return Err(anyhow!("{} was released", self.name));
        }
        let with_pot = self.pot_in_view();
        let frame = surface.pixels_mut()?;
        let (w, h) = (frame.width(), frame.height());
        let cx = w as f64 / 2.0;
        let cy = h as f64 / 2.0;
        let radius = 0.2 * w.min(h) as f64;
        let r2 = radius * radius;

        let mut rng = rand::thread_rng();
        for y in 0..h {
            for x in 0..w {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                let base = if with_pot && dx * dx + dy * dy <= r2 {
                    POT_RGB
                } else {
                    [WALL_LEVEL; 3]
                };
                let n = rng.gen_range(-NOISE..=NOISE);
                frame.put_rgba(
                    x,
                    y,
                    [jitter(base[0], n), jitter(base[1], n), jitter(base[2], n), 255],
                );
            }
        }

        self.frame_count += 1;
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            log::info!("SyntheticSource: {} stopped after {} frames", self.name, self.frame_count);
        }
    }
}

fn jitter(value: u8, noise: i16) -> u8 {
    (value as i16 + noise).clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{FrameClassifier, RegionClassifier};
    use crate::frame::{FrameSampler, SampleOutcome};

    fn ratio(sampler: &mut FrameSampler, source: &mut SyntheticSource) -> f64 {
        match sampler.sample(source) {
            SampleOutcome::Frame(frame) => RegionClassifier::pot().classify(frame).unwrap().ratio,
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn reports_zero_dimensions_until_warm() {
        let mut source = SyntheticSource::new("stub://pot", 64, 48).with_warmup(2);
        assert_eq!(source.dimensions(), (0, 0));
        assert!(!source.is_ready());
        assert!(!source.is_ready());
        assert!(source.is_ready());
        assert_eq!(source.dimensions(), (64, 48));
    }

    #[test]
    fn pot_enters_and_leaves_view() {
        let mut source = SyntheticSource::new("stub://pot", 96, 64)
            .with_warmup(0)
            .with_pot_period(2);
        assert!(source.is_ready());
        let mut sampler = FrameSampler::new();

        let ratios: Vec<f64> = (0..6).map(|_| ratio(&mut sampler, &mut source)).collect();
        for (i, r) in ratios.iter().enumerate() {
            if (i / 2) % 2 == 1 {
                assert!(*r > 0.065, "frame {} should show the pot, ratio {}", i, r);
            } else {
                assert_eq!(*r, 0.0, "frame {} should be empty", i);
            }
        }
        assert_eq!(source.frames_drawn(), 6);
    }

    #[test]
    fn released_source_stops_producing() {
        let mut source = SyntheticSource::new("stub://pot", 8, 8).with_warmup(0);
        source.is_ready();
        source.release();
        source.release();
        assert!(source.is_released());
        assert_eq!(source.dimensions(), (0, 0));
        let mut surface = FrameSurface::new();
        surface.resize(8, 8).unwrap();
        assert!(source.draw_frame(&mut surface).is_err());
    }
}
