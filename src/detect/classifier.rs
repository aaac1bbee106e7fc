use anyhow::Result;
use serde::Serialize;

use super::profile::ColorProfile;
use super::region::RegionOfInterest;
use crate::frame::PixelBuffer;

/// Rows and columns visited inside the region (every other one in each axis).
pub const SAMPLE_STRIDE: usize = 2;

/// Nominal sample budget divisor: `(width * height) / 16`.
const NOMINAL_BUDGET_DIVISOR: f64 = 16.0;

/// Outcome of classifying one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DetectionSample {
    /// Pixels visited by the stride loop that matched the profile.
    pub matched_pixel_count: u64,
    /// Nominal sample budget, `(width * height) / 16`, truncated for display.
    pub sampled_pixel_count: u64,
    /// `matched_pixel_count / ((width * height) / 16)`.
    pub ratio: f64,
}

/// Frame classifier seam.
///
/// Implementations are pure: the same buffer always yields the same sample, and the
/// buffer is never retained past the call.
pub trait FrameClassifier {
    fn name(&self) -> &'static str;

    fn classify(&self, frame: &PixelBuffer) -> Result<DetectionSample>;
}

/// Counts profile-matching pixels inside a region of interest.
#[derive(Clone, Debug, Default)]
pub struct RegionClassifier {
    profile: ColorProfile,
    region: RegionOfInterest,
}

impl RegionClassifier {
    pub fn new(profile: ColorProfile, region: RegionOfInterest) -> Self {
        Self { profile, region }
    }

    /// Pot profile over the centered half box.
    pub fn pot() -> Self {
        Self::default()
    }
}

impl FrameClassifier for RegionClassifier {
    fn name(&self) -> &'static str {
        self.profile.name
    }

    fn classify(&self, frame: &PixelBuffer) -> Result<DetectionSample> {
        let rect = self.region.scale(frame.width(), frame.height())?;
        let width = frame.width() as usize;
        let data = frame.as_rgba();

        let mut matched = 0u64;
        for y in (rect.y..rect.y + rect.height).step_by(SAMPLE_STRIDE) {
            let row = y as usize * width;
            for x in (rect.x..rect.x + rect.width).step_by(SAMPLE_STRIDE) {
                let i = (row + x as usize) * 4;
                if self.profile.matches(data[i], data[i + 1], data[i + 2]) {
                    matched += 1;
                }
            }
        }

        // The denominator is the nominal budget, not the number of visited pixels.
        let pixels = frame.width() as f64 * frame.height() as f64;
        let budget = pixels / NOMINAL_BUDGET_DIVISOR;
        Ok(DetectionSample {
            matched_pixel_count: matched,
            sampled_pixel_count: (frame.width() as u64 * frame.height() as u64) / 16,
            ratio: matched as f64 / budget,
        })
    }
}
