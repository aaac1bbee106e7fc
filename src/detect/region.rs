use anyhow::{anyhow, Result};

/// Rectangle expressed as fractions of the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionOfInterest {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A region of interest scaled to pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionOfInterest {
    /// Centered half-width, half-height box, a quarter in from each edge.
    pub const CENTER_HALF: RegionOfInterest = RegionOfInterest {
        x: 0.25,
        y: 0.25,
        width: 0.5,
        height: 0.5,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        let roi = Self {
            x,
            y,
            width,
            height,
        };
        roi.validate()?;
        Ok(roi)
    }

    pub fn validate(&self) -> Result<()> {
        let fractions = [self.x, self.y, self.width, self.height];
        if fractions
            .iter()
            .any(|f| !f.is_finite() || *f < 0.0 || *f > 1.0)
        {
            return Err(anyhow!("region fractions must lie in [0, 1]: {:?}", self));
        }
        if self.x + self.width > 1.0 || self.y + self.height > 1.0 {
            return Err(anyhow!("region extends past the frame edge: {:?}", self));
        }
        Ok(())
    }

    /// Scale to pixels with floor rounding. The result always lies inside the frame.
    pub fn scale(&self, frame_width: u32, frame_height: u32) -> Result<PixelRect> {
        self.validate()?;
        let rect = PixelRect {
            x: (frame_width as f64 * self.x).floor() as u32,
            y: (frame_height as f64 * self.y).floor() as u32,
            width: (frame_width as f64 * self.width).floor() as u32,
            height: (frame_height as f64 * self.height).floor() as u32,
        };
        if rect.x as u64 + rect.width as u64 > frame_width as u64
            || rect.y as u64 + rect.height as u64 > frame_height as u64
        {
            return Err(anyhow!(
                "scaled region {:?} exceeds {}x{} frame",
                rect,
                frame_width,
                frame_height
            ));
        }
        Ok(rect)
    }
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self::CENTER_HALF
    }
}
