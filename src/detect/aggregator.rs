use serde::Serialize;

use super::classifier::DetectionSample;

/// A ratio strictly above this counts as a detection.
pub const RATIO_THRESHOLD: f64 = 0.065;

/// Consecutive above-threshold samples required before confirming.
pub const CONFIRM_FRAMES: u32 = 2;

/// Debounced detection state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DetectionState {
    pub consecutive_above_threshold: u32,
    pub confirmed: bool,
}

/// Turns per-frame ratios into a confirmed signal.
///
/// Confirmation needs `confirm_frames` consecutive samples above the threshold. A
/// single sample at or below the threshold clears it immediately.
#[derive(Clone, Debug)]
pub struct DetectionAggregator {
    threshold: f64,
    confirm_frames: u32,
    state: DetectionState,
    latest: Option<DetectionSample>,
}

impl DetectionAggregator {
    pub fn new(threshold: f64, confirm_frames: u32) -> Self {
        Self {
            threshold,
            confirm_frames: confirm_frames.max(1),
            state: DetectionState::default(),
            latest: None,
        }
    }

    pub fn observe(&mut self, sample: DetectionSample) -> DetectionState {
        self.latest = Some(sample);
        if sample.ratio > self.threshold {
            self.state.consecutive_above_threshold =
                self.state.consecutive_above_threshold.saturating_add(1);
            if self.state.consecutive_above_threshold >= self.confirm_frames {
                self.state.confirmed = true;
            }
        } else {
            self.state.consecutive_above_threshold = 0;
            self.state.confirmed = false;
        }
        log::debug!(
            "detection ratio={:.4} matched={} consecutive={} confirmed={}",
            sample.ratio,
            sample.matched_pixel_count,
            self.state.consecutive_above_threshold,
            self.state.confirmed
        );
        self.state
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn is_confirmed(&self) -> bool {
        self.state.confirmed
    }

    /// Latest ratio, whether or not it is confirmed. `0.0` before the first sample.
    pub fn latest_ratio(&self) -> f64 {
        self.latest.map(|s| s.ratio).unwrap_or(0.0)
    }

    pub fn latest_sample(&self) -> Option<DetectionSample> {
        self.latest
    }

    pub fn reset(&mut self) {
        self.state = DetectionState::default();
        self.latest = None;
    }
}

impl Default for DetectionAggregator {
    fn default() -> Self {
        Self::new(RATIO_THRESHOLD, CONFIRM_FRAMES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ratio: f64) -> DetectionSample {
        DetectionSample {
            matched_pixel_count: 0,
            sampled_pixel_count: 1,
            ratio,
        }
    }

    fn confirmations(ratios: &[f64]) -> Vec<bool> {
        let mut agg = DetectionAggregator::default();
        ratios
            .iter()
            .map(|r| agg.observe(sample(*r)).confirmed)
            .collect()
    }

    #[test]
    fn confirms_after_two_and_clears_on_one_dip() {
        assert_eq!(confirmations(&[0.07, 0.07, 0.02]), vec![false, true, false]);
    }

    #[test]
    fn dip_resets_the_counter() {
        assert_eq!(
            confirmations(&[0.07, 0.02, 0.07, 0.07]),
            vec![false, false, false, true]
        );
    }

    #[test]
    fn stays_confirmed_while_detections_continue() {
        assert_eq!(
            confirmations(&[0.2, 0.2, 0.2, 0.2, 0.2]),
            vec![false, true, true, true, true]
        );
    }

    #[test]
    fn threshold_is_strict() {
        assert_eq!(confirmations(&[0.065, 0.065, 0.065]), vec![false; 3]);
        let mut agg = DetectionAggregator::default();
        agg.observe(sample(0.065));
        assert_eq!(agg.state().consecutive_above_threshold, 0);
    }

    #[test]
    fn exposes_latest_ratio_without_confirmation() {
        let mut agg = DetectionAggregator::default();
        assert_eq!(agg.latest_ratio(), 0.0);
        agg.observe(sample(0.3));
        assert!(!agg.is_confirmed());
        assert_eq!(agg.latest_ratio(), 0.3);
    }

    #[test]
    fn reset_starts_from_scratch() {
        let mut agg = DetectionAggregator::default();
        agg.observe(sample(0.3));
        agg.observe(sample(0.3));
        assert!(agg.is_confirmed());
        agg.reset();
        assert_eq!(agg.state(), DetectionState::default());
        assert!(agg.latest_sample().is_none());
    }
}
