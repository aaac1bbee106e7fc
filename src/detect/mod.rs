mod aggregator;
mod classifier;
mod profile;
mod region;

pub use aggregator::{DetectionAggregator, DetectionState, CONFIRM_FRAMES, RATIO_THRESHOLD};
pub use classifier::{DetectionSample, FrameClassifier, RegionClassifier, SAMPLE_STRIDE};
pub use profile::{ChannelBound, ColorProfile, ColorRule};
pub use region::{PixelRect, RegionOfInterest};
