//! Pot Gate
//!
//! This crate gates an overlay asset behind a color-based visual trigger.
//!
//! # Architecture
//!
//! Each frame tick runs the same pipeline, synchronously and to completion:
//!
//! 1. **Sample**: `FrameSampler` draws the current video frame into a backing surface.
//! 2. **Classify**: `RegionClassifier` counts pot-colored pixels in the centered region.
//! 3. **Debounce**: `DetectionAggregator` turns per-frame ratios into a confirmed signal.
//! 4. **Gate**: `OverlayController` switches between live video and the overlay asset.
//!
//! `GateSession` owns one camera session and wires these together. Camera acquisition
//! and asset rendering are external collaborators behind the `CameraProvider` and
//! `OverlayRenderer` traits.
//!
//! # Module Structure
//!
//! - `frame`: Pixel buffers, the video source boundary, frame sampling
//! - `detect`: Color profile, region of interest, classifier, aggregator
//! - `overlay`: Visibility state machine and asset event subscription
//! - `render`: Renderer boundary, console renderer, viewer runtime guard
//! - `ingest`: Concrete video sources (synthetic, image directory)
//! - `session`: Camera session lifecycle, frame scheduling, status

use std::fmt;

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod render;
pub mod session;

pub use config::GateConfig;
pub use detect::{
    ColorProfile, ColorRule, DetectionAggregator, DetectionSample, DetectionState,
    RegionClassifier, RegionOfInterest,
};
pub use frame::{FrameSampler, FrameSurface, PixelBuffer, SampleOutcome, VideoSource};
pub use ingest::{ImageDirSource, SourceProvider, SyntheticSource};
pub use overlay::{AssetEvent, AssetEventSender, OverlayController, OverlayState, Transition};
pub use render::{ensure_viewer_runtime, AssetSource, ConsoleRenderer, OverlayRenderer};
pub use session::{
    CameraConstraints, CameraProvider, Capabilities, FrameScheduler, GateSession, GateStatus,
    TickOutcome, TickReport,
};

// -------------------- Errors --------------------

/// Failure taxonomy of the gating pipeline.
///
/// Only `CapabilityMissing` and `AcquisitionFailure` are always fatal. A
/// `TransientReadFailure` skips one tick. An `AssetLoadFailure` is fatal only when
/// the overlay asset is configured as required.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateError {
    CapabilityMissing(String),
    AcquisitionFailure(String),
    TransientReadFailure(String),
    AssetLoadFailure(String),
}

impl GateError {
    pub fn code(&self) -> &'static str {
        match self {
            GateError::CapabilityMissing(_) => "CAPABILITY_MISSING",
            GateError::AcquisitionFailure(_) => "ACQUISITION_FAILURE",
            GateError::TransientReadFailure(_) => "TRANSIENT_READ_FAILURE",
            GateError::AssetLoadFailure(_) => "ASSET_LOAD_FAILURE",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GateError::CapabilityMissing(msg)
            | GateError::AcquisitionFailure(msg)
            | GateError::TransientReadFailure(msg)
            | GateError::AssetLoadFailure(msg) => msg,
        }
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for GateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_error_display_includes_code() {
        let err = GateError::AcquisitionFailure("camera busy".to_string());
        assert_eq!(err.to_string(), "ACQUISITION_FAILURE: camera busy");
        assert_eq!(err.message(), "camera busy");
    }

    #[test]
    fn gate_error_converts_into_anyhow() {
        let err: anyhow::Error = GateError::CapabilityMissing("no camera".into()).into();
        let back = err.downcast_ref::<GateError>().expect("downcast");
        assert_eq!(back.code(), "CAPABILITY_MISSING");
    }
}
