//! Camera session lifecycle.
//!
//! `GateSession` owns everything that lives for one camera session:
//! - the acquired `VideoSource` (released on every exit path)
//! - the `FrameSampler` surface, `DetectionAggregator` state, `OverlayController`
//! - the `FrameScheduler` pending tick
//!
//! Ticks run on the caller's thread, one at a time, each to completion. A new session
//! always starts from `Loading` with a clean detection state.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::GateConfig;
use crate::detect::{
    DetectionAggregator, DetectionSample, DetectionState, FrameClassifier, RegionClassifier,
};
use crate::frame::{FrameSampler, SampleOutcome, VideoSource};
use crate::overlay::{OverlayController, OverlayState, Transition};
use crate::render::{viewer_runtime, AssetSource, LoadOnce, OverlayRenderer};
use crate::GateError;

// ----------------------------------------------------------------------------
// Camera boundary
// ----------------------------------------------------------------------------

/// Requested camera characteristics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConstraints {
    /// `environment` is the rear-facing camera.
    pub facing_mode: String,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing_mode: "environment".to_string(),
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Supplies live video sources. Implemented outside the core.
pub trait CameraProvider {
    /// False when this host has no way to capture media at all.
    fn media_capture_supported(&self) -> bool;

    /// One-shot acquisition of a permitted source.
    fn acquire(&mut self, constraints: &CameraConstraints) -> Result<Box<dyn VideoSource>>;
}

/// Host capabilities the pipeline cannot run without.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub rendering_context: bool,
    pub media_capture: bool,
}

impl Capabilities {
    pub fn check(&self) -> Result<(), GateError> {
        let mut missing = Vec::new();
        if !self.rendering_context {
            missing.push("no rendering context is available, which is required for the overlay");
        }
        if !self.media_capture {
            missing.push("camera access is not supported on this host");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GateError::CapabilityMissing(missing.join("; ")))
        }
    }
}

// ----------------------------------------------------------------------------
// FrameScheduler
// ----------------------------------------------------------------------------

/// Per-frame scheduling with one cancellable pending tick.
#[derive(Debug)]
pub struct FrameScheduler {
    interval: Duration,
    pending: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
        }
    }

    /// Schedule the next tick one interval from now. Replaces any pending tick.
    pub fn schedule(&mut self) {
        self.pending = Some(Instant::now() + self.interval);
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Block until the pending tick is due and consume it. False when none is pending.
    pub fn wait(&mut self) -> bool {
        let Some(deadline) = self.pending.take() else {
            return false;
        };
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        true
    }
}

// ----------------------------------------------------------------------------
// Tick results and status
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// Session ended, torn down, or never started.
    Stopped,
    /// Still loading, the source has not signalled ready.
    Waiting,
    /// The source became ready this tick.
    CameraReady,
    /// The source reports zero dimensions. Detection state untouched.
    NotReady,
    /// The frame could not be read. Detection state untouched.
    ReadFailed(String),
    Sampled {
        sample: DetectionSample,
        state: DetectionState,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub transition: Option<Transition>,
}

/// Read-only observability snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GateStatus {
    pub state: OverlayState,
    pub ratio: f64,
    pub matched_pixels: u64,
    pub confirmed: bool,
    pub camera_active: bool,
    pub asset_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub ticks: u64,
}

impl GateStatus {
    /// Banner text for the current state.
    pub fn message(&self) -> String {
        if let Some(error) = &self.error {
            return format!("Error: {}", error);
        }
        match self.state {
            OverlayState::Loading => "Starting camera...".to_string(),
            OverlayState::LiveFeed => "Point your camera at the pot".to_string(),
            OverlayState::OverlayVisible if !self.asset_loaded => {
                "Loading 3D model...".to_string()
            }
            OverlayState::OverlayVisible => "Pot detected! Showing overlay".to_string(),
            OverlayState::Error => "Error".to_string(),
        }
    }

    pub fn detection_line(&self) -> String {
        format!("Detection: {:.2}%", self.ratio * 100.0)
    }
}

// ----------------------------------------------------------------------------
// GateSession
// ----------------------------------------------------------------------------

pub struct GateSession {
    source: Option<Box<dyn VideoSource>>,
    sampler: FrameSampler,
    classifier: RegionClassifier,
    aggregator: DetectionAggregator,
    controller: OverlayController,
    scheduler: FrameScheduler,
    constraints: CameraConstraints,
    runtime: &'static LoadOnce,
    ticks: u64,
    started: bool,
    torn_down: bool,
}

impl GateSession {
    pub fn new(config: &GateConfig, renderer: Box<dyn OverlayRenderer>) -> Self {
        let controller = OverlayController::new(
            renderer,
            AssetSource::new(config.asset.uri.clone()),
            config.asset.required,
        );
        Self {
            source: None,
            sampler: FrameSampler::new(),
            classifier: RegionClassifier::pot(),
            aggregator: DetectionAggregator::new(
                config.detection.ratio_threshold,
                config.detection.confirm_frames,
            ),
            controller,
            scheduler: FrameScheduler::new(config.frame_interval()),
            constraints: CameraConstraints {
                ideal_width: config.source.width,
                ideal_height: config.source.height,
                ..CameraConstraints::default()
            },
            runtime: viewer_runtime(),
            ticks: 0,
            started: false,
            torn_down: false,
        }
    }

    /// Use a different viewer runtime guard than the process-wide one.
    pub fn with_runtime_guard(mut self, runtime: &'static LoadOnce) -> Self {
        self.runtime = runtime;
        self
    }

    /// Check capabilities, load the viewer runtime, acquire the camera, schedule the
    /// first tick. A fatal failure leaves the session in `Error` and is returned.
    pub fn start(&mut self, provider: &mut dyn CameraProvider) -> Result<(), GateError> {
        if self.started {
            return Ok(());
        }
        self.started = true;

        let caps = Capabilities {
            rendering_context: self.controller.renderer().rendering_context_available(),
            media_capture: provider.media_capture_supported(),
        };
        if let Err(err) = caps.check() {
            return Err(self.abort(err));
        }

        let runtime = self.runtime;
        if let Err(err) = runtime.ensure(|| self.controller.renderer_mut().load_runtime()) {
            self.controller.asset_failed(err.message());
            if self.controller.is_terminal() {
                self.teardown();
                return Err(err);
            }
        }

        self.controller.subscribe_assets();

        match provider.acquire(&self.constraints) {
            Ok(source) => {
                log::info!(
                    "session: acquired {} (facing={}, ideal {}x{})",
                    source.name(),
                    self.constraints.facing_mode,
                    self.constraints.ideal_width,
                    self.constraints.ideal_height
                );
                self.source = Some(source);
            }
            Err(e) => {
                let err = GateError::AcquisitionFailure(format!("failed to access camera: {:#}", e));
                return Err(self.abort(err));
            }
        }

        self.scheduler.schedule();
        Ok(())
    }

    /// Run one tick of the pipeline.
    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let mut transition = self.controller.pump_asset_events();

        if self.controller.is_terminal() {
            self.teardown();
        }
        let Some(source) = self.source.as_mut() else {
            return TickReport {
                outcome: TickOutcome::Stopped,
                transition,
            };
        };

        if self.controller.state() == OverlayState::Loading {
            if !source.is_ready() {
                return TickReport {
                    outcome: TickOutcome::Waiting,
                    transition,
                };
            }
            log::info!("session: {} ready, starting detection", source.name());
            return TickReport {
                outcome: TickOutcome::CameraReady,
                transition: self.controller.camera_ready().or(transition),
            };
        }

        let outcome = match self.sampler.sample(source.as_mut()) {
            SampleOutcome::NotReady => TickOutcome::NotReady,
            SampleOutcome::ReadFailed(message) => TickOutcome::ReadFailed(message),
            SampleOutcome::Frame(frame) => match self.classifier.classify(frame) {
                Ok(sample) => {
                    let state = self.aggregator.observe(sample);
                    transition = self.controller.apply_detection(state.confirmed).or(transition);
                    TickOutcome::Sampled { sample, state }
                }
                Err(e) => {
                    let err = GateError::TransientReadFailure(format!("{:#}", e));
                    log::warn!("session: classification skipped: {}", err);
                    TickOutcome::ReadFailed(err.message().to_string())
                }
            },
        };

        // A held asset failure turns fatal when the overlay clears.
        if self.controller.is_terminal() {
            self.teardown();
        }
        TickReport {
            outcome,
            transition,
        }
    }

    /// Drive ticks until `stop` is raised, `max_ticks` is reached, or the session
    /// fails. Tears the session down before returning.
    pub fn run(
        &mut self,
        stop: &AtomicBool,
        max_ticks: Option<u64>,
        mut observe: impl FnMut(&TickReport, &GateStatus),
    ) -> GateStatus {
        let mut ran = 0u64;
        while !stop.load(Ordering::SeqCst) && max_ticks.is_none_or(|max| ran < max) {
            if !self.scheduler.wait() {
                break;
            }
            let report = self.tick();
            ran += 1;
            observe(&report, &self.status());
            if self.controller.is_terminal() {
                break;
            }
            self.scheduler.schedule();
        }
        self.teardown();
        self.status()
    }

    /// Cancel the pending tick, release the camera, unsubscribe from asset events.
    /// Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.scheduler.cancel();
        if let Some(mut source) = self.source.take() {
            source.release();
            log::info!("session: released {}", source.name());
        }
        self.controller.unsubscribe_assets();
    }

    pub fn status(&self) -> GateStatus {
        let sample = self.aggregator.latest_sample();
        GateStatus {
            state: self.controller.state(),
            ratio: self.aggregator.latest_ratio(),
            matched_pixels: sample.map(|s| s.matched_pixel_count).unwrap_or(0),
            confirmed: self.aggregator.is_confirmed(),
            camera_active: self.source.is_some() && self.controller.state().is_sampling(),
            asset_loaded: self.controller.asset_loaded(),
            asset_error: self.controller.asset_error().map(str::to_string),
            error: self.controller.error_message().map(str::to_string),
            ticks: self.ticks,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.controller.state()
    }

    pub fn detection_state(&self) -> DetectionState {
        self.aggregator.state()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn has_pending_tick(&self) -> bool {
        self.scheduler.is_pending()
    }

    fn abort(&mut self, err: GateError) -> GateError {
        self.controller.fail(&err);
        self.teardown();
        err
    }
}

impl Drop for GateSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
