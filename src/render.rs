//! Renderer boundary.
//!
//! The overlay asset is drawn by an external renderer (a 3D model viewer, a video
//! element). The core only asks it to show the live video, show the asset, or show
//! an error banner, and listens for its asset load reports.

use anyhow::Result;
use std::path::Path;
use std::sync::OnceLock;

use crate::overlay::AssetEventSender;
use crate::GateError;

/// URI of the overlay asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetSource {
    pub uri: String,
}

impl AssetSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn is_remote(&self) -> bool {
        self.uri.starts_with("http://") || self.uri.starts_with("https://")
    }
}

/// External renderer driven by `OverlayController`.
pub trait OverlayRenderer {
    fn name(&self) -> &str;

    /// False when no rendering context can be created on this host.
    fn rendering_context_available(&self) -> bool {
        true
    }

    /// Load the viewer runtime. Called at most once per process, see `ensure_viewer_runtime`.
    fn load_runtime(&mut self) -> Result<()> {
        Ok(())
    }

    /// Receive the handle used to report asset load outcomes.
    fn attach(&mut self, events: AssetEventSender);

    /// Show raw video, hide the asset.
    fn show_video(&mut self);

    /// Hide raw video, mount and show the asset.
    fn show_asset(&mut self, asset: &AssetSource);

    /// Show the persistent error banner.
    fn show_error(&mut self, message: &str);
}

// ----------------------------------------------------------------------------
// Viewer runtime guard
// ----------------------------------------------------------------------------

/// Runs a loader at most once and remembers its outcome.
pub struct LoadOnce {
    cell: OnceLock<Result<(), String>>,
}

impl LoadOnce {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Run `load` on first call; later calls return the remembered outcome.
    pub fn ensure(&self, load: impl FnOnce() -> Result<()>) -> Result<(), GateError> {
        self.cell
            .get_or_init(|| load().map_err(|e| format!("{:#}", e)))
            .clone()
            .map_err(GateError::AssetLoadFailure)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(())))
    }
}

impl Default for LoadOnce {
    fn default() -> Self {
        Self::new()
    }
}

static VIEWER_RUNTIME: LoadOnce = LoadOnce::new();

/// Process-wide guard for the viewer runtime. Safe to call repeatedly.
pub fn ensure_viewer_runtime(load: impl FnOnce() -> Result<()>) -> Result<(), GateError> {
    VIEWER_RUNTIME.ensure(load)
}

pub fn viewer_runtime() -> &'static LoadOnce {
    &VIEWER_RUNTIME
}

// ----------------------------------------------------------------------------
// ConsoleRenderer
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visible {
    Nothing,
    Video,
    Asset,
    Error,
}

/// Headless renderer that logs what would be on screen.
///
/// Remote assets are assumed to load; local assets load when the file exists.
pub struct ConsoleRenderer {
    visible: Visible,
    events: Option<AssetEventSender>,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self {
            visible: Visible::Nothing,
            events: None,
        }
    }

    pub fn visible(&self) -> Visible {
        self.visible
    }
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayRenderer for ConsoleRenderer {
    fn name(&self) -> &str {
        "console"
    }

    fn load_runtime(&mut self) -> Result<()> {
        log::info!("ConsoleRenderer: viewer runtime ready");
        Ok(())
    }

    fn attach(&mut self, events: AssetEventSender) {
        self.events = Some(events);
    }

    fn show_video(&mut self) {
        self.visible = Visible::Video;
        log::info!("ConsoleRenderer: showing live video");
    }

    fn show_asset(&mut self, asset: &AssetSource) {
        self.visible = Visible::Asset;
        log::info!("ConsoleRenderer: showing overlay asset {}", asset.uri);
        let Some(events) = &self.events else {
            return;
        };
        if asset.is_remote() || Path::new(&asset.uri).is_file() {
            events.loaded();
        } else {
            events.failed(format!("asset not found: {}", asset.uri));
        }
    }

    fn show_error(&mut self, message: &str) {
        self.visible = Visible::Error;
        log::error!("ConsoleRenderer: Error: {}", message);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Renderer that records every call for assertions.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingRenderer {
        calls: Rc<RefCell<Vec<String>>>,
        events: Rc<RefCell<Option<AssetEventSender>>>,
        pub(crate) no_context: Rc<Cell<bool>>,
        pub(crate) auto_load: Rc<Cell<bool>>,
    }

    impl RecordingRenderer {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        pub(crate) fn sender(&self) -> Option<AssetEventSender> {
            self.events.borrow().clone()
        }
    }

    impl OverlayRenderer for RecordingRenderer {
        fn name(&self) -> &str {
            "recording"
        }

        fn rendering_context_available(&self) -> bool {
            !self.no_context.get()
        }

        fn attach(&mut self, events: AssetEventSender) {
            *self.events.borrow_mut() = Some(events);
        }

        fn show_video(&mut self) {
            self.calls.borrow_mut().push("video".to_string());
        }

        fn show_asset(&mut self, asset: &AssetSource) {
            self.calls.borrow_mut().push(format!("asset:{}", asset.uri));
            if self.auto_load.get() {
                if let Some(events) = self.events.borrow().as_ref() {
                    events.loaded();
                }
            }
        }

        fn show_error(&mut self, message: &str) {
            self.calls.borrow_mut().push(format!("error:{}", message));
        }
    }

    #[test]
    fn load_once_runs_loader_a_single_time() {
        let guard = LoadOnce::new();
        let runs = Cell::new(0);
        for _ in 0..3 {
            guard
                .ensure(|| {
                    runs.set(runs.get() + 1);
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(runs.get(), 1);
        assert!(guard.is_loaded());
    }

    #[test]
    fn process_wide_runtime_is_shared() {
        ensure_viewer_runtime(|| Ok(())).unwrap();
        ensure_viewer_runtime(|| Err(anyhow!("must not run again"))).unwrap();
        assert!(viewer_runtime().is_loaded());
    }

    #[test]
    fn load_once_remembers_failure() {
        let guard = LoadOnce::new();
        let err = guard.ensure(|| Err(anyhow!("script blocked"))).unwrap_err();
        assert_eq!(err, GateError::AssetLoadFailure("script blocked".into()));
        let again = guard.ensure(|| Ok(())).unwrap_err();
        assert_eq!(again.code(), "ASSET_LOAD_FAILURE");
        assert!(!guard.is_loaded());
    }

    #[test]
    fn console_renderer_reports_missing_local_asset() {
        let mut controller = crate::overlay::OverlayController::new(
            Box::new(ConsoleRenderer::new()),
            AssetSource::new("/definitely/missing/pot.glb"),
            false,
        );
        controller.subscribe_assets();
        controller.camera_ready();
        controller.apply_detection(true);
        controller.pump_asset_events();
        assert!(!controller.asset_loaded());
        assert_eq!(
            controller.asset_error(),
            Some("asset not found: /definitely/missing/pot.glb")
        );
    }

    #[test]
    fn console_renderer_accepts_remote_asset() {
        let mut controller = crate::overlay::OverlayController::new(
            Box::new(ConsoleRenderer::new()),
            AssetSource::new("https://modelviewer.dev/shared-assets/models/Astronaut.glb"),
            true,
        );
        controller.subscribe_assets();
        controller.camera_ready();
        controller.apply_detection(true);
        assert_eq!(controller.pump_asset_events(), None);
        assert!(controller.asset_loaded());
    }
}
