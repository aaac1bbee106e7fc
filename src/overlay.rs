//! Overlay visibility state machine.
//!
//! `OverlayController` is the only owner of `OverlayState`. Transitions are driven by:
//! - camera readiness and fatal session errors (from `GateSession`)
//! - the debounced `confirmed` signal (from `DetectionAggregator`)
//! - asset load reports from the renderer, delivered over a subscription channel
//!
//! Asset reports may arrive from any thread. They queue in the channel and are only
//! applied when the tick path calls `pump_asset_events`. A report never moves the
//! state away from `OverlayVisible`: a fatal failure of a required asset seen there
//! is held until detection clears.

use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::render::{AssetSource, OverlayRenderer};
use crate::GateError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayState {
    #[default]
    Loading,
    LiveFeed,
    OverlayVisible,
    Error,
}

impl OverlayState {
    /// States in which frames are sampled.
    pub fn is_sampling(self) -> bool {
        matches!(self, OverlayState::LiveFeed | OverlayState::OverlayVisible)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: OverlayState,
    pub to: OverlayState,
}

/// Asset load outcome reported by the renderer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetEvent {
    Loaded,
    Failed(String),
}

/// Renderer-side handle of the asset event subscription.
///
/// Sends after the controller unsubscribed are dropped.
#[derive(Clone, Debug)]
pub struct AssetEventSender {
    tx: Sender<AssetEvent>,
}

impl AssetEventSender {
    /// Returns false when nobody is subscribed anymore.
    pub fn send(&self, event: AssetEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn loaded(&self) -> bool {
        self.send(AssetEvent::Loaded)
    }

    pub fn failed(&self, message: impl Into<String>) -> bool {
        self.send(AssetEvent::Failed(message.into()))
    }
}

pub struct OverlayController {
    state: OverlayState,
    renderer: Box<dyn OverlayRenderer>,
    asset: AssetSource,
    asset_required: bool,
    asset_loaded: bool,
    asset_error: Option<String>,
    error: Option<String>,
    /// Required-asset failure reported while the overlay was visible.
    deferred_failure: Option<String>,
    events: Option<Receiver<AssetEvent>>,
}

impl OverlayController {
    pub fn new(renderer: Box<dyn OverlayRenderer>, asset: AssetSource, asset_required: bool) -> Self {
        Self {
            state: OverlayState::Loading,
            renderer,
            asset,
            asset_required,
            asset_loaded: false,
            asset_error: None,
            error: None,
            deferred_failure: None,
            events: None,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state == OverlayState::Error
    }

    pub fn asset(&self) -> &AssetSource {
        &self.asset
    }

    pub fn asset_loaded(&self) -> bool {
        self.asset_loaded
    }

    pub fn asset_error(&self) -> Option<&str> {
        self.asset_error.as_deref()
    }

    /// Message of the fatal condition that ended the session.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn renderer(&self) -> &dyn OverlayRenderer {
        self.renderer.as_ref()
    }

    pub fn renderer_mut(&mut self) -> &mut dyn OverlayRenderer {
        self.renderer.as_mut()
    }

    /// Open the asset event subscription and hand the sender to the renderer.
    pub fn subscribe_assets(&mut self) -> AssetEventSender {
        let (tx, rx) = mpsc::channel();
        let sender = AssetEventSender { tx };
        self.events = Some(rx);
        self.renderer.attach(sender.clone());
        sender
    }

    pub fn unsubscribe_assets(&mut self) {
        if self.events.take().is_some() {
            log::debug!("overlay: asset event subscription closed");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.events.is_some()
    }

    /// Source metadata loaded and playback started.
    pub fn camera_ready(&mut self) -> Option<Transition> {
        match self.state {
            OverlayState::Loading => Some(self.enter(OverlayState::LiveFeed)),
            _ => None,
        }
    }

    /// Apply the debounced detection signal. Same-polarity repeats are no-ops.
    ///
    /// Clearing from `OverlayVisible` with a held required-asset failure returns to
    /// `LiveFeed` and then fails; the returned transition is the final one.
    pub fn apply_detection(&mut self, confirmed: bool) -> Option<Transition> {
        match (self.state, confirmed) {
            (OverlayState::LiveFeed, true) => Some(self.enter(OverlayState::OverlayVisible)),
            (OverlayState::OverlayVisible, false) => {
                let cleared = self.enter(OverlayState::LiveFeed);
                match self.deferred_failure.take() {
                    Some(message) => self.fail(&GateError::AssetLoadFailure(message)),
                    None => Some(cleared),
                }
            }
            _ => None,
        }
    }

    /// True while a required-asset failure waits for the overlay to clear.
    pub fn has_deferred_failure(&self) -> bool {
        self.deferred_failure.is_some()
    }

    /// Enter the terminal error state. Ignored once already there.
    pub fn fail(&mut self, err: &GateError) -> Option<Transition> {
        if self.is_terminal() {
            return None;
        }
        log::error!("overlay: fatal {}", err);
        self.error = Some(err.message().to_string());
        Some(self.enter(OverlayState::Error))
    }

    /// Record an asset load failure. Fatal only when the asset is required, and then
    /// only from `Loading` or `LiveFeed`; in `OverlayVisible` it is held until the
    /// overlay clears.
    pub fn asset_failed(&mut self, message: &str) -> Option<Transition> {
        log::warn!("overlay: asset {} failed to load: {}", self.asset.uri, message);
        self.asset_loaded = false;
        self.asset_error = Some(message.to_string());
        if !self.asset_required {
            return None;
        }
        match self.state {
            OverlayState::Loading | OverlayState::LiveFeed => {
                self.fail(&GateError::AssetLoadFailure(message.to_string()))
            }
            OverlayState::OverlayVisible => {
                self.deferred_failure = Some(message.to_string());
                None
            }
            OverlayState::Error => None,
        }
    }

    /// Apply queued asset reports. Returns the transition to `Error` if one happened.
    pub fn pump_asset_events(&mut self) -> Option<Transition> {
        let mut transition = None;
        loop {
            let next = match &self.events {
                Some(rx) => rx.try_recv(),
                None => break,
            };
            match next {
                Ok(AssetEvent::Loaded) => {
                    if !self.asset_loaded {
                        log::info!("overlay: asset {} loaded", self.asset.uri);
                    }
                    self.asset_loaded = true;
                    self.asset_error = None;
                    self.deferred_failure = None;
                }
                Ok(AssetEvent::Failed(message)) => {
                    transition = self.asset_failed(&message).or(transition);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        transition
    }

    fn enter(&mut self, to: OverlayState) -> Transition {
        let from = self.state;
        self.state = to;
        match to {
            OverlayState::LiveFeed => self.renderer.show_video(),
            OverlayState::OverlayVisible => self.renderer.show_asset(&self.asset),
            OverlayState::Error => {
                let message = self.error.as_deref().unwrap_or("unknown error");
                self.renderer.show_error(message);
            }
            OverlayState::Loading => {}
        }
        log::info!("overlay: {:?} -> {:?}", from, to);
        Transition { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::RecordingRenderer;

    fn controller(required: bool) -> (OverlayController, RecordingRenderer) {
        let renderer = RecordingRenderer::default();
        let probe = renderer.clone();
        let ctl = OverlayController::new(
            Box::new(renderer),
            AssetSource::new("https://example.test/pot.glb"),
            required,
        );
        (ctl, probe)
    }

    #[test]
    fn starts_loading_and_enters_live_feed_on_ready() {
        let (mut ctl, probe) = controller(false);
        assert_eq!(ctl.state(), OverlayState::Loading);
        assert_eq!(ctl.apply_detection(true), None);

        let t = ctl.camera_ready().unwrap();
        assert_eq!(t.to, OverlayState::LiveFeed);
        assert_eq!(ctl.camera_ready(), None);
        assert_eq!(probe.calls(), vec!["video"]);
    }

    #[test]
    fn confirmed_edges_toggle_overlay_once() {
        let (mut ctl, probe) = controller(false);
        ctl.camera_ready();

        let t = ctl.apply_detection(true).unwrap();
        assert_eq!(
            t,
            Transition {
                from: OverlayState::LiveFeed,
                to: OverlayState::OverlayVisible
            }
        );
        assert_eq!(ctl.apply_detection(true), None);
        assert_eq!(ctl.apply_detection(true), None);

        let t = ctl.apply_detection(false).unwrap();
        assert_eq!(t.to, OverlayState::LiveFeed);
        assert_eq!(ctl.apply_detection(false), None);

        assert_eq!(
            probe.calls(),
            vec!["video", "asset:https://example.test/pot.glb", "video"]
        );
    }

    #[test]
    fn error_is_terminal() {
        let (mut ctl, probe) = controller(false);
        ctl.camera_ready();
        let t = ctl
            .fail(&GateError::AcquisitionFailure("device busy".into()))
            .unwrap();
        assert_eq!(t.to, OverlayState::Error);
        assert_eq!(ctl.error_message(), Some("device busy"));

        assert_eq!(ctl.apply_detection(true), None);
        assert_eq!(ctl.camera_ready(), None);
        assert_eq!(ctl.fail(&GateError::CapabilityMissing("later".into())), None);
        assert_eq!(ctl.error_message(), Some("device busy"));
        assert_eq!(probe.calls().last().unwrap(), "error:device busy");
    }

    #[test]
    fn asset_events_only_update_flags_when_optional() {
        let (mut ctl, _probe) = controller(false);
        let sender = ctl.subscribe_assets();
        ctl.camera_ready();
        ctl.apply_detection(true);

        assert!(sender.failed("404"));
        assert_eq!(ctl.pump_asset_events(), None);
        assert_eq!(ctl.state(), OverlayState::OverlayVisible);
        assert_eq!(ctl.asset_error(), Some("404"));

        assert!(sender.loaded());
        ctl.pump_asset_events();
        assert!(ctl.asset_loaded());
        assert_eq!(ctl.asset_error(), None);
        assert_eq!(ctl.state(), OverlayState::OverlayVisible);
    }

    #[test]
    fn required_asset_failure_waits_for_overlay_to_clear() {
        let (mut ctl, probe) = controller(true);
        let sender = ctl.subscribe_assets();
        ctl.camera_ready();
        ctl.apply_detection(true);

        sender.failed("corrupt glb");
        assert_eq!(ctl.pump_asset_events(), None);
        assert_eq!(ctl.state(), OverlayState::OverlayVisible);
        assert!(ctl.has_deferred_failure());
        assert_eq!(ctl.apply_detection(true), None);
        assert_eq!(ctl.state(), OverlayState::OverlayVisible);

        let t = ctl.apply_detection(false).unwrap();
        assert_eq!(t.from, OverlayState::LiveFeed);
        assert_eq!(t.to, OverlayState::Error);
        assert_eq!(ctl.error_message(), Some("corrupt glb"));
        assert!(!ctl.has_deferred_failure());
        assert_eq!(
            probe.calls(),
            vec![
                "video",
                "asset:https://example.test/pot.glb",
                "video",
                "error:corrupt glb"
            ]
        );
    }

    #[test]
    fn required_asset_failure_is_fatal_from_live_feed() {
        let (mut ctl, _probe) = controller(true);
        let sender = ctl.subscribe_assets();
        ctl.camera_ready();

        sender.failed("script blocked");
        let t = ctl.pump_asset_events().unwrap();
        assert_eq!(t.from, OverlayState::LiveFeed);
        assert_eq!(t.to, OverlayState::Error);
    }

    #[test]
    fn late_load_cancels_held_failure() {
        let (mut ctl, _probe) = controller(true);
        let sender = ctl.subscribe_assets();
        ctl.camera_ready();
        ctl.apply_detection(true);

        sender.failed("timeout");
        sender.loaded();
        ctl.pump_asset_events();
        assert!(!ctl.has_deferred_failure());
        assert_eq!(ctl.apply_detection(false).unwrap().to, OverlayState::LiveFeed);
    }

    #[test]
    fn unsubscribe_drops_late_reports() {
        let (mut ctl, _probe) = controller(false);
        let sender = ctl.subscribe_assets();
        ctl.unsubscribe_assets();
        assert!(!ctl.is_subscribed());
        assert!(!sender.loaded());
        assert_eq!(ctl.pump_asset_events(), None);
        assert!(!ctl.asset_loaded());
    }
}
