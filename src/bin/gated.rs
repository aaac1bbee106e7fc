//! gated - pot overlay gate daemon
//!
//! This daemon:
//! 1. Checks host capabilities and acquires the configured camera
//! 2. Samples the center of every frame for pot-colored pixels
//! 3. Shows the overlay asset once the pot is seen on consecutive frames
//! 4. Releases the camera on Ctrl-C or on a fatal error

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use pot_gate::{ConsoleRenderer, GateConfig, GateSession, OverlayState, SourceProvider};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = GateConfig::load()?;
    log::info!(
        "gated starting: source={} fps={} asset={} (required={})",
        cfg.source.url,
        cfg.source.target_fps,
        cfg.asset.uri,
        cfg.asset.required
    );
    log::info!(
        "detection: threshold={} confirm_frames={}",
        cfg.detection.ratio_threshold,
        cfg.detection.confirm_frames
    );

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let mut provider = SourceProvider::new(cfg.source.clone());
    let mut session = GateSession::new(&cfg, Box::new(ConsoleRenderer::new()));
    session.start(&mut provider)?;

    let mut last_status_log = Instant::now();
    let status_interval = cfg.status_interval;
    let final_status = session.run(&stop, None, |report, status| {
        if let Some(transition) = report.transition {
            log::info!(
                "{:?} -> {:?}: {}",
                transition.from,
                transition.to,
                status.message()
            );
        }
        if last_status_log.elapsed() >= status_interval {
            log::info!(
                "status: state={:?} {} ticks={}",
                status.state,
                status.detection_line(),
                status.ticks
            );
            last_status_log = Instant::now();
        }
    });

    if final_status.state == OverlayState::Error {
        let message = final_status.error.unwrap_or_else(|| "unknown error".into());
        return Err(anyhow!("gate stopped: {}", message));
    }
    log::info!("shutdown complete after {} ticks", final_status.ticks);
    Ok(())
}
