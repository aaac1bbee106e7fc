//! gate_replay - run the gate over a synthetic scene or a frame directory
//!
//! Prints one line per tick (or one `GateStatus` JSON object with `--json`) and a
//! summary of every overlay transition at the end.

use anyhow::Result;
use clap::Parser;
use std::sync::atomic::AtomicBool;

use pot_gate::{ConsoleRenderer, GateConfig, GateSession, SourceProvider, TickOutcome};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Source URL: `stub://<name>` or a local directory of frames.
    #[arg(long, env = "POT_GATE_SOURCE_URL")]
    source: Option<String>,
    /// Number of ticks to run.
    #[arg(long, default_value_t = 300)]
    frames: u64,
    /// Tick rate (frames per second).
    #[arg(long)]
    fps: Option<u32>,
    /// Frame width for the synthetic scene and raw dumps.
    #[arg(long)]
    width: Option<u32>,
    /// Frame height for the synthetic scene and raw dumps.
    #[arg(long)]
    height: Option<u32>,
    /// Overlay asset URI.
    #[arg(long)]
    asset: Option<String>,
    /// Treat an asset load failure as fatal.
    #[arg(long)]
    require_asset: bool,
    /// Emit one JSON status object per tick.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut cfg = GateConfig::load()?;
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    if let Some(fps) = args.fps {
        cfg.source.target_fps = fps;
    }
    if let Some(width) = args.width {
        cfg.source.width = width;
    }
    if let Some(height) = args.height {
        cfg.source.height = height;
    }
    if let Some(asset) = args.asset {
        cfg.asset.uri = asset;
    }
    if args.require_asset {
        cfg.asset.required = true;
    }
    cfg.validate()?;

    let mut provider = SourceProvider::new(cfg.source.clone());
    let mut session = GateSession::new(&cfg, Box::new(ConsoleRenderer::new()));
    session.start(&mut provider)?;

    let stop = AtomicBool::new(false);
    let mut transitions = Vec::new();
    let mut print_error = None;
    let final_status = session.run(&stop, Some(args.frames), |report, status| {
        if let Some(transition) = report.transition {
            transitions.push((status.ticks, transition));
        }
        if print_error.is_some() {
            return;
        }
        if args.json {
            match serde_json::to_string(status) {
                Ok(line) => println!("{}", line),
                Err(e) => print_error = Some(e),
            }
            return;
        }
        let detail = match &report.outcome {
            TickOutcome::Sampled { state, .. } if state.confirmed => " (confirmed)",
            TickOutcome::Waiting => " (waiting for camera)",
            TickOutcome::NotReady => " (no frame size yet)",
            TickOutcome::ReadFailed(_) => " (frame skipped)",
            _ => "",
        };
        println!(
            "tick {:>5} {:<16} {}{}",
            status.ticks,
            format!("{:?}", status.state),
            status.detection_line(),
            detail
        );
    });
    if let Some(e) = print_error {
        return Err(e.into());
    }

    if !args.json {
        println!("{} transitions:", transitions.len());
        for (tick, t) in &transitions {
            println!("  tick {:>5}: {:?} -> {:?}", tick, t.from, t.to);
        }
        println!("final: {}", final_status.message());
    }
    Ok(())
}
