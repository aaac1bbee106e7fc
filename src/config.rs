use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::detect::{CONFIRM_FRAMES, RATIO_THRESHOLD};

const DEFAULT_SOURCE_URL: &str = "stub://pot";
const DEFAULT_SOURCE_FPS: u32 = 30;
const DEFAULT_SOURCE_WIDTH: u32 = 1280;
const DEFAULT_SOURCE_HEIGHT: u32 = 720;
const DEFAULT_ASSET_URI: &str = "https://modelviewer.dev/shared-assets/models/Astronaut.glb";
const DEFAULT_STATUS_LOG_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
struct GateConfigFile {
    source: Option<SourceConfigFile>,
    detection: Option<DetectionConfigFile>,
    asset: Option<AssetConfigFile>,
    status_log_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    ratio_threshold: Option<f64>,
    confirm_frames: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AssetConfigFile {
    uri: Option<String>,
    required: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub source: SourceSettings,
    pub detection: DetectionSettings,
    pub asset: AssetSettings,
    pub status_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// `stub://<name>` for the synthetic scene, or a local directory of frames.
    pub url: String,
    pub target_fps: u32,
    /// Frame size of the synthetic scene and of raw `.rgb`/`.rgba`/`.nv12` dumps.
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub ratio_threshold: f64,
    pub confirm_frames: u32,
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub uri: String,
    /// When true, an asset load failure ends the session.
    pub required: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::from_file(GateConfigFile::default())
    }
}

impl GateConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("POT_GATE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: GateConfigFile) -> Self {
        let source = file.source.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let asset = file.asset.unwrap_or_default();
        Self {
            source: SourceSettings {
                url: source
                    .url
                    .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            },
            detection: DetectionSettings {
                ratio_threshold: detection.ratio_threshold.unwrap_or(RATIO_THRESHOLD),
                confirm_frames: detection.confirm_frames.unwrap_or(CONFIRM_FRAMES),
            },
            asset: AssetSettings {
                uri: asset.uri.unwrap_or_else(|| DEFAULT_ASSET_URI.to_string()),
                required: asset.required.unwrap_or(false),
            },
            status_interval: Duration::from_secs(
                file.status_log_secs.unwrap_or(DEFAULT_STATUS_LOG_SECS),
            ),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("POT_GATE_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(fps) = std::env::var("POT_GATE_FPS") {
            self.source.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("POT_GATE_FPS must be an integer frame rate"))?;
        }
        if let Ok(uri) = std::env::var("POT_GATE_ASSET_URI") {
            if !uri.trim().is_empty() {
                self.asset.uri = uri;
            }
        }
        if let Ok(required) = std::env::var("POT_GATE_ASSET_REQUIRED") {
            self.asset.required = parse_bool(&required)
                .ok_or_else(|| anyhow!("POT_GATE_ASSET_REQUIRED must be true or false"))?;
        }
        if let Ok(threshold) = std::env::var("POT_GATE_RATIO_THRESHOLD") {
            self.detection.ratio_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("POT_GATE_RATIO_THRESHOLD must be a number"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("target_fps must be >= 1"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        let threshold = self.detection.ratio_threshold;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(anyhow!("ratio_threshold must be in (0, 1], got {}", threshold));
        }
        if self.detection.confirm_frames == 0 {
            return Err(anyhow!("confirm_frames must be >= 1"));
        }
        if self.asset.uri.trim().is_empty() {
            return Err(anyhow!("asset uri must not be empty"));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.source.target_fps.max(1) as f64)
    }
}

fn read_config_file(path: &Path) -> Result<GateConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: GateConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
