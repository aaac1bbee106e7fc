//! Video sources for the gate.
//!
//! This module provides the camera side of the pipeline:
//! - Synthetic scene (`stub://<name>`) with a pot that periodically enters the frame
//! - Local frame directory replay (PNG/JPEG or raw `.rgb`/`.rgba`/`.nv12` dumps)
//!
//! `SourceProvider` picks one from the configured source URL. Network schemes are
//! not supported: they report that media capture is unavailable.
//!
//! Sources MUST NOT:
//! - Store frames to disk
//! - Log frame content

mod images;
mod normalize;
mod synthetic;

pub use images::ImageDirSource;
pub use normalize::{normalize_to_rgba, PixelFormat};
pub use synthetic::{SyntheticSource, DEFAULT_POT_PERIOD, DEFAULT_WARMUP_POLLS};

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::config::SourceSettings;
use crate::frame::VideoSource;
use crate::session::{CameraConstraints, CameraProvider};

/// Camera provider backed by the configured source URL.
pub struct SourceProvider {
    settings: SourceSettings,
    acquired: u32,
}

impl SourceProvider {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            settings,
            acquired: 0,
        }
    }

    /// Number of successful acquisitions.
    pub fn acquired(&self) -> u32 {
        self.acquired
    }
}

impl CameraProvider for SourceProvider {
    fn media_capture_supported(&self) -> bool {
        is_local_source(&self.settings.url)
    }

    fn acquire(&mut self, constraints: &CameraConstraints) -> Result<Box<dyn VideoSource>> {
        let url = self.settings.url.trim();
        let source: Box<dyn VideoSource> = if url.starts_with("stub://") {
            log::info!(
                "SourceProvider: synthetic camera {} ({}x{})",
                url,
                constraints.ideal_width,
                constraints.ideal_height
            );
            Box::new(SyntheticSource::new(
                url,
                constraints.ideal_width,
                constraints.ideal_height,
            ))
        } else if !is_local_source(url) {
            return Err(anyhow!("unsupported source scheme: {}", url));
        } else {
            let path = Path::new(url);
            if !path.is_dir() {
                return Err(anyhow!("no such frame directory: {}", url));
            }
            Box::new(ImageDirSource::open(
                path,
                self.settings.width,
                self.settings.height,
            )?)
        };
        self.acquired += 1;
        Ok(source)
    }
}

fn is_local_source(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }
    if url.starts_with("stub://") {
        return true;
    }
    !url.contains("://")
}
