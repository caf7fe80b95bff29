//! Daemon configuration: JSON file, environment overrides, validation.
//!
//! The config file path comes from `FRAMEWATCH_CONFIG`; individual
//! settings can then be overridden through `FRAMEWATCH_*` variables.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::model::registry::OBJECT_PROFILE;
use crate::runner::LoopConfig;

const DEFAULT_DEVICE: &str = "stub://front";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_WARMUP_POLLS: u32 = 0;
const DEFAULT_INFER_DEADLINE_MS: u64 = 2_000;
const DEFAULT_CYCLE_INTERVAL_MS: u64 = 33;

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    camera: Option<CameraFile>,
    detect: Option<DetectFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    warmup_polls: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectFile {
    profile: Option<String>,
    confidence_threshold: Option<f32>,
    infer_deadline_ms: Option<u64>,
    cycle_interval_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct FramewatchConfig {
    pub camera: CameraSettings,
    pub detect: DetectSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Capture device id (`stub://...` selects the synthetic backend).
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub warmup_polls: u32,
}

#[derive(Debug, Clone)]
pub struct DetectSettings {
    /// Detection profile name (see `ProfileRegistry`).
    pub profile: String,
    /// Overrides the profile's policy threshold when set.
    pub confidence_threshold: Option<f32>,
    pub infer_deadline: Duration,
    pub cycle_interval: Duration,
}

impl DetectSettings {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            infer_deadline: self.infer_deadline,
            cycle_interval: self.cycle_interval,
        }
    }
}

impl FramewatchConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FRAMEWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Self {
        let camera = CameraSettings {
            device: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device.clone())
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_HEIGHT),
            warmup_polls: file
                .camera
                .and_then(|camera| camera.warmup_polls)
                .unwrap_or(DEFAULT_WARMUP_POLLS),
        };
        let detect = DetectSettings {
            profile: file
                .detect
                .as_ref()
                .and_then(|detect| detect.profile.clone())
                .unwrap_or_else(|| OBJECT_PROFILE.to_string()),
            confidence_threshold: file
                .detect
                .as_ref()
                .and_then(|detect| detect.confidence_threshold),
            infer_deadline: Duration::from_millis(
                file.detect
                    .as_ref()
                    .and_then(|detect| detect.infer_deadline_ms)
                    .unwrap_or(DEFAULT_INFER_DEADLINE_MS),
            ),
            cycle_interval: Duration::from_millis(
                file.detect
                    .and_then(|detect| detect.cycle_interval_ms)
                    .unwrap_or(DEFAULT_CYCLE_INTERVAL_MS),
            ),
        };
        Self { camera, detect }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("FRAMEWATCH_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(profile) = std::env::var("FRAMEWATCH_PROFILE") {
            if !profile.trim().is_empty() {
                self.detect.profile = profile;
            }
        }
        if let Ok(threshold) = std::env::var("FRAMEWATCH_THRESHOLD") {
            let value: f32 = threshold
                .parse()
                .map_err(|_| anyhow!("FRAMEWATCH_THRESHOLD must be a number in (0, 1]"))?;
            self.detect.confidence_threshold = Some(value);
        }
        if let Ok(deadline) = std::env::var("FRAMEWATCH_INFER_DEADLINE_MS") {
            let millis: u64 = deadline.parse().map_err(|_| {
                anyhow!("FRAMEWATCH_INFER_DEADLINE_MS must be an integer number of milliseconds")
            })?;
            self.detect.infer_deadline = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be nonzero"));
        }
        if let Some(threshold) = self.detect.confidence_threshold {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(anyhow!("confidence threshold must be in (0, 1]"));
            }
        }
        if self.detect.profile.trim().is_empty() {
            return Err(anyhow!("detection profile must not be empty"));
        }
        if self.detect.infer_deadline.is_zero() {
            return Err(anyhow!("inference deadline must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
