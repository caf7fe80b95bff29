//! Synthetic camera backend for tests and demos.
//!
//! Produces deterministic pixel patterns with occasional "scene changes"
//! so motion-style model backends have something to react to. The backend
//! can also simulate a refused permission prompt and a warm-up period
//! during which the stream reports no frame.

use crate::camera::{CameraBackend, CaptureDevice, FrameStream};
use crate::{Error, Frame, Result};

/// How often the synthetic scene mutates, in frames.
const SCENE_CHANGE_PERIOD: u64 = 50;

/// Configuration for a synthetic camera.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Devices reported by enumeration.
    pub devices: Vec<CaptureDevice>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Number of initial polls that report "no frame yet".
    pub warmup_polls: u32,
    /// When set, enumeration fails as if the permission prompt was refused.
    pub deny_permission: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            devices: vec![CaptureDevice {
                id: "stub://front".to_string(),
                label: "Front".to_string(),
            }],
            width: 640,
            height: 480,
            warmup_polls: 0,
            deny_permission: false,
        }
    }
}

/// Synthetic camera backend.
pub struct SyntheticCamera {
    config: SyntheticConfig,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    /// One 640x480 device, no warm-up, permission granted.
    pub fn with_defaults() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl CameraBackend for SyntheticCamera {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn enumerate(&mut self) -> Result<Vec<CaptureDevice>> {
        if self.config.deny_permission {
            return Err(Error::PermissionDenied);
        }
        Ok(self.config.devices.clone())
    }

    fn open(&mut self, device_id: &str) -> Result<Box<dyn FrameStream>> {
        if self.config.deny_permission {
            return Err(Error::PermissionDenied);
        }
        if !self.config.devices.iter().any(|d| d.id == device_id) {
            return Err(Error::DeviceUnavailable(device_id.to_string()));
        }
        log::info!("SyntheticCamera: opened {}", device_id);
        Ok(Box::new(SyntheticStream {
            width: self.config.width,
            height: self.config.height,
            warmup_remaining: self.config.warmup_polls,
            frame_count: 0,
            scene_state: 0,
            stopped: false,
        }))
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    warmup_remaining: u32,
    frame_count: u64,
    /// Simulated scene state; a change makes consecutive frames differ.
    scene_state: u8,
    stopped: bool,
}

impl SyntheticStream {
    fn generate_pixels(&mut self) -> Vec<u8> {
        let byte_count = (self.width * self.height * 3) as usize;

        if self.frame_count % SCENE_CHANGE_PERIOD == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        // Position, frame counter, and scene state mixed into a cheap
        // deterministic pattern.
        let mut pixels = vec![0u8; byte_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameStream for SyntheticStream {
    fn poll_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        if self.stopped {
            anyhow::bail!("synthetic stream stopped");
        }
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Ok(Some(Frame::new(pixels, self.width, self.height)))
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
