//! Camera acquisition layer.
//!
//! This module provides capture-device enumeration and live frame streams:
//! - Synthetic devices (`stub://` ids) for tests and demos
//! - V4L2 devices (feature: camera-v4l2)
//!
//! The camera layer is responsible for:
//! - Enumerating video-input devices (may prompt for permission)
//! - Opening a stream bound to one selected device
//! - Holding at most one open stream per `CameraSource` instance
//! - Releasing hardware handles deterministically (release is idempotent)
//!
//! The camera layer MUST NOT:
//! - Hold more than one device open per source (device switch releases
//!   the previous stream before acquiring the new one)
//! - Retain frames beyond handoff to the detection loop

mod synthetic;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

pub use synthetic::{SyntheticCamera, SyntheticConfig};
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;

use std::sync::{Arc, Mutex};

use crate::{Error, Frame, Result};

/// Identifies a physical (or synthetic) camera.
///
/// The set returned by enumeration is immutable; re-enumeration replaces
/// it wholesale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureDevice {
    /// Opaque platform identifier (device path, stub id, ...).
    pub id: String,
    /// Human-readable name, as reported by the platform.
    pub label: String,
}

/// A live stream of frames bound to one capture device.
///
/// Implementations are owned by a `FrameSource` and accessed through it;
/// `stop` is called at most once.
pub trait FrameStream: Send {
    /// Next frame if one is available.
    ///
    /// `Ok(None)` means the stream is live but has not produced a frame
    /// yet (warm-up); the detection loop skips the cycle without invoking
    /// the model.
    fn poll_frame(&mut self) -> anyhow::Result<Option<Frame>>;

    /// Stop the underlying capture and give back the hardware handle.
    fn stop(&mut self);
}

/// Camera backend trait.
///
/// A backend knows how to list its devices and open a stream on one of
/// them. It does not track which streams are open; `CameraSource` enforces
/// the at-most-one-open invariant.
pub trait CameraBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// List all video-input devices, in platform order.
    ///
    /// Fails with `PermissionDenied` when camera access is refused.
    fn enumerate(&mut self) -> Result<Vec<CaptureDevice>>;

    /// Open a stream bound to `device_id`.
    ///
    /// Fails with `DeviceUnavailable` when the device is gone or busy.
    fn open(&mut self, device_id: &str) -> Result<Box<dyn FrameStream>>;
}

/// Shared handle to an open stream. Clones refer to the same stream, so a
/// release through any handle is observed by all of them.
#[derive(Clone)]
pub struct FrameSource {
    inner: Arc<Mutex<SourceInner>>,
}

struct SourceInner {
    device_id: String,
    stream: Option<Box<dyn FrameStream>>,
}

impl FrameSource {
    fn new(device_id: &str, stream: Box<dyn FrameStream>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SourceInner {
                device_id: device_id.to_string(),
                stream: Some(stream),
            })),
        }
    }

    pub fn device_id(&self) -> String {
        match self.inner.lock() {
            Ok(inner) => inner.device_id.clone(),
            Err(_) => String::new(),
        }
    }

    /// True until the source has been released.
    pub fn is_live(&self) -> bool {
        match self.inner.lock() {
            Ok(inner) => inner.stream.is_some(),
            Err(_) => false,
        }
    }

    /// Read the current frame, or `Ok(None)` while the stream has not
    /// produced one yet.
    pub fn poll_frame(&self) -> Result<Option<Frame>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| Error::DeviceUnavailable("frame source lock poisoned".to_string()))?;
        let device_id = inner.device_id.clone();
        match inner.stream.as_mut() {
            Some(stream) => stream
                .poll_frame()
                .map_err(|e| Error::DeviceUnavailable(format!("{}: {}", device_id, e))),
            None => Err(Error::DeviceUnavailable(format!(
                "{}: source released",
                device_id
            ))),
        }
    }

    /// Stop every underlying track and give back the device.
    ///
    /// Idempotent: the second and later calls are no-ops, never an error.
    pub fn release(&self) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if let Some(mut stream) = inner.stream.take() {
            stream.stop();
            log::debug!("released frame source {}", inner.device_id);
        }
    }
}

/// Owns device enumeration state and the single open stream handle.
pub struct CameraSource {
    backend: Box<dyn CameraBackend>,
    devices: Vec<CaptureDevice>,
    current: Option<FrameSource>,
}

impl CameraSource {
    pub fn new(backend: Box<dyn CameraBackend>) -> Self {
        Self {
            backend,
            devices: Vec::new(),
            current: None,
        }
    }

    /// Enumerate video-input devices.
    ///
    /// Replaces the previously known set. On `PermissionDenied` the known
    /// set becomes empty.
    pub fn enumerate(&mut self) -> Result<&[CaptureDevice]> {
        match self.backend.enumerate() {
            Ok(devices) => {
                log::info!(
                    "camera backend '{}' enumerated {} device(s)",
                    self.backend.name(),
                    devices.len()
                );
                self.devices = devices;
                Ok(&self.devices)
            }
            Err(e) => {
                self.devices.clear();
                Err(e)
            }
        }
    }

    /// Devices found by the most recent enumeration.
    pub fn devices(&self) -> &[CaptureDevice] {
        &self.devices
    }

    /// Open a stream bound to `device_id`.
    ///
    /// Acquiring implicitly releases any previously acquired source for
    /// this `CameraSource`, so a device switch cannot leak the hardware
    /// handle.
    pub fn acquire(&mut self, device_id: &str) -> Result<FrameSource> {
        if let Some(prev) = self.current.take() {
            prev.release();
        }
        let stream = self.backend.open(device_id)?;
        let source = FrameSource::new(device_id, stream);
        self.current = Some(source.clone());
        log::info!("acquired capture device {}", device_id);
        Ok(source)
    }

    /// Open the first enumerated device (default facing mode).
    pub fn acquire_default(&mut self) -> Result<FrameSource> {
        if self.devices.is_empty() {
            self.enumerate()?;
        }
        let device_id = self
            .devices
            .first()
            .map(|d| d.id.clone())
            .ok_or_else(|| Error::DeviceUnavailable("no capture devices found".to_string()))?;
        self.acquire(&device_id)
    }

    /// Release the currently held source, if any. Idempotent.
    pub fn release(&mut self) {
        if let Some(current) = self.current.take() {
            current.release();
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}
