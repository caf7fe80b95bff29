//! V4L2 camera backend (feature: camera-v4l2).
//!
//! Enumerates local `/dev/video*` capture nodes and opens memory-mapped
//! capture streams in RGB24. Stream teardown happens on `stop`, which
//! drops the mmap buffers and closes the device node.

use anyhow::Context;
use ouroboros::self_referencing;

use crate::camera::{CameraBackend, CaptureDevice, FrameStream};
use crate::{Error, Frame, Result};

/// V4L2 camera backend.
pub struct V4l2Camera {
    /// Preferred capture width.
    pub width: u32,
    /// Preferred capture height.
    pub height: u32,
}

impl V4l2Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for V4l2Camera {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl CameraBackend for V4l2Camera {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn enumerate(&mut self) -> Result<Vec<CaptureDevice>> {
        let devices = v4l::context::enum_devices()
            .into_iter()
            .map(|node| {
                let id = node.path().display().to_string();
                let label = node.name().unwrap_or_else(|| id.clone());
                CaptureDevice { id, label }
            })
            .collect();
        Ok(devices)
    }

    fn open(&mut self, device_id: &str) -> Result<Box<dyn FrameStream>> {
        let stream = V4l2Stream::open(device_id, self.width, self.height).map_err(|e| {
            match e.downcast_ref::<std::io::Error>().map(|io| io.kind()) {
                Some(std::io::ErrorKind::PermissionDenied) => Error::PermissionDenied,
                _ => Error::DeviceUnavailable(format!("{}: {}", device_id, e)),
            }
        })?;
        log::info!(
            "V4l2Camera: opened {} ({}x{})",
            device_id,
            stream.width,
            stream.height
        );
        Ok(Box::new(stream))
    }
}

struct V4l2Stream {
    device_id: String,
    width: u32,
    height: u32,
    state: Option<StreamState>,
}

// MmapStream borrows the device it captures from, so both live together
// in a self-referencing cell that is dropped as a unit on stop.
#[self_referencing]
struct StreamState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Stream {
    fn open(device_id: &str, width: u32, height: u32) -> anyhow::Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(device_id)
            .with_context(|| format!("open v4l2 device {}", device_id))?;

        let mut format = device.format().context("read v4l2 format")?;
        format.width = width;
        format.height = height;
        format.fourcc = v4l::FourCC::new(b"RGB3");
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Stream: failed to set format on {}: {}", device_id, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        let state = StreamStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        Ok(Self {
            device_id: device_id.to_string(),
            width: format.width,
            height: format.height,
            state: Some(state),
        })
    }
}

impl FrameStream for V4l2Stream {
    fn poll_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .with_context(|| format!("{}: v4l2 stream stopped", self.device_id))?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .with_context(|| format!("capture frame from {}", self.device_id))?;

        Ok(Some(Frame::new(buf.to_vec(), self.width, self.height)))
    }

    fn stop(&mut self) {
        if self.state.take().is_some() {
            log::debug!("V4l2Stream: stopped {}", self.device_id);
        }
    }
}
