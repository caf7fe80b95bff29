//! framewatch - a webcam-driven detection loop.
//!
//! Four cooperating roles, leaves first:
//! - **Model provider** ([`model`]): loads an inference backend once,
//!   serializes `infer` calls, disposes deterministically.
//! - **Overlay renderer** ([`overlay`]): owns the annotation primitives on
//!   a surface sized to the video frame; replaced wholesale each cycle.
//! - **Detection loop** ([`runner`]): the cooperative state machine
//!   driving capture -> infer -> draw cycles with clean start/stop.
//! - **Camera source** ([`camera`]): device enumeration and frame streams,
//!   with at most one stream open per source and idempotent release.
//!
//! Everything runs on the caller's thread; stop requests arrive through a
//! cloneable [`runner::LoopHandle`] and are honored cooperatively at cycle
//! boundaries.

pub mod camera;
pub mod config;
mod error;
pub mod frame;
pub mod model;
pub mod overlay;
pub mod runner;

pub use camera::{CameraBackend, CameraSource, CaptureDevice, FrameSource, FrameStream};
pub use error::{Error, Result};
pub use frame::Frame;
pub use model::{
    BoundingBox, CoordinateSpace, Detection, ModelBackend, ModelHandle, ModelLoader, ModelProvider,
};
pub use overlay::{OverlayPrimitive, OverlayRenderer, SurfaceRect};
pub use runner::{CycleOutcome, DetectionLoop, LoopConfig, LoopHandle, LoopState, LoopStats};
