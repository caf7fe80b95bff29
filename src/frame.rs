//! Raw frame container shared between camera sources and model backends.
//!
//! A `Frame` is one captured RGB24 image. Frames flow from a `FrameSource`
//! into a single inference call and are dropped once their results have
//! been translated into overlay primitives; nothing in the crate retains a
//! frame across detection cycles.

/// A single captured image, tightly packed RGB24 (3 bytes per pixel).
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, no padding between rows.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// True when the byte length matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.pixel_count() * 3
    }
}
