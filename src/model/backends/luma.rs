use anyhow::{ensure, Result};

use crate::model::backend::ModelBackend;
use crate::model::result::{BoundingBox, CoordinateSpace, Detection};
use crate::Frame;

/// Integer BT.601-ish luma, scaled to 0..255.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29) >> 8) as u8
}

/// Pure-CPU bright-region detector.
///
/// Reports the bounding box of pixels whose luma exceeds a threshold, in
/// model-native pixel coordinates. The score is the bright-pixel density
/// inside the box, so a solid blob scores near 1.0 and scattered noise
/// scores low and gets filtered out by the overlay threshold.
pub struct LumaBlobBackend {
    /// Minimum luma for a pixel to count as bright.
    pub luma_threshold: u8,
    /// Minimum number of bright pixels before a detection is reported.
    pub min_pixels: usize,
}

impl LumaBlobBackend {
    pub fn new() -> Self {
        Self {
            luma_threshold: 200,
            min_pixels: 64,
        }
    }
}

impl Default for LumaBlobBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBackend for LumaBlobBackend {
    fn name(&self) -> &'static str {
        "luma-blob"
    }

    fn coordinate_space(&self) -> CoordinateSpace {
        CoordinateSpace::Pixel
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        ensure!(
            frame.is_well_formed(),
            "frame byte length does not match {}x{} RGB24",
            frame.width,
            frame.height
        );

        let width = frame.width as usize;
        let mut bright = 0usize;
        let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
        let (mut max_x, mut max_y) = (0usize, 0usize);

        for (i, px) in frame.data.chunks_exact(3).enumerate() {
            if luma(px[0], px[1], px[2]) >= self.luma_threshold {
                let x = i % width;
                let y = i / width;
                bright += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        if bright < self.min_pixels {
            return Ok(Vec::new());
        }

        let box_w = (max_x - min_x + 1) as f32;
        let box_h = (max_y - min_y + 1) as f32;
        let density = (bright as f32 / (box_w * box_h)).clamp(0.0, 1.0);

        Ok(vec![Detection::new(
            "bright-region",
            density,
            BoundingBox::new(min_x as f32, min_y as f32, box_w, box_h),
        )])
    }
}
