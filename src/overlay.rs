//! Overlay rendering: retained annotation primitives in surface-pixel
//! space.
//!
//! The renderer exclusively owns the primitive set. `draw` replaces the
//! set wholesale (clear-then-draw), so the surface always shows exactly
//! the latest accepted result batch and never accumulates stale
//! annotations from earlier cycles.

use crate::model::result::{BoundingBox, CoordinateSpace, Detection};

/// Vertical gap between a box and its label, in surface pixels.
const LABEL_MARGIN: f32 = 10.0;

/// Rectangle in surface pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One rendered annotation.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayPrimitive {
    Box { rect: SurfaceRect },
    Label { x: f32, y: f32, text: String },
}

/// Renderer for geometric annotations over a video surface.
///
/// `resize` must be called with the video's native resolution before
/// `draw`, so the surface coordinate space matches the source frame.
pub struct OverlayRenderer {
    width: u32,
    height: u32,
    confidence_threshold: f32,
    space: CoordinateSpace,
    primitives: Vec<OverlayPrimitive>,
}

impl OverlayRenderer {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            width: 0,
            height: 0,
            confidence_threshold,
            space: CoordinateSpace::Pixel,
            primitives: Vec::new(),
        }
    }

    /// Declare the coordinate space of incoming boxes. The detection loop
    /// sets this from the model backend before its first cycle.
    pub fn set_coordinate_space(&mut self, space: CoordinateSpace) {
        self.space = space;
    }

    pub fn coordinate_space(&self) -> CoordinateSpace {
        self.space
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn set_confidence_threshold(&mut self, threshold: f32) {
        self.confidence_threshold = threshold;
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Match the surface to the video's native resolution.
    ///
    /// A size change invalidates primitives mapped under the old size, so
    /// the set is cleared; the next `draw` repopulates it.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        log::debug!("overlay surface resized to {}x{}", width, height);
        self.width = width;
        self.height = height;
        self.primitives.clear();
    }

    /// Remove all current primitives.
    pub fn clear(&mut self) {
        self.primitives.clear();
    }

    /// The full primitive set currently on the surface.
    pub fn primitives(&self) -> &[OverlayPrimitive] {
        &self.primitives
    }

    /// Replace the primitive set with annotations for `results`.
    ///
    /// Internally clears first; callers never interleave clear/draw
    /// themselves. Results at or below the confidence threshold are
    /// dropped; each accepted result contributes one box and one label of
    /// the form `"<class> - <pct>%"`. Returns the number of accepted
    /// results.
    pub fn draw(&mut self, results: &[Detection]) -> usize {
        self.primitives.clear();
        if self.width == 0 || self.height == 0 {
            log::warn!("overlay draw before resize; surface has no dimensions");
        }
        let mut accepted = 0;
        for det in results {
            if det.score <= self.confidence_threshold {
                continue;
            }
            let rect = self.map_box(&det.bbox);
            let text = format!("{} - {}%", det.label, (det.score * 100.0).round() as u32);
            self.primitives.push(OverlayPrimitive::Box { rect });
            self.primitives.push(OverlayPrimitive::Label {
                x: rect.x,
                y: (rect.y - LABEL_MARGIN).max(0.0),
                text,
            });
            accepted += 1;
        }
        accepted
    }

    /// Map a box from the declared coordinate space into surface pixels.
    fn map_box(&self, bbox: &BoundingBox) -> SurfaceRect {
        match self.space {
            CoordinateSpace::Pixel => SurfaceRect {
                x: bbox.x,
                y: bbox.y,
                width: bbox.width,
                height: bbox.height,
            },
            CoordinateSpace::Normalized => SurfaceRect {
                x: bbox.x * self.width as f32,
                y: bbox.y * self.height as f32,
                width: bbox.width * self.width as f32,
                height: bbox.height * self.height as f32,
            },
        }
    }
}
