//! Detection results and their coordinate spaces.

/// Coordinate convention for boxes reported by a model backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinateSpace {
    /// Box coordinates in `[0, 1]`, relative to the frame dimensions.
    Normalized,
    /// Box coordinates in model-native pixels.
    Pixel,
}

/// Axis-aligned bounding box in the backend's declared coordinate space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// One detection from a single inference call.
///
/// Immutable; discarded once translated into overlay primitives. The
/// overlay never accumulates detections across calls.
#[derive(Clone, Debug)]
pub struct Detection {
    /// Class label (e.g. "person").
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            score,
            bbox,
        }
    }
}
