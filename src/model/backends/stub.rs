use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::model::backend::ModelBackend;
use crate::model::result::{BoundingBox, CoordinateSpace, Detection};
use crate::Frame;

/// Stub backend for testing. Uses pixel hashing to detect motion.
///
/// When consecutive frames differ, it reports one full-frame detection in
/// normalized coordinates; a static scene reports nothing.
pub struct StubBackend {
    last_hash: Option<[u8; 32]>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { last_hash: None }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn coordinate_space(&self) -> CoordinateSpace {
        CoordinateSpace::Normalized
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let current_hash: [u8; 32] = Sha256::digest(&frame.data).into();

        let motion = self.last_hash.is_some_and(|prev| prev != current_hash);
        self.last_hash = Some(current_hash);

        if motion {
            Ok(vec![Detection::new(
                "motion",
                0.85,
                BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            )])
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fill: u8) -> Frame {
        Frame::new(vec![fill; 4 * 4 * 3], 4, 4)
    }

    #[test]
    fn stub_backend_detects_motion() -> Result<()> {
        let mut backend = StubBackend::new();

        // First frame: nothing to compare against.
        let r1 = backend.infer(&frame(1))?;
        assert!(r1.is_empty());

        // Changed content: one full-frame detection.
        let r2 = backend.infer(&frame(2))?;
        assert_eq!(r2.len(), 1);
        assert_eq!(r2[0].label, "motion");
        assert_eq!(r2[0].score, 0.85);

        // Same content again: static scene.
        let r3 = backend.infer(&frame(2))?;
        assert!(r3.is_empty());
        Ok(())
    }
}
