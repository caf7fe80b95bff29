//! Detection profile registry.
//!
//! The original application drove every live-video feature through the
//! same loop, differing only in which model it called and which confidence
//! threshold it applied. A profile captures that pairing, so features are
//! configuration, not near-duplicate loop implementations.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::model::backends::{LumaBlobBackend, StubBackend};
use crate::model::provider::{ModelHandle, ModelLoader, ModelProvider};
use crate::model::ModelBackend;

/// Confidence threshold policy for general object detection.
pub const OBJECT_THRESHOLD: f32 = 0.66;
/// Confidence threshold policy for face detection.
pub const FACE_THRESHOLD: f32 = 0.5;

struct ProfileEntry {
    confidence_threshold: f32,
    provider: ModelProvider,
}

/// Registry of named detection profiles.
///
/// Each profile owns a memoizing `ModelProvider`, so loading the same
/// profile twice returns the cached handle.
pub struct ProfileRegistry {
    entries: HashMap<String, ProfileEntry>,
    default_name: Option<String>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a profile. The first registered profile becomes the
    /// default.
    pub fn register(
        &mut self,
        name: &str,
        confidence_threshold: f32,
        loader: impl ModelLoader + 'static,
    ) {
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        self.entries.insert(
            name.to_string(),
            ProfileEntry {
                confidence_threshold,
                provider: ModelProvider::new(Box::new(loader)),
            },
        );
    }

    /// Set the default profile by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.entries.contains_key(name) {
            return Err(anyhow!("profile '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_profile(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// Registered profile names.
    pub fn list(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Policy threshold for a profile.
    pub fn confidence_threshold(&self, name: &str) -> Option<f32> {
        self.entries.get(name).map(|e| e.confidence_threshold)
    }

    /// Load (memoized) the model behind a profile.
    ///
    /// Returns the handle together with the profile's policy threshold.
    pub fn load(&mut self, name: &str) -> Result<(ModelHandle, f32)> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| anyhow!("profile '{}' not registered", name))?;
        let handle = entry.provider.load().map_err(anyhow::Error::new)?;
        Ok((handle, entry.confidence_threshold))
    }

    /// Dispose every loaded model. Called once at teardown.
    pub fn dispose_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.provider.dispose();
        }
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with the reference wiring: `object` backed by the bright-blob
/// detector, `face` backed by the motion stub. Real deployments register
/// their own backends under the same names.
pub fn standard_registry() -> ProfileRegistry {
    let mut registry = ProfileRegistry::new();
    registry.register(OBJECT_PROFILE, OBJECT_THRESHOLD, || {
        Ok(Box::new(LumaBlobBackend::new()) as Box<dyn ModelBackend>)
    });
    registry.register(FACE_PROFILE, FACE_THRESHOLD, || {
        Ok(Box::new(StubBackend::new()) as Box<dyn ModelBackend>)
    });
    registry
}

/// Name of the general object detection profile.
pub const OBJECT_PROFILE: &str = "object";
/// Name of the face detection profile.
pub const FACE_PROFILE: &str = "face";
