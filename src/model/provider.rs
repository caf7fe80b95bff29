//! Model lifetime management: memoized load, serialized inference,
//! one-shot disposal.
//!
//! The model is loaded once per provider and shared through `ModelHandle`
//! clones. A handle owns the backend behind a lock, so inference is never
//! concurrent on one model, and `dispose` runs the backend's release hook
//! exactly once no matter how many handles exist.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::model::backend::ModelBackend;
use crate::model::result::{CoordinateSpace, Detection};
use crate::{Error, Frame, Result};

/// Builds a backend. This is the fallible, potentially slow step (weight
/// download, runtime initialization).
pub trait ModelLoader: Send {
    fn load(&self) -> anyhow::Result<Box<dyn ModelBackend>>;
}

impl<F> ModelLoader for F
where
    F: Fn() -> anyhow::Result<Box<dyn ModelBackend>> + Send,
{
    fn load(&self) -> anyhow::Result<Box<dyn ModelBackend>> {
        self()
    }
}

/// Shared handle to a loaded backend.
///
/// Clones refer to the same backend. Inference is serialized through the
/// internal lock: a second caller blocks until the first call returns.
#[derive(Clone)]
pub struct ModelHandle {
    name: &'static str,
    space: CoordinateSpace,
    backend: Arc<Mutex<Option<Box<dyn ModelBackend>>>>,
}

impl ModelHandle {
    fn new(backend: Box<dyn ModelBackend>) -> Self {
        Self {
            name: backend.name(),
            space: backend.coordinate_space(),
            backend: Arc::new(Mutex::new(Some(backend))),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn coordinate_space(&self) -> CoordinateSpace {
        self.space
    }

    pub fn is_disposed(&self) -> bool {
        match self.backend.lock() {
            Ok(guard) => guard.is_none(),
            Err(_) => true,
        }
    }

    /// Run inference on a frame.
    ///
    /// Blocks while another caller is inside `infer` on the same handle;
    /// the loop awaits completion of one call before issuing the next.
    pub fn infer(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let mut guard = self
            .backend
            .lock()
            .map_err(|_| Error::InferenceFailed(anyhow!("model lock poisoned")))?;
        let backend = guard
            .as_mut()
            .ok_or_else(|| Error::InferenceFailed(anyhow!("model '{}' disposed", self.name)))?;
        backend.infer(frame).map_err(Error::InferenceFailed)
    }

    /// Release the backend's native resources.
    ///
    /// The release hook runs exactly once; later calls are no-ops.
    pub fn dispose(&self) {
        let Ok(mut guard) = self.backend.lock() else {
            return;
        };
        if let Some(mut backend) = guard.take() {
            backend.dispose();
            log::debug!("model '{}' disposed", self.name);
        }
    }
}

/// Memoizing model loader.
///
/// `load` returns the cached handle after the first success, so repeated
/// calls never trigger duplicate loads. Failed loads are not cached; the
/// caller may retry explicitly.
pub struct ModelProvider {
    loader: Box<dyn ModelLoader>,
    handle: Option<ModelHandle>,
}

impl ModelProvider {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self {
            loader,
            handle: None,
        }
    }

    pub fn from_fn<F>(loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn ModelBackend>> + Send + 'static,
    {
        Self::new(Box::new(loader))
    }

    /// Load the model, or return the already-loaded handle.
    pub fn load(&mut self) -> Result<ModelHandle> {
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }
        let mut backend = self.loader.load().map_err(Error::ModelLoadFailed)?;
        backend.warm_up().map_err(Error::ModelLoadFailed)?;
        let handle = ModelHandle::new(backend);
        log::info!("model '{}' loaded", handle.name());
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    /// The loaded handle, if `load` has succeeded.
    pub fn loaded(&self) -> Option<ModelHandle> {
        self.handle.clone()
    }

    /// Dispose the cached handle at the end of the owning component's
    /// lifetime.
    pub fn dispose(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.dispose();
        }
    }
}
