//! Model provider boundary.
//!
//! The inference model is an external collaborator behind `ModelBackend`;
//! any backend satisfying that contract is interchangeable. This module
//! adds the lifetime management around it:
//! - `ModelProvider`: memoized, fallible load (`load` never duplicates an
//!   in-progress or completed load; failures are retryable)
//! - `ModelHandle`: shared handle that serializes `infer` calls and
//!   disposes the backend exactly once
//! - `ProfileRegistry`: named feature profiles pairing a backend with its
//!   policy confidence threshold

pub mod backend;
pub mod backends;
pub mod provider;
pub mod registry;
pub mod result;

pub use backend::ModelBackend;
pub use provider::{ModelHandle, ModelLoader, ModelProvider};
pub use registry::{standard_registry, ProfileRegistry};
pub use result::{BoundingBox, CoordinateSpace, Detection};
