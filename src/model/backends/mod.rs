//! Reference model backends.
//!
//! These exist so the loop is exercisable end to end without a native
//! inference runtime:
//! - `StubBackend`: frame-hash motion detection (testing)
//! - `LumaBlobBackend`: pure-CPU bright-region detection

mod luma;
mod stub;

pub use luma::LumaBlobBackend;
pub use stub::StubBackend;
