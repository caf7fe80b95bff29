use anyhow::Result;

use crate::model::result::{CoordinateSpace, Detection};
use crate::Frame;

/// Model backend trait.
///
/// # Contract
///
/// - `infer` is pure with respect to loop state and treats the frame as
///   read-only and ephemeral; implementations must not retain the pixels
///   beyond the call.
/// - `infer` is never invoked concurrently on one backend instance;
///   callers (see `ModelHandle`) serialize calls so the underlying tensor
///   runtime sees bounded back-pressure.
/// - `dispose` is invoked exactly once, when the owning handle is torn
///   down.
pub trait ModelBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Coordinate space of the boxes this backend reports.
    fn coordinate_space(&self) -> CoordinateSpace;

    /// Run inference on a frame.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once at load time.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release native resources. Default backends hold none.
    fn dispose(&mut self) {}
}
