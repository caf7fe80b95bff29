use thiserror::Error;

/// Failure taxonomy for the detection loop and its collaborators.
///
/// Every failure is caught at the boundary where it occurs and translated
/// into one of these variants. Nothing here is fatal to the host process:
/// a failed loop settles at `Idle` and may be restarted explicitly.
#[derive(Debug, Error)]
pub enum Error {
    /// Camera access was refused by the user or platform.
    ///
    /// User-correctable. Callers must surface the condition and must not
    /// retry automatically.
    #[error("camera permission denied")]
    PermissionDenied,

    /// The requested capture device is gone, busy, or was already released.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Model weights could not be loaded. A page-level retry is required;
    /// failed loads are never cached.
    #[error("model load failed: {0}")]
    ModelLoadFailed(anyhow::Error),

    /// A detection cycle failed (model error, frame conversion, deadline
    /// overrun). The loop halts to `Idle` and does not auto-retry.
    #[error("inference failed: {0}")]
    InferenceFailed(anyhow::Error),

    /// `start()` was requested before its prerequisites were met. Rejected
    /// synchronously; loop state is unchanged.
    #[error("not ready: {0}")]
    NotReady(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
