use async_trait::async_trait;
use slidegrab_common::frame::Frame;

/// Produces one frame per call from whatever the session is watching.
///
/// Implementations must return frames of stable dimensions for the whole
/// session; if the underlying region changes shape mid-session the
/// detector surfaces that as a fatal incompatibility. Capture failures are
/// expected to be transient (window momentarily occluded, permission not
/// yet granted) and the loop skips the tick rather than terminating.
#[async_trait]
pub trait FrameSource: Send {
    async fn capture(&mut self) -> Result<Frame, CaptureError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture source unavailable: {0}")]
    Unavailable(String),
    #[error("frame capture failed: {0}")]
    Failed(String),
}
