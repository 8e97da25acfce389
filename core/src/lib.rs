//! Slide-change detection core.
//!
//! The reusable pieces of a slide capture session: similarity engines that
//! score how different two frames are, a change detector that turns those
//! scores into accept/reject decisions, the polling loop that drives it,
//! and the sink that persists accepted slides as JPEGs plus a final PDF.
//!
//! Everything platform-coupled (screen/window enumeration, OS capture
//! APIs) stays behind the [`source::FrameSource`] trait.

pub mod detector;
pub mod session;
pub mod similarity;
pub mod sink;
pub mod source;

pub use detector::{ChangeDetector, DetectorError, Observation};
pub use session::{CaptureSession, SessionError, SessionSummary};
pub use similarity::{engine_by_name, SimilarityEngine, SimilarityError};
pub use sink::{DeckSink, DocumentHandle, OutputSink, SinkError};
pub use source::{CaptureError, FrameSource};
