use slidegrab_common::frame::{Frame, SlideRecord};
use tracing::debug;

use crate::similarity::{SimilarityEngine, SimilarityError};

/// Outcome of observing one frame.
#[derive(Debug)]
pub enum Observation {
    /// The frame is a new slide; the record carries its sequence index.
    Accepted(SlideRecord),
    /// The frame is too close to the current reference slide.
    Rejected { score: f64 },
}

/// Decides, frame by frame, whether the screen now shows a new slide.
///
/// Two states: no reference yet (session start), or holding the last
/// accepted slide as the comparison baseline. The first observed frame is
/// always accepted; after that a frame becomes a slide when its
/// dissimilarity from the reference reaches the threshold. The threshold
/// boundary is inclusive: a score exactly at the cutoff counts as a change.
pub struct ChangeDetector {
    engine: Box<dyn SimilarityEngine>,
    threshold: f64,
    reference: Option<Frame>,
    accepted: u64,
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("engine", &self.engine.name())
            .field("threshold", &self.threshold)
            .field("accepted", &self.accepted)
            .finish_non_exhaustive()
    }
}

impl ChangeDetector {
    /// The threshold is validated against the engine's score range once,
    /// here; it never changes for the rest of the session.
    pub fn new(engine: Box<dyn SimilarityEngine>, threshold: f64) -> Result<Self, DetectorError> {
        if !engine.threshold_in_range(threshold) {
            return Err(DetectorError::InvalidThreshold {
                threshold,
                engine: engine.name().to_string(),
            });
        }
        Ok(Self {
            engine,
            threshold,
            reference: None,
            accepted: 0,
        })
    }

    /// Observe one frame and decide accept/reject.
    ///
    /// A dimension mismatch against the reference propagates as an error
    /// and leaves the detector untouched: the reference frame and sequence
    /// counter are exactly as they were before the call.
    pub fn observe(&mut self, frame: Frame) -> Result<Observation, SimilarityError> {
        if let Some(reference) = &self.reference {
            let score = self.engine.difference(reference, &frame)?;
            let changed = score >= self.threshold;
            debug!(
                score = format!("{score:.4}"),
                threshold = format!("{:.4}", self.threshold),
                changed,
                engine = self.engine.name(),
                "frame comparison"
            );
            if !changed {
                return Ok(Observation::Rejected { score });
            }
        } else {
            debug!("no reference slide yet, accepting first frame");
        }

        self.accepted += 1;
        let record = SlideRecord::new(self.accepted, frame.clone());
        self.reference = Some(frame);
        Ok(Observation::Accepted(record))
    }

    /// Sequence index of the most recently accepted slide (0 before any).
    pub fn last_seq(&self) -> u64 {
        self.accepted
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("threshold {threshold} is outside the valid range of the {engine} engine")]
    InvalidThreshold { threshold: f64, engine: String },
}
