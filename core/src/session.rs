use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::detector::{ChangeDetector, Observation};
use crate::similarity::SimilarityError;
use crate::sink::{DocumentHandle, OutputSink, SinkError};
use crate::source::FrameSource;

/// What a finished session produced.
#[derive(Debug)]
pub struct SessionSummary {
    /// Slides accepted and stored.
    pub slides: u64,
    /// Poll ticks executed.
    pub ticks: u64,
    /// Ticks skipped because capture failed transiently.
    pub skipped: u64,
    pub document: DocumentHandle,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The source changed shape mid-session; the loop cannot continue.
    #[error("frame dimensions changed mid-session after slide {last_seq}: {source}")]
    IncompatibleFrames {
        #[source]
        source: SimilarityError,
        last_seq: u64,
    },
    #[error("failed to persist slide {seq}: {source}")]
    Store {
        #[source]
        source: SinkError,
        seq: u64,
    },
    #[error("failed to assemble the final document after {slides} slides: {source}")]
    Finalize {
        #[source]
        source: SinkError,
        slides: u64,
    },
}

/// The polling loop: capture, compare, maybe persist, sleep, repeat.
///
/// One sequential timeline — the loop is the only writer of detector
/// state, and accepted records reach the sink in order, exactly once.
/// Cancellation is cooperative: the stop flag is checked at the top of
/// every iteration and raced against the tick timer, so a stop request is
/// observed within one polling interval.
pub struct CaptureSession<S, K> {
    source: S,
    detector: ChangeDetector,
    sink: K,
    interval: Duration,
}

impl<S: FrameSource, K: OutputSink> CaptureSession<S, K> {
    pub fn new(source: S, detector: ChangeDetector, sink: K, interval: Duration) -> Self {
        Self {
            source,
            detector,
            sink,
            interval,
        }
    }

    /// Run until the stop flag flips, then flush the sink exactly once.
    ///
    /// Transient capture failures skip the tick. A detector
    /// incompatibility or a sink store failure is fatal, but the slides
    /// stored so far still get a best-effort finalize before the error
    /// surfaces.
    pub async fn run(
        mut self,
        mut stop: watch::Receiver<bool>,
    ) -> Result<SessionSummary, SessionError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks: u64 = 0;
        let mut skipped: u64 = 0;

        info!(
            interval_ms = self.interval.as_millis() as u64,
            threshold = self.detector.threshold(),
            "capture session started"
        );

        loop {
            if *stop.borrow() {
                break;
            }

            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    ticks += 1;

                    let frame = match self.source.capture().await {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(error = %e, tick = ticks, "transient capture failure, skipping tick");
                            skipped += 1;
                            continue;
                        }
                    };

                    match self.detector.observe(frame) {
                        Ok(Observation::Accepted(record)) => {
                            let seq = record.seq();
                            info!(seq, ts = record.captured_at_ms(), "new slide detected");
                            if let Err(e) = self.sink.store(&record).await {
                                error!(error = %e, seq, "slide persistence failed, ending session");
                                self.finalize_best_effort().await;
                                return Err(SessionError::Store { source: e, seq });
                            }
                        }
                        Ok(Observation::Rejected { score }) => {
                            debug!(score = format!("{score:.4}"), "frame rejected");
                        }
                        Err(e) => {
                            let last_seq = self.detector.last_seq();
                            error!(error = %e, last_seq, "frame dimensions changed mid-session, ending session");
                            self.finalize_best_effort().await;
                            return Err(SessionError::IncompatibleFrames { source: e, last_seq });
                        }
                    }
                }
            }
        }

        let slides = self.detector.last_seq();
        info!(slides, ticks, skipped, "stop observed, finalizing session");

        let document = self
            .sink
            .finalize()
            .await
            .map_err(|e| SessionError::Finalize { source: e, slides })?;

        Ok(SessionSummary {
            slides,
            ticks,
            skipped,
            document,
        })
    }

    /// Flush whatever made it to the sink before surfacing a fatal error.
    async fn finalize_best_effort(&mut self) {
        match self.sink.finalize().await {
            Ok(document) => info!(?document, "best-effort finalize succeeded"),
            Err(e) => warn!(error = %e, "best-effort finalize failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ChangeDetector;
    use crate::similarity::MeanAbsDiff;
    use crate::source::CaptureError;
    use async_trait::async_trait;
    use image::{DynamicImage, GrayImage, Luma};
    use slidegrab_common::frame::{Frame, SlideRecord};
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    fn solid(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value]))),
            value as i64,
        )
    }

    fn detector(threshold: f64) -> ChangeDetector {
        ChangeDetector::new(Box::new(MeanAbsDiff), threshold).unwrap()
    }

    /// Replays a fixed script of capture results, then flips the stop flag
    /// and reports itself exhausted.
    struct ScriptedSource {
        script: VecDeque<Result<Frame, CaptureError>>,
        stop: Option<watch::Sender<bool>>,
    }

    impl ScriptedSource {
        fn new(
            script: Vec<Result<Frame, CaptureError>>,
            stop: watch::Sender<bool>,
        ) -> Self {
            Self {
                script: script.into(),
                stop: Some(stop),
            }
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn capture(&mut self) -> Result<Frame, CaptureError> {
            match self.script.pop_front() {
                Some(result) => result,
                None => {
                    if let Some(stop) = self.stop.take() {
                        let _ = stop.send(true);
                    }
                    Err(CaptureError::Failed("script exhausted".into()))
                }
            }
        }
    }

    #[derive(Default)]
    struct SinkLog {
        seqs: Vec<u64>,
        values: Vec<u8>,
        finalized: u32,
    }

    #[derive(Clone)]
    struct RecordingSink(Arc<Mutex<SinkLog>>);

    impl RecordingSink {
        fn new() -> (Self, Arc<Mutex<SinkLog>>) {
            let log = Arc::new(Mutex::new(SinkLog::default()));
            (Self(Arc::clone(&log)), log)
        }
    }

    #[async_trait]
    impl OutputSink for RecordingSink {
        async fn store(&mut self, record: &SlideRecord) -> Result<(), SinkError> {
            let mut log = self.0.lock().unwrap();
            log.seqs.push(record.seq());
            log.values.push(record.frame().to_luma().get_pixel(0, 0).0[0]);
            Ok(())
        }

        async fn finalize(&mut self) -> Result<DocumentHandle, SinkError> {
            let mut log = self.0.lock().unwrap();
            log.finalized += 1;
            if log.seqs.is_empty() {
                Ok(DocumentHandle::Empty)
            } else {
                Ok(DocumentHandle::Written {
                    path: PathBuf::from("deck.pdf"),
                    pages: log.seqs.len(),
                })
            }
        }
    }

    fn session(
        script: Vec<Result<Frame, CaptureError>>,
        threshold: f64,
    ) -> (
        CaptureSession<ScriptedSource, RecordingSink>,
        watch::Receiver<bool>,
        Arc<Mutex<SinkLog>>,
    ) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let source = ScriptedSource::new(script, stop_tx);
        let (sink, log) = RecordingSink::new();
        let session = CaptureSession::new(
            source,
            detector(threshold),
            sink,
            Duration::from_secs(1),
        );
        (session, stop_rx, log)
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_slide_content_is_recaptured() {
        // A, A, B, A: the second A is a new slide because the reference is
        // B by then, not the first A.
        let script = vec![
            Ok(solid(8, 8, 10)),
            Ok(solid(8, 8, 10)),
            Ok(solid(8, 8, 200)),
            Ok(solid(8, 8, 10)),
        ];
        let (session, stop_rx, log) = session(script, 0.05);

        let summary = session.run(stop_rx).await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.seqs, vec![1, 2, 3]);
        assert_eq!(log.values, vec![10, 200, 10]);
        assert_eq!(log.finalized, 1);
        assert_eq!(summary.slides, 3);
        assert_eq!(
            summary.document,
            DocumentHandle::Written {
                path: PathBuf::from("deck.pdf"),
                pages: 3
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn identical_frames_yield_single_slide() {
        let script = (0..10).map(|_| Ok(solid(8, 8, 42))).collect();
        let (session, stop_rx, log) = session(script, 0.05);

        let summary = session.run(stop_rx).await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.seqs, vec![1]);
        assert_eq!(log.finalized, 1);
        assert_eq!(summary.slides, 1);
        assert_eq!(
            summary.document,
            DocumentHandle::Written {
                path: PathBuf::from("deck.pdf"),
                pages: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_capture_failures_skip_ticks() {
        let script = vec![
            Ok(solid(8, 8, 0)),
            Err(CaptureError::Failed("window occluded".into())),
            Err(CaptureError::Unavailable("permission pending".into())),
            Ok(solid(8, 8, 0)),
        ];
        let (session, stop_rx, log) = session(script, 0.05);

        let summary = session.run(stop_rx).await.unwrap();

        assert_eq!(log.lock().unwrap().seqs, vec![1]);
        assert_eq!(summary.slides, 1);
        // Two scripted failures plus the exhaustion tick that flips stop.
        assert_eq!(summary.skipped, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_session_finalizes_once() {
        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send(true).unwrap();
        let source = ScriptedSource::new(vec![], stop_tx);
        let (sink, log) = RecordingSink::new();
        let session = CaptureSession::new(
            source,
            detector(0.05),
            sink,
            Duration::from_secs(1),
        );

        let summary = session.run(stop_rx).await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.seqs, Vec::<u64>::new());
        assert_eq!(log.finalized, 1);
        assert_eq!(summary.slides, 0);
        assert_eq!(summary.ticks, 0);
        assert_eq!(summary.document, DocumentHandle::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn dimension_change_is_fatal_but_flushes() {
        let script = vec![Ok(solid(8, 8, 0)), Ok(solid(16, 16, 0))];
        let (session, stop_rx, log) = session(script, 0.05);

        let err = session.run(stop_rx).await.unwrap_err();
        match err {
            SessionError::IncompatibleFrames { last_seq, .. } => assert_eq!(last_seq, 1),
            other => panic!("expected IncompatibleFrames, got {other:?}"),
        }

        // The slide captured before the failure was still flushed.
        let log = log.lock().unwrap();
        assert_eq!(log.seqs, vec![1]);
        assert_eq!(log.finalized, 1);
    }
}
