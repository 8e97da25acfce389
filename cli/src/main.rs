mod capture;

use std::path::{Path, PathBuf};

use slidegrab_common::config::Config;
use slidegrab_core::sink::{DeckSink, DocumentHandle};
use slidegrab_core::{similarity, CaptureSession, ChangeDetector};
use tokio::sync::watch;
use tracing::{error, info};

use capture::ScreenSource;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = if config_path.is_file() {
        match Config::load(&config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {e}", config_path.display());
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        source = config.capture.source,
        engine = config.detector.engine,
        interval_secs = config.capture.interval_secs,
        output = config.output.dir,
        "starting slidegrab"
    );

    // Everything below validates before the loop starts; a bad session
    // never begins half-way.
    let interval = match config.capture.interval() {
        Ok(i) => i,
        Err(e) => {
            error!(error = %e, "invalid capture interval");
            std::process::exit(1);
        }
    };

    let threshold = match config.detector.resolve_threshold() {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "invalid detector configuration");
            std::process::exit(1);
        }
    };

    let Some(engine) = similarity::engine_by_name(&config.detector.engine) else {
        error!(
            engine = config.detector.engine,
            "unknown similarity engine, expected 'mean-diff' or 'histogram'"
        );
        std::process::exit(1);
    };

    let detector = match ChangeDetector::new(engine, threshold) {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "invalid threshold");
            std::process::exit(1);
        }
    };

    let source = match config.capture.source.as_str() {
        "monitor" => ScreenSource::primary_monitor(),
        "window" => match ScreenSource::find_window(&config.capture.window_keywords) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "no capture window found");
                std::process::exit(1);
            }
        },
        other => {
            error!(
                source = other,
                "unknown capture source, expected 'monitor' or 'window'"
            );
            std::process::exit(1);
        }
    };

    let sink = match DeckSink::create(Path::new(&config.output.dir), config.output.jpeg_quality) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to prepare output directory");
            std::process::exit(1);
        }
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stop requested, finishing session");
            let _ = stop_tx.send(true);
        }
    });

    info!(threshold, "capturing — press Ctrl-C to stop and build the PDF");

    let session = CaptureSession::new(source, detector, sink, interval);
    match session.run(stop_rx).await {
        Ok(summary) => {
            info!(
                slides = summary.slides,
                ticks = summary.ticks,
                skipped = summary.skipped,
                "session finished"
            );
            match summary.document {
                DocumentHandle::Written { path, pages } => {
                    info!(path = %path.display(), pages, "slide deck ready");
                }
                DocumentHandle::Empty => {
                    info!("no slides captured, no document written");
                }
            }
        }
        Err(e) => {
            error!(error = %e, "session failed");
            std::process::exit(1);
        }
    }
}
