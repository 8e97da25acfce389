//! Screen and window capture using the `xcap` crate.
//!
//! This is the only platform-coupled file in the tree. The core never sees
//! window titles or monitor handles — it only receives frames through the
//! `FrameSource` trait.

use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use slidegrab_common::frame::Frame;
use slidegrab_core::source::{CaptureError, FrameSource};
use tracing::{debug, info};
use xcap::{Monitor, Window};

/// Windows smaller than this are UI chrome, not content.
const MIN_WINDOW_DIM: u32 = 200;

#[derive(Debug, Clone)]
enum CaptureTarget {
    PrimaryMonitor,
    Window { id: u32, title: String },
}

/// A `FrameSource` backed by the OS screen-capture API.
///
/// The target is resolved once at session start; each grab re-enumerates
/// by id so a window that vanishes mid-session shows up as a transient
/// capture error rather than a stale handle.
pub struct ScreenSource {
    target: CaptureTarget,
}

impl ScreenSource {
    /// Capture the primary monitor (first monitor as a fallback).
    pub fn primary_monitor() -> Self {
        Self {
            target: CaptureTarget::PrimaryMonitor,
        }
    }

    /// Scan visible windows for the first keyword hit, in keyword priority
    /// order, and pin that window for the session. Titles and app names
    /// are both searched, case-insensitively; tiny and untitled windows
    /// are skipped.
    pub fn find_window(keywords: &[String]) -> Result<Self, CaptureError> {
        let windows =
            Window::all().map_err(|e| CaptureError::Unavailable(e.to_string()))?;

        for keyword in keywords {
            let needle = keyword.to_lowercase();
            for window in &windows {
                let title = window.title().unwrap_or_default();
                if title.is_empty() {
                    continue;
                }
                if window.width().unwrap_or(0) < MIN_WINDOW_DIM
                    || window.height().unwrap_or(0) < MIN_WINDOW_DIM
                {
                    continue;
                }
                let app = window.app_name().unwrap_or_default();
                let haystack = format!("{title} {app}").to_lowercase();
                if !haystack.contains(&needle) {
                    continue;
                }
                let Ok(id) = window.id() else {
                    continue;
                };
                info!(title, app, keyword, "matched capture window");
                return Ok(Self {
                    target: CaptureTarget::Window { id, title },
                });
            }
        }

        Err(CaptureError::Unavailable(format!(
            "no window matched keywords {keywords:?}"
        )))
    }
}

#[async_trait]
impl FrameSource for ScreenSource {
    async fn capture(&mut self) -> Result<Frame, CaptureError> {
        let target = self.target.clone();
        // xcap calls block on OS resources; keep them off the runtime.
        let image = tokio::task::spawn_blocking(move || grab(&target))
            .await
            .map_err(|e| CaptureError::Failed(e.to_string()))??;
        debug!(
            width = image.width(),
            height = image.height(),
            "frame captured"
        );
        Ok(Frame::from_image(DynamicImage::ImageRgba8(image)))
    }
}

fn grab(target: &CaptureTarget) -> Result<RgbaImage, CaptureError> {
    match target {
        CaptureTarget::PrimaryMonitor => {
            let monitors =
                Monitor::all().map_err(|e| CaptureError::Unavailable(e.to_string()))?;
            let primary = monitors
                .iter()
                .find(|m| m.is_primary().unwrap_or(false))
                .or_else(|| monitors.first())
                .ok_or_else(|| CaptureError::Unavailable("no monitors found".into()))?;
            primary
                .capture_image()
                .map_err(|e| CaptureError::Failed(e.to_string()))
        }
        CaptureTarget::Window { id, title } => {
            let windows =
                Window::all().map_err(|e| CaptureError::Unavailable(e.to_string()))?;
            let window = windows
                .into_iter()
                .find(|w| w.id().map(|i| i == *id).unwrap_or(false))
                .ok_or_else(|| {
                    CaptureError::Failed(format!("window {title:?} is no longer present"))
                })?;
            window
                .capture_image()
                .map_err(|e| CaptureError::Failed(e.to_string()))
        }
    }
}
