use async_trait::async_trait;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use slidegrab_common::frame::SlideRecord;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::pdf::{write_deck, PdfPage};
use super::{DocumentHandle, OutputSink, SinkError};

/// Filesystem sink: numbered per-slide JPEGs plus a final PDF deck.
///
/// Each session gets its own `session_<stamp>` directory under the output
/// dir holding `slide_001.jpg`, `slide_002.jpg`, ...; `finalize` assembles
/// the same JPEG bytes into `slides_<stamp>.pdf` next to it. If the PDF
/// cannot be written the per-slide images stay on disk as the recoverable
/// copy of the session.
pub struct DeckSink {
    session_dir: PathBuf,
    document_path: PathBuf,
    jpeg_quality: u8,
    pages: Vec<PdfPage>,
    next_seq: u64,
}

impl DeckSink {
    /// Create the session directory and fix the document path. The stamp is
    /// taken once, so the slide folder and the PDF share it.
    pub fn create(output_dir: &Path, jpeg_quality: u8) -> Result<Self, SinkError> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let session_dir = output_dir.join(format!("session_{stamp}"));
        std::fs::create_dir_all(&session_dir).map_err(|e| SinkError::CreateDir {
            path: session_dir.clone(),
            source: e,
        })?;
        let document_path = output_dir.join(format!("slides_{stamp}.pdf"));

        info!(dir = %session_dir.display(), "session output directory created");

        Ok(Self {
            session_dir,
            document_path,
            jpeg_quality,
            pages: Vec::new(),
            next_seq: 1,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    fn slide_path(&self, seq: u64) -> PathBuf {
        self.session_dir.join(format!("slide_{seq:03}.jpg"))
    }
}

#[async_trait]
impl OutputSink for DeckSink {
    async fn store(&mut self, record: &SlideRecord) -> Result<(), SinkError> {
        let seq = record.seq();
        if seq != self.next_seq {
            return Err(SinkError::OutOfOrder {
                expected: self.next_seq,
                got: seq,
            });
        }

        // JPEG has no alpha channel, so captures arrive here as RGB.
        let rgb = record.frame().image().to_rgb8();
        let mut jpeg = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality);
        encoder
            .encode_image(&rgb)
            .map_err(|e| SinkError::Encode { seq, source: e })?;

        let path = self.slide_path(seq);
        std::fs::write(&path, &jpeg).map_err(|e| SinkError::WriteImage {
            path: path.clone(),
            source: e,
        })?;

        info!(seq, path = %path.display(), bytes = jpeg.len(), "slide stored");

        self.pages.push(PdfPage {
            width: record.frame().width(),
            height: record.frame().height(),
            jpeg,
        });
        self.next_seq += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<DocumentHandle, SinkError> {
        if self.pages.is_empty() {
            info!("no slides captured, skipping document assembly");
            return Ok(DocumentHandle::Empty);
        }

        let pages = self.pages.len();
        if let Err(e) = write_deck(&self.document_path, &self.pages) {
            warn!(
                error = %e,
                dir = %self.session_dir.display(),
                "PDF assembly failed; per-slide images remain on disk"
            );
            return Err(e);
        }

        info!(path = %self.document_path.display(), pages, "slide deck written");
        Ok(DocumentHandle::Written {
            path: self.document_path.clone(),
            pages,
        })
    }
}
