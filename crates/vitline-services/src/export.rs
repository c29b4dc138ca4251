//! One-pass animated export of a frame set.
//!
//! Every frame is drawn exactly once, in index order, onto a recording
//! capture, waiting the same adaptive delay the live display uses. The
//! exporter refuses a second export while one is running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vitline_core::config::DisplayConfig;
use vitline_core::PayloadKind;

use crate::error::TransferError;
use crate::scheduler::Canvas;

/// A canvas whose output can be recorded into a single animated artifact.
pub trait FrameCapture: Canvas {
    /// Whether this runtime can record at all.
    fn is_supported(&self) -> bool;

    /// Begin recording at `fps`.
    fn begin(&mut self, fps: u32) -> anyhow::Result<()>;

    /// Stop recording and return the encoded artifact.
    fn finish(&mut self) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Recording,
}

#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub file_name: String,
    pub frames: usize,
    pub data: Vec<u8>,
}

/// Serializes video exports. Clones share the recording flag.
#[derive(Debug, Clone, Default)]
pub struct VideoExporter {
    recording: Arc<AtomicBool>,
}

/// Returns the exporter to idle however the export ends.
struct RecordingLease<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RecordingLease<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl VideoExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ExportState {
        if self.recording.load(Ordering::Acquire) {
            ExportState::Recording
        } else {
            ExportState::Idle
        }
    }

    fn lease(&self) -> Option<RecordingLease<'_>> {
        self.recording
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RecordingLease {
                flag: &self.recording,
            })
    }

    /// Record `frames` once through `capture`.
    pub async fn export<C: FrameCapture + ?Sized>(
        &self,
        frames: &[String],
        capture: &mut C,
        kind: PayloadKind,
        config: &DisplayConfig,
    ) -> Result<VideoArtifact, TransferError> {
        let Some(_lease) = self.lease() else {
            tracing::warn!("video export requested while one is running");
            return Err(TransferError::ExportInProgress);
        };

        if frames.is_empty() {
            return Err(TransferError::NothingToExport);
        }
        if !capture.is_supported() {
            tracing::warn!(kind = %kind, "video capture unavailable");
            return Err(TransferError::VideoExportUnsupported(
                "no recording capability on this canvas".to_string(),
            ));
        }

        let delay = config.rotation_interval(frames.len());
        capture
            .begin(config.capture_fps)
            .map_err(TransferError::Export)?;
        tracing::info!(
            kind = %kind,
            frames = frames.len(),
            fps = config.capture_fps,
            delay_ms = delay.as_millis() as u64,
            "video export started"
        );

        for (index, frame) in frames.iter().enumerate() {
            capture.draw(frame).map_err(TransferError::Export)?;
            tracing::trace!(index, "frame captured");
            tokio::time::sleep(delay).await;
        }

        let data = capture.finish().map_err(TransferError::Export)?;
        let artifact = VideoArtifact {
            file_name: format!("qr_code_{kind}_animated.webm"),
            frames: frames.len(),
            data,
        };
        tracing::info!(file = %artifact.file_name, bytes = artifact.data.len(), "video export finished");
        Ok(artifact)
    }
}
