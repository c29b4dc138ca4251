//! Errors surfaced to the sender or receiver UI.
//!
//! Camera noise never reaches this type: undecodable input is dropped
//! inside the scanner loop.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Serialization or compression failed; no frames were produced.
    #[error("failed to encode payload: {0}")]
    Encode(String),

    /// All fragments arrived but the joined text did not decode.
    #[error("failed to assemble transfer {transfer_id}")]
    AssemblyFailed { transfer_id: String },

    /// The code's nonce has already been redeemed on this device.
    #[error("code {nonce} has already been used")]
    ReplayRejected { nonce: String },

    /// Permission denied or device unavailable.
    #[error("camera failed to start: {0}")]
    CameraStart(#[source] anyhow::Error),

    /// The runtime offers no way to record the canvas.
    #[error("video capture is not supported: {0}")]
    VideoExportUnsupported(String),

    #[error("a video export is already running")]
    ExportInProgress,

    #[error("no frames to export")]
    NothingToExport,

    #[error("video export failed: {0}")]
    Export(#[source] anyhow::Error),

    #[error("failed to persist consumed nonces to {0}: {1}")]
    Persist(PathBuf, #[source] std::io::Error),
}
