//! Encoding — sanitize, compress, and split an envelope into QR frames.

use std::fmt;

use serde_json::Value;

use vitline_core::config::CodecConfig;
use vitline_core::wire::{ChunkFrame, TransferId, MAX_FRAMES};
use vitline_core::{Envelope, Nonce};

use crate::codec;
use crate::error::TransferError;
use crate::sanitize::{strip_descriptions, strip_ids};

/// Non-fatal advisories produced while encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeWarning {
    /// Too many frames; descriptions were dropped and the payload re-encoded.
    SizeReduced { frames_before: usize, frames_after: usize },
}

impl fmt::Display for EncodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeWarning::SizeReduced {
                frames_before,
                frames_after,
            } => write!(
                f,
                "payload too large: descriptions dropped ({frames_before} -> {frames_after} frames)"
            ),
        }
    }
}

/// Result of one encode call.
#[derive(Debug, Clone)]
pub struct Encoded {
    /// Strings to render, in display order.
    pub frames: Vec<String>,
    /// Set when the payload needed more than one frame.
    pub transfer_id: Option<TransferId>,
    /// Nonce stamped on this encode call.
    pub nonce: Nonce,
    pub warnings: Vec<EncodeWarning>,
}

impl Encoded {
    pub fn is_chunked(&self) -> bool {
        self.transfer_id.is_some()
    }
}

/// Split a compressed string into frames of at most `max_len` characters.
///
/// A string that fits is returned verbatim as the only frame. Otherwise
/// every fragment carries the `VIT^` header, fragments partition the input
/// exactly, and all but the last are exactly `max_len` long.
pub fn split_into_frames(compressed: &str, max_len: usize, transfer_id: &TransferId) -> Vec<String> {
    let max_len = max_len.max(1);
    if compressed.len() <= max_len {
        return vec![compressed.to_string()];
    }

    // Compressed text is ASCII, so byte offsets are char boundaries.
    let bytes = compressed.as_bytes();
    let total = bytes.len().div_ceil(max_len);
    bytes
        .chunks(max_len)
        .enumerate()
        .map(|(index, fragment)| {
            ChunkFrame {
                transfer_id: transfer_id.clone(),
                index,
                total,
                fragment: String::from_utf8_lossy(fragment).into_owned(),
            }
            .encode()
        })
        .collect()
}

/// Send-side façade over sanitizer, compressor, and chunker.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    config: CodecConfig,
}

impl Encoder {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode an envelope for display.
    ///
    /// Every call stamps a fresh nonce, so encoding the same envelope twice
    /// yields two independently redeemable codes.
    pub fn encode(&self, envelope: &Envelope) -> Result<Encoded, TransferError> {
        let stamped = envelope.stamped();
        let nonce = stamped.nonce.clone().unwrap_or_else(Nonce::mint);

        let value =
            serde_json::to_value(&stamped).map_err(|e| TransferError::Encode(e.to_string()))?;
        let value = strip_ids(&value);

        let (mut frames, mut transfer_id) = self.frames_for(&value)?;
        let mut warnings = Vec::new();

        if frames.len() > self.config.reduce_threshold {
            let mut reduced = value.clone();
            if let Some(payload) = reduced.get_mut("payload") {
                *payload = strip_descriptions(payload);
            }
            let (reduced_frames, reduced_id) = self.frames_for(&reduced)?;
            tracing::warn!(
                frames_before = frames.len(),
                frames_after = reduced_frames.len(),
                threshold = self.config.reduce_threshold,
                "payload too large, descriptions dropped"
            );
            warnings.push(EncodeWarning::SizeReduced {
                frames_before: frames.len(),
                frames_after: reduced_frames.len(),
            });
            frames = reduced_frames;
            transfer_id = reduced_id;
        }

        if frames.len() > MAX_FRAMES {
            return Err(TransferError::Encode(format!(
                "payload needs {} frames, at most {} can be scanned",
                frames.len(),
                MAX_FRAMES
            )));
        }

        tracing::info!(
            kind = %envelope.kind,
            frames = frames.len(),
            transfer_id = ?transfer_id,
            "payload encoded"
        );

        Ok(Encoded {
            frames,
            transfer_id,
            nonce,
            warnings,
        })
    }

    fn frames_for(&self, value: &Value) -> Result<(Vec<String>, Option<TransferId>), TransferError> {
        let json = serde_json::to_string(value).map_err(|e| TransferError::Encode(e.to_string()))?;
        let compressed = codec::compress(&json).map_err(|e| TransferError::Encode(e.to_string()))?;

        if compressed.len() <= self.config.max_fragment_len {
            return Ok((vec![compressed], None));
        }

        let transfer_id = TransferId::generate();
        let frames = split_into_frames(&compressed, self.config.max_fragment_len, &transfer_id);
        Ok((frames, Some(transfer_id)))
    }
}
