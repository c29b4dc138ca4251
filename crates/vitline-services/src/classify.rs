//! Frame classification — what did the camera just read?

use serde_json::Value;

use vitline_core::wire::ChunkFrame;

use crate::codec;

/// Outcome of inspecting one decoded camera string.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// One fragment of a multi-frame transfer.
    Chunk(ChunkFrame),
    /// A whole payload in a single frame.
    Complete(Value),
    /// Neither; drop it and keep scanning.
    Noise,
}

/// Classify a camera string. Pure: never touches reassembly state.
pub fn classify(text: &str) -> Classified {
    if let Some(frame) = ChunkFrame::parse(text) {
        return Classified::Chunk(frame);
    }
    match codec::decode_value(text) {
        Some(value) => Classified::Complete(value),
        None => Classified::Noise,
    }
}
