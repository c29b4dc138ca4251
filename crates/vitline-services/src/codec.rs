//! Text compression for QR payloads.
//!
//! DEFLATE the UTF-8 text, then base64 it. The output alphabet is
//! `A-Z a-z 0-9 + / =`: no control characters and never the `^` frame
//! separator. Output length depends only on the input, so chunk counts
//! can be planned from it.

use std::io::{Read, Write};

use base64::{engine::general_purpose, Engine as _};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde_json::Value;

/// Compress text into a QR-safe string.
pub fn compress(text: &str) -> std::io::Result<String> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(text.as_bytes())?;
    let deflated = encoder.finish()?;
    Ok(general_purpose::STANDARD.encode(deflated))
}

/// Reverse [`compress`]. None if `encoded` is not base64, does not
/// inflate, or inflates to empty or non-UTF-8 text.
pub fn decompress(encoded: &str) -> Option<String> {
    let deflated = general_purpose::STANDARD.decode(encoded).ok()?;
    let mut text = String::new();
    DeflateDecoder::new(deflated.as_slice())
        .read_to_string(&mut text)
        .ok()?;
    if text.is_empty() {
        return None;
    }
    Some(text)
}

/// Decode a complete single-frame payload into JSON.
///
/// Compressed input is tried first. Only when decompression yields
/// nothing is the input parsed as raw JSON, which is how codes printed
/// before compression existed still scan.
pub fn decode_value(text: &str) -> Option<Value> {
    match decompress(text) {
        Some(json) => serde_json::from_str(&json).ok(),
        None => serde_json::from_str(text).ok(),
    }
}
