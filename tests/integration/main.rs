//! vitline integration test harness.
//!
//! Drives the sender and receiver halves end to end through scripted
//! camera and canvas capabilities, the way a phone pointed at a screen
//! would, but deterministic.
//!
//!   cargo test --test integration

mod display;
mod transfer;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use vitline_core::config::{CodecConfig, ScannerConfig};
use vitline_core::{Envelope, PayloadKind};
use vitline_services::sanitize;
use vitline_services::{
    Camera, Canvas, Encoded, Encoder, FrameCapture, ReplayGuard, ScanOutcome, Scanner,
    TransferError,
};

// ── Harness ───────────────────────────────────────────────────────────────────

/// Camera that replays a fixed list of decoded strings, then ends.
pub struct ScriptedCamera {
    script: VecDeque<String>,
    pub starts: usize,
    pub stops: usize,
    pub clears: usize,
}

impl ScriptedCamera {
    pub fn new<I: IntoIterator<Item = String>>(script: I) -> Self {
        Self {
            script: script.into_iter().collect(),
            starts: 0,
            stops: 0,
            clears: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl Camera for ScriptedCamera {
    async fn start(&mut self, _fps: u32) -> Result<()> {
        self.starts += 1;
        Ok(())
    }

    async fn next_decoded(&mut self) -> Option<String> {
        self.script.pop_front()
    }

    async fn stop(&mut self) -> Result<()> {
        self.stops += 1;
        Ok(())
    }

    fn clear(&mut self) {
        self.clears += 1;
    }
}

/// Canvas that remembers every frame it was asked to draw.
#[derive(Default)]
pub struct RecordingCanvas {
    pub drawn: Vec<String>,
    pub recording: Option<u32>,
    pub supported: bool,
}

impl RecordingCanvas {
    pub fn capture() -> Self {
        Self {
            supported: true,
            ..Self::default()
        }
    }
}

impl Canvas for RecordingCanvas {
    fn draw(&mut self, frame: &str) -> Result<()> {
        self.drawn.push(frame.to_string());
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(self.drawn.last().cloned().unwrap_or_default().into_bytes())
    }
}

impl FrameCapture for RecordingCanvas {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn begin(&mut self, fps: u32) -> Result<()> {
        self.recording = Some(fps);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        Ok(self.drawn.concat().into_bytes())
    }
}

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh, empty directory under the system temp dir.
pub fn temp_dir(label: &str) -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "vitline-it-{}-{}-{}",
        label,
        std::process::id(),
        id
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Pseudo-random lowercase text that deflate cannot shrink much.
pub fn incompressible(len: usize, seed: u64) -> String {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (b'a' + (state % 26) as u8) as char
        })
        .collect()
}

/// An inventory large enough to need several frames at the default size.
pub fn large_inventory(items: usize) -> Value {
    let list: Vec<Value> = (0..items)
        .map(|i| {
            json!({
                "id": i,
                "name": format!("item-{i}"),
                "weight": i % 7,
                "description": incompressible(120, i as u64 + 1),
            })
        })
        .collect();
    Value::Array(list)
}

pub fn encode(envelope: &Envelope) -> Encoded {
    Encoder::new(CodecConfig::default())
        .encode(envelope)
        .expect("encode should succeed")
}

/// The envelope a receiver should reconstruct: every `id` gone, nonce present.
pub fn expected_on_receipt(envelope: &Envelope, encoded: &Encoded) -> Envelope {
    let stamped = Envelope {
        nonce: Some(encoded.nonce.clone()),
        ..envelope.clone()
    };
    let value = serde_json::to_value(&stamped).expect("envelope serializes");
    Envelope::from_value(sanitize::strip_ids(&value)).expect("stripped envelope parses")
}

/// Run one scan session over `script` with a live shutdown sender.
pub async fn scan(
    scanner: &mut Scanner,
    script: Vec<String>,
) -> (Result<ScanOutcome, TransferError>, ScriptedCamera) {
    let (_tx, rx) = broadcast::channel(1);
    let mut camera = ScriptedCamera::new(script);
    let outcome = scanner.run(&mut camera, rx).await;
    (outcome, camera)
}

pub fn scanner_with(guard: ReplayGuard) -> Scanner {
    Scanner::new(guard, &ScannerConfig::default())
}

pub fn kind_of(name: &str) -> PayloadKind {
    PayloadKind::parse(name).expect("known payload kind")
}
