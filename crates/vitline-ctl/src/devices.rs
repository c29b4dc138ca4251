//! Terminal stand-ins for the display and camera.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use vitline_services::{Camera, Canvas, FrameCapture};

// ── Canvas ────────────────────────────────────────────────────────────────────

/// Prints each frame on its own line, prefixed with its position.
#[derive(Default)]
pub struct TerminalCanvas {
    current: Option<String>,
    drawn: usize,
}

impl Canvas for TerminalCanvas {
    fn draw(&mut self, frame: &str) -> Result<()> {
        self.drawn += 1;
        println!("[{:>4}] {}", self.drawn, frame);
        self.current = Some(frame.to_string());
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        self.current
            .as_ref()
            .map(|f| f.clone().into_bytes())
            .context("nothing has been drawn yet")
    }
}

// ── Capture ───────────────────────────────────────────────────────────────────

/// Records drawn frames into a plain-text reel, one frame per line.
#[derive(Default)]
pub struct ReelCapture {
    fps: Option<u32>,
    frames: Vec<String>,
}

impl Canvas for ReelCapture {
    fn draw(&mut self, frame: &str) -> Result<()> {
        if self.fps.is_none() {
            anyhow::bail!("capture has not been started");
        }
        self.frames.push(frame.to_string());
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        self.frames
            .last()
            .map(|f| f.clone().into_bytes())
            .context("nothing has been drawn yet")
    }
}

impl FrameCapture for ReelCapture {
    fn is_supported(&self) -> bool {
        true
    }

    fn begin(&mut self, fps: u32) -> Result<()> {
        self.fps = Some(fps);
        self.frames.clear();
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let fps = self.fps.take().context("capture was never started")?;
        let mut reel = format!("# vitline reel fps={} frames={}\n", fps, self.frames.len());
        for frame in self.frames.drain(..) {
            reel.push_str(&frame);
            reel.push('\n');
        }
        Ok(reel.into_bytes())
    }
}

// ── Camera ────────────────────────────────────────────────────────────────────

/// Treats each non-empty stdin line as one decoded camera string.
pub struct StdinCamera {
    lines: Option<Lines<BufReader<Stdin>>>,
}

impl StdinCamera {
    pub fn new() -> Self {
        Self { lines: None }
    }
}

#[async_trait]
impl Camera for StdinCamera {
    async fn start(&mut self, fps: u32) -> Result<()> {
        tracing::debug!(fps, "reading camera strings from stdin");
        self.lines = Some(BufReader::new(tokio::io::stdin()).lines());
        Ok(())
    }

    async fn next_decoded(&mut self) -> Option<String> {
        let lines = self.lines.as_mut()?;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        return Some(line.to_string());
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    return None;
                }
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        self.lines = None;
        Ok(())
    }

    fn clear(&mut self) {}
}
