//! Frame rotation on the sending device.
//!
//! The scheduler is pure bookkeeping (tick → advance modulo total); the
//! display surface is an injected [`Canvas`], so rotation is testable
//! without a screen.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use vitline_core::config::DisplayConfig;
use vitline_core::PayloadKind;

/// Display surface a frame is rendered onto.
pub trait Canvas {
    /// Render one frame string as a visual code, replacing what was shown.
    fn draw(&mut self, frame: &str) -> Result<()>;

    /// Encoded still image of whatever is currently drawn.
    fn snapshot(&self) -> Result<Vec<u8>>;
}

/// Still image of the frame on screen.
#[derive(Debug, Clone)]
pub struct StillImage {
    pub file_name: String,
    /// 0-based index of the exported frame.
    pub index: usize,
    pub total: usize,
    pub data: Vec<u8>,
}

/// Ordered frames plus the index currently on screen.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    frames: Vec<String>,
    current: usize,
    interval: Duration,
}

impl FrameScheduler {
    pub fn new(frames: Vec<String>, display: &DisplayConfig) -> Self {
        let interval = display.rotation_interval(frames.len());
        Self {
            frames,
            current: 0,
            interval,
        }
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn total(&self) -> usize {
        self.frames.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&str> {
        self.frames.get(self.current).map(String::as_str)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the display needs a timer at all.
    pub fn rotates(&self) -> bool {
        self.frames.len() > 1
    }

    /// Advance to the next frame, wrapping at the end. Returns the new index.
    pub fn tick(&mut self) -> usize {
        if !self.frames.is_empty() {
            self.current = (self.current + 1) % self.frames.len();
        }
        self.current
    }

    /// Draw the current frame.
    pub fn render<C: Canvas + ?Sized>(&self, canvas: &mut C) -> Result<()> {
        if let Some(frame) = self.current() {
            canvas
                .draw(frame)
                .with_context(|| format!("failed to draw frame {}", self.current + 1))?;
        }
        Ok(())
    }

    /// Export the frame currently on screen as a still image.
    pub fn export_still<C: Canvas + ?Sized>(&self, canvas: &C, kind: PayloadKind) -> Result<StillImage> {
        let data = canvas.snapshot().context("failed to snapshot canvas")?;
        Ok(StillImage {
            file_name: format!("qr_code_{}_part{}.png", kind, self.current + 1),
            index: self.current,
            total: self.total(),
            data,
        })
    }

    /// Rotate frames on `canvas` until shutdown.
    ///
    /// A single frame is drawn once and left on screen.
    pub async fn run<C: Canvas + ?Sized>(
        &mut self,
        canvas: &mut C,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        self.render(canvas)?;
        tracing::info!(
            frames = self.total(),
            interval_ms = self.interval.as_millis() as u64,
            "frame display started"
        );

        if !self.rotates() {
            let _ = shutdown.recv().await;
            tracing::info!("frame display shutting down");
            return Ok(());
        }

        let mut interval = tokio::time::interval(self.interval);
        // First tick completes immediately; the first frame is already drawn.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("frame display shutting down");
                    return Ok(());
                }

                _ = interval.tick() => {
                    let index = self.tick();
                    tracing::trace!(index, total = self.total(), "frame advanced");
                    self.render(canvas)?;
                }
            }
        }
    }
}
