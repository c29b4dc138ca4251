//! Receive path — camera lease, classification loop, replay gate.
//!
//! One scan session:
//!   1. reset the reassembly buffer
//!   2. start the camera, racing the shutdown signal
//!   3. fold decoded strings until an envelope completes, shutdown fires,
//!      or the camera stream ends
//!   4. stop the camera (only if it started, at most once) and clear it
//!   5. present the envelope's nonce to the replay guard

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use vitline_core::config::ScannerConfig;
use vitline_core::wire::TransferId;
use vitline_core::Envelope;

use crate::classify::{classify, Classified};
use crate::error::TransferError;
use crate::reassembly::{Fold, ReassemblyBuffer};
use crate::replay::ReplayGuard;

/// Source of decoded camera strings.
#[async_trait]
pub trait Camera: Send {
    /// Acquire the device. May fail on permission or availability.
    async fn start(&mut self, fps: u32) -> anyhow::Result<()>;

    /// Next string decoded from the stream. `None` once the stream ends.
    async fn next_decoded(&mut self) -> Option<String>;

    /// Release the device.
    async fn stop(&mut self) -> anyhow::Result<()>;

    /// Drop any rendering or decode state held by the camera view.
    fn clear(&mut self);
}

/// UI feedback published while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Progress {
        transfer_id: TransferId,
        received: usize,
        total: usize,
    },
    AssemblyFailed {
        transfer_id: TransferId,
    },
    /// A camera string that was not part of any transfer.
    Noise,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// An envelope arrived and passed the replay guard.
    Received(Envelope),
    /// Shutdown fired before anything arrived.
    Cancelled,
    /// The camera ran out of frames.
    StreamEnded,
}

/// Camera handle with idempotent teardown.
struct CameraLease<'a, C: Camera + ?Sized> {
    camera: &'a mut C,
    started: bool,
    stopped: bool,
}

impl<'a, C: Camera + ?Sized> CameraLease<'a, C> {
    fn new(camera: &'a mut C) -> Self {
        Self {
            camera,
            started: false,
            stopped: false,
        }
    }

    async fn release(&mut self) {
        if self.started && !self.stopped {
            self.stopped = true;
            if let Err(e) = self.camera.stop().await {
                tracing::warn!(error = %e, "camera stop failed");
            }
        }
        self.camera.clear();
    }
}

enum StartResult {
    Ready(anyhow::Result<()>),
    Cancelled,
}

/// Receive-side façade over classifier, reassembly buffer and replay guard.
pub struct Scanner {
    buffer: ReassemblyBuffer,
    guard: ReplayGuard,
    fps: u32,
    events: Option<mpsc::UnboundedSender<ScanEvent>>,
}

impl Scanner {
    pub fn new(guard: ReplayGuard, config: &ScannerConfig) -> Self {
        Self {
            buffer: ReassemblyBuffer::with_timeout(config.assembly_timeout()),
            guard,
            fps: config.fps,
            events: None,
        }
    }

    /// Publish progress on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<ScanEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn guard(&self) -> &ReplayGuard {
        &self.guard
    }

    pub fn buffer(&self) -> &ReassemblyBuffer {
        &self.buffer
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Fold one camera string. Returns an envelope once one is complete.
    ///
    /// Never consults the replay guard; [`Scanner::run`] does that after
    /// the camera is released.
    pub fn feed(&mut self, text: &str) -> Option<Envelope> {
        match classify(text) {
            Classified::Chunk(frame) => {
                let transfer_id = frame.transfer_id.clone();
                match self.buffer.accept(frame) {
                    Fold::Stored { received, total } | Fold::Duplicate { received, total } => {
                        self.emit(ScanEvent::Progress {
                            transfer_id,
                            received,
                            total,
                        });
                        None
                    }
                    Fold::Mismatched { .. } | Fold::Invalid => {
                        self.emit(ScanEvent::Noise);
                        None
                    }
                    Fold::Complete(value) => self.to_envelope(value),
                    Fold::Failed => {
                        self.emit(ScanEvent::AssemblyFailed { transfer_id });
                        None
                    }
                }
            }
            Classified::Complete(value) => self.to_envelope(value),
            Classified::Noise => {
                tracing::trace!(len = text.len(), "camera noise dropped");
                self.emit(ScanEvent::Noise);
                None
            }
        }
    }

    fn to_envelope(&self, value: Value) -> Option<Envelope> {
        match Envelope::from_value(value) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::debug!(error = %e, "decoded value is not an envelope, ignoring");
                self.emit(ScanEvent::Noise);
                None
            }
        }
    }

    /// Run one scan session against `camera`.
    ///
    /// Tear a running scan down by sending on `shutdown`. Dropping the
    /// returned future instead skips the release step, leaving a started
    /// camera running.
    pub async fn run<C: Camera + ?Sized>(
        &mut self,
        camera: &mut C,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<ScanOutcome, TransferError> {
        self.buffer.clear();
        let mut lease = CameraLease::new(camera);

        let start = tokio::select! {
            result = lease.camera.start(self.fps) => StartResult::Ready(result),
            _ = shutdown.recv() => StartResult::Cancelled,
        };
        match start {
            StartResult::Cancelled => {
                tracing::info!("scan cancelled before camera started");
                lease.release().await;
                return Ok(ScanOutcome::Cancelled);
            }
            StartResult::Ready(Err(e)) => {
                tracing::warn!(error = %e, "camera failed to start");
                lease.release().await;
                return Err(TransferError::CameraStart(e));
            }
            StartResult::Ready(Ok(())) => {
                lease.started = true;
                tracing::info!(fps = self.fps, "scan started");
            }
        }

        let outcome = loop {
            tokio::select! {
                _ = shutdown.recv() => break ScanOutcome::Cancelled,

                next = lease.camera.next_decoded() => match next {
                    None => break ScanOutcome::StreamEnded,
                    Some(text) => {
                        if let Some(envelope) = self.feed(&text) {
                            break ScanOutcome::Received(envelope);
                        }
                    }
                },
            }
        };

        lease.release().await;

        if let ScanOutcome::Received(envelope) = &outcome {
            self.guard.admit(envelope)?;
            tracing::info!(kind = %envelope.kind, "envelope accepted");
        } else {
            tracing::info!(outcome = ?outcome, "scan ended without a payload");
        }
        Ok(outcome)
    }
}
