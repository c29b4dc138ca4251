//! vitline-services — the visual transfer protocol.
//!
//! Send path:    Envelope → sanitize → compress → chunk → FrameScheduler
//! Receive path: camera text → classify → ReassemblyBuffer → decode → ReplayGuard

pub mod chunker;
pub mod classify;
pub mod codec;
pub mod error;
pub mod export;
pub mod reassembly;
pub mod replay;
pub mod sanitize;
pub mod scanner;
pub mod scheduler;

pub use chunker::{split_into_frames, EncodeWarning, Encoded, Encoder};
pub use classify::{classify, Classified};
pub use error::TransferError;
pub use export::{ExportState, FrameCapture, VideoArtifact, VideoExporter};
pub use reassembly::{Fold, ReassemblyBuffer, ReassemblyState};
pub use replay::{ReplayGuard, ReplayVerdict};
pub use scanner::{Camera, ScanEvent, ScanOutcome, Scanner};
pub use scheduler::{Canvas, FrameScheduler, StillImage};
