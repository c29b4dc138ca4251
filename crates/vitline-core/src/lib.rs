//! vitline-core — shared types, wire format, and configuration.
//! All other vitline crates depend on this one.

pub mod config;
pub mod envelope;
pub mod wire;

pub use envelope::{ActionContext, ActionType, Envelope, Nonce, PayloadKind};
pub use wire::{ChunkFrame, TransferId};
