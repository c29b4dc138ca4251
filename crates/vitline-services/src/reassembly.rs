//! Chunk reassembly — per-transfer slot tables and completion detection.
//!
//! Each transfer moves absent → collecting → (complete | failed). Complete
//! and failed transfers are evicted immediately, so a later frame with the
//! same transfer id opens a brand-new session instead of resuming.
//!
//! The buffer is folded one camera string at a time by a single scan loop,
//! so it is a plain `&mut` structure with no internal locking.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use vitline_core::wire::{ChunkFrame, TransferId, MAX_FRAMES};

use crate::codec;

/// Slots for one in-flight transfer.
#[derive(Debug, Clone)]
pub struct ReassemblyState {
    total: usize,
    slots: Vec<Option<String>>,
    received: usize,
    started_at: Instant,
}

impl ReassemblyState {
    fn new(total: usize) -> Self {
        Self {
            total,
            slots: vec![None; total],
            received: 0,
            started_at: Instant::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn slot(&self, index: usize) -> Option<&str> {
        self.slots.get(index).and_then(|s| s.as_deref())
    }

    pub fn missing(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.total
    }

    /// Fill an empty slot. Returns false if it was already filled.
    fn fill(&mut self, index: usize, fragment: String) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(fragment);
                self.received += 1;
                true
            }
            _ => false,
        }
    }

    fn joined(&self) -> String {
        self.slots.iter().flatten().map(String::as_str).collect()
    }
}

/// Result of folding one chunk frame into the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Fold {
    /// New fragment stored; transfer still collecting.
    Stored { received: usize, total: usize },
    /// Slot already filled; nothing changed.
    Duplicate { received: usize, total: usize },
    /// Header disagrees with the session's fixed total; nothing changed.
    Mismatched { expected_total: usize },
    /// Header outside `0 <= index < total <= MAX_FRAMES`; nothing changed.
    Invalid,
    /// Last fragment arrived and the joined text decoded.
    Complete(Value),
    /// Last fragment arrived but the joined text did not decode.
    Failed,
}

/// All in-flight transfers seen by one scan session.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    active: HashMap<TransferId, ReassemblyState>,
    timeout: Option<Duration>,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer that drops transfers older than `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            active: HashMap::new(),
            timeout,
        }
    }

    /// Fold one chunk frame into its transfer.
    pub fn accept(&mut self, frame: ChunkFrame) -> Fold {
        self.cleanup_stale();

        let ChunkFrame {
            transfer_id,
            index,
            total,
            fragment,
        } = frame;

        if total == 0 || total > MAX_FRAMES || index >= total {
            tracing::trace!(transfer_id = %transfer_id, index, total, "frame header out of range, dropping");
            return Fold::Invalid;
        }

        let state = self
            .active
            .entry(transfer_id.clone())
            .or_insert_with(|| {
                tracing::info!(transfer_id = %transfer_id, total, "transfer started");
                ReassemblyState::new(total)
            });

        if state.total != total {
            tracing::debug!(
                transfer_id = %transfer_id,
                expected = state.total,
                got = total,
                "frame total disagrees with transfer, dropping"
            );
            return Fold::Mismatched {
                expected_total: state.total,
            };
        }

        if !state.fill(index, fragment) {
            tracing::trace!(transfer_id = %transfer_id, index, "duplicate fragment");
            return Fold::Duplicate {
                received: state.received,
                total: state.total,
            };
        }

        if !state.is_complete() {
            return Fold::Stored {
                received: state.received,
                total: state.total,
            };
        }

        let joined = state.joined();
        self.active.remove(&transfer_id);

        match codec::decode_value(&joined) {
            Some(value) => {
                tracing::info!(transfer_id = %transfer_id, total, bytes = joined.len(), "transfer reassembled");
                Fold::Complete(value)
            }
            None => {
                tracing::warn!(transfer_id = %transfer_id, total, "reassembled transfer failed to decode");
                Fold::Failed
            }
        }
    }

    /// `(received, total)` for an in-flight transfer.
    pub fn progress(&self, transfer_id: &TransferId) -> Option<(usize, usize)> {
        self.active
            .get(transfer_id)
            .map(|s| (s.received, s.total))
    }

    pub fn get(&self, transfer_id: &TransferId) -> Option<&ReassemblyState> {
        self.active.get(transfer_id)
    }

    /// Transfers currently collecting.
    pub fn in_progress(&self) -> Vec<TransferId> {
        self.active.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Drop every partial transfer.
    pub fn clear(&mut self) {
        self.active.clear();
    }

    fn cleanup_stale(&mut self) {
        let Some(timeout) = self.timeout else {
            return;
        };
        self.active.retain(|transfer_id, state| {
            let stale = state.started_at.elapsed() > timeout;
            if stale {
                tracing::warn!(
                    transfer_id = %transfer_id,
                    received = state.received,
                    total = state.total,
                    "removing stale transfer (timed out)"
                );
            }
            !stale
        });
    }
}
