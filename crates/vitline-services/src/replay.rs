//! Replay protection — one-time redemption of scanned codes.
//!
//! Every envelope minted by the encoder carries a nonce. The first scan
//! that presents a nonce consumes it; every later scan of the same code is
//! rejected. The consumed set is append-only: nothing ever removes a nonce.
//!
//! Envelopes without a nonce predate one-time codes and are always
//! accepted.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;

use vitline_core::Envelope;

use crate::error::TransferError;

/// Outcome of presenting a nonce to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayVerdict {
    /// First sighting; the nonce is now consumed.
    Accepted,
    /// Already consumed by an earlier scan.
    Rejected,
}

/// Set of consumed nonces.
///
/// When constructed with a `persist_path`, the set is written to disk
/// on every insertion and reloaded on construction, so a code redeemed
/// before a restart stays redeemed.
#[derive(Clone)]
pub struct ReplayGuard {
    /// nonce -> unix millis when it was consumed
    consumed: Arc<DashMap<String, u64>>,
    persist_path: Arc<Option<PathBuf>>,
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayGuard {
    /// In-memory guard. Consumed nonces are forgotten when it is dropped.
    pub fn new() -> Self {
        Self {
            consumed: Arc::new(DashMap::new()),
            persist_path: Arc::new(None),
        }
    }

    /// Create a guard that persists consumed nonces to the given file.
    /// Loads existing nonces from disk if the file exists.
    pub fn with_persistence(path: PathBuf) -> Self {
        let guard = Self {
            consumed: Arc::new(DashMap::new()),
            persist_path: Arc::new(Some(path)),
        };
        guard.load_from_disk();
        guard
    }

    /// Present a nonce. Accepts and consumes it on first sight.
    pub fn check(&self, nonce: &str) -> ReplayVerdict {
        let verdict = match self.consumed.entry(nonce.to_string()) {
            Entry::Occupied(_) => ReplayVerdict::Rejected,
            Entry::Vacant(slot) => {
                slot.insert(now_millis());
                ReplayVerdict::Accepted
            }
        };

        // Shard lock is released here; persisting iterates the whole map.
        match verdict {
            ReplayVerdict::Accepted => {
                tracing::info!(nonce, "nonce consumed");
                self.save_to_disk();
            }
            ReplayVerdict::Rejected => {
                tracing::warn!(nonce, "code already redeemed, rejecting");
            }
        }
        verdict
    }

    /// Gate an envelope before the host applies it.
    pub fn admit(&self, envelope: &Envelope) -> Result<(), TransferError> {
        let Some(nonce) = envelope.nonce.as_ref() else {
            tracing::debug!(kind = %envelope.kind, "envelope has no nonce, replay check skipped");
            return Ok(());
        };
        match self.check(nonce.as_str()) {
            ReplayVerdict::Accepted => Ok(()),
            ReplayVerdict::Rejected => Err(TransferError::ReplayRejected {
                nonce: nonce.to_string(),
            }),
        }
    }

    /// Has this nonce been consumed?
    pub fn contains(&self, nonce: &str) -> bool {
        self.consumed.contains_key(nonce)
    }

    /// Number of consumed nonces.
    pub fn len(&self) -> usize {
        self.consumed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl ReplayGuard {
    /// Serialize the consumed set to disk as a sorted JSON array.
    /// Best-effort; logs on failure.
    fn save_to_disk(&self) {
        let path = match self.persist_path.as_ref() {
            Some(p) => p,
            None => return,
        };
        let mut snapshot: Vec<String> = self.consumed.iter().map(|e| e.key().clone()).collect();
        snapshot.sort();

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %e, path = %parent.display(), "failed to create nonce store dir");
                return;
            }
        }
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    let err = TransferError::Persist(path.clone(), e);
                    tracing::warn!(error = %err, "failed to persist consumed nonces");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize consumed nonces");
            }
        }
    }

    /// Load nonces from disk. Called once during construction.
    fn load_from_disk(&self) {
        let path = match self.persist_path.as_ref() {
            Some(p) => p,
            None => return,
        };
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to read consumed nonces");
                return;
            }
        };
        let nonces: Vec<String> = match serde_json::from_str(&text) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to parse consumed nonces");
                return;
            }
        };
        let loaded = nonces.len();
        for nonce in nonces {
            self.consumed.insert(nonce, 0);
        }
        if loaded > 0 {
            tracing::info!(count = loaded, path = %path.display(), "loaded consumed nonces");
        }
    }
}
