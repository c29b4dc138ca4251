//! vitline wire format — the strings embedded in, and read back from, a QR code.
//!
//! There are exactly two shapes on the wire:
//!
//!   single frame:  <compressed payload>            (or, legacy, raw JSON)
//!   chunk frame:   VIT^<transfer_id>^<index>^<total>^<fragment>
//!
//! The compressed alphabet is base64, so `^` never occurs inside a
//! compressed string and the prefix can never be mistaken for payload.
//! Changing the prefix or the field order breaks every printed code.

use std::fmt;

use rand::Rng;

// ── Constants ────────────────────────────────────────────────────────────────

/// Literal that marks a chunk frame. Includes the first separator.
pub const CHUNK_PREFIX: &str = "VIT^";

/// Field separator inside a chunk frame header.
pub const SEPARATOR: char = '^';

/// Length of a freshly minted transfer identifier.
pub const TRANSFER_ID_LEN: usize = 4;

/// Largest frame count a transfer may declare. Headers above it are not
/// chunk frames.
pub const MAX_FRAMES: usize = 1024;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Draw `len` random lowercase base36 characters.
pub fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

// ── Transfer ID ──────────────────────────────────────────────────────────────

/// Short random token that scopes the frames of one multi-frame payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(String);

impl TransferId {
    /// Mint a new random transfer identifier.
    pub fn generate() -> Self {
        Self(random_base36(TRANSFER_ID_LEN))
    }

    /// Wrap an existing token. Returns None if it is empty or contains
    /// anything other than ASCII alphanumerics.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Chunk Frame ──────────────────────────────────────────────────────────────

/// One fragment of an oversized compressed payload.
///
/// For a given transfer, `total` is fixed and `index` ranges over
/// `0..total`. Concatenating every fragment in index order yields the
/// compressed payload byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFrame {
    pub transfer_id: TransferId,
    pub index: usize,
    pub total: usize,
    pub fragment: String,
}

impl ChunkFrame {
    /// Render the frame as the string placed in a QR code.
    pub fn encode(&self) -> String {
        format!(
            "{CHUNK_PREFIX}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
            self.transfer_id, self.index, self.total, self.fragment
        )
    }

    /// Parse a scanned string as a chunk frame.
    ///
    /// Everything after the third separator is the fragment, kept verbatim
    /// even if it contains further separators. Returns None when the
    /// prefix is absent or any header field is malformed.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(CHUNK_PREFIX)?;
        let mut fields = rest.splitn(4, SEPARATOR);

        let transfer_id = TransferId::new(fields.next()?)?;
        let index = parse_decimal(fields.next()?)?;
        let total = parse_decimal(fields.next()?)?;
        let fragment = fields.next()?.to_string();

        if total == 0 || total > MAX_FRAMES || index >= total {
            return None;
        }

        Some(Self {
            transfer_id,
            index,
            total,
            fragment,
        })
    }
}

/// Strict decimal: digits only, no sign, no whitespace.
fn parse_decimal(field: &str) -> Option<usize> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
