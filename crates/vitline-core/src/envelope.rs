//! Envelope schema — what a decoded code hands to the host application.
//!
//! The protocol never interprets `payload`; the host switches on `kind`
//! and mutates its own state.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::wire::random_base36;

/// Payload type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Domain,
    Inventory,
    Item,
    Ability,
    Xp,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Inventory => "inventory",
            Self::Item => "item",
            Self::Ability => "ability",
            Self::Xp => "xp",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "domain" => Some(Self::Domain),
            "inventory" => Some(Self::Inventory),
            "item" => Some(Self::Item),
            "ability" => Some(Self::Ability),
            "xp" => Some(Self::Xp),
            _ => None,
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the sender does once the receiver has the goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    DeleteItem,
    ClearInventory,
}

/// Sender-side follow-up carried alongside the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
    /// Host identifier of the affected item. Stripped on the wire like
    /// every other `id`, so receivers see None.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Number>,

    #[serde(rename = "actionType")]
    pub action_type: ActionType,
}

// ── Nonce ─────────────────────────────────────────────────────────────────────

/// One-time identifier stamped on every encode call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// Mint `<unix millis>-<7 random base36 chars>`.
    pub fn mint() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self(format!("{}-{}", millis, random_base36(7)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Nonce {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Complete transferable unit: `{type, payload, uniqueId?, actionContext?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: PayloadKind,

    pub payload: Value,

    /// Absent on envelopes that predate one-time codes; those bypass
    /// replay protection.
    #[serde(rename = "uniqueId", default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Nonce>,

    #[serde(
        rename = "actionContext",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub action_context: Option<ActionContext>,
}

impl Envelope {
    pub fn new(kind: PayloadKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            nonce: None,
            action_context: None,
        }
    }

    pub fn with_action(mut self, action: ActionContext) -> Self {
        self.action_context = Some(action);
        self
    }

    /// Copy of this envelope carrying a freshly minted nonce.
    pub fn stamped(&self) -> Self {
        Self {
            nonce: Some(Nonce::mint()),
            ..self.clone()
        }
    }

    /// Interpret a decoded JSON value as an envelope.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
