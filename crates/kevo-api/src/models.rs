// Portal data types
//
// Lock snapshots from `lock.json`, the bolt-state enum shared with push
// messages, and the push message wrapper itself. Unknown fields are kept
// in `extra` so nothing the portal sends is silently dropped.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ── LockId ───────────────────────────────────────────────────────────

/// Opaque lock identifier.
///
/// The portal hands these out as either strings or numbers depending on
/// the endpoint, so both are accepted and normalized to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LockId(String);

impl LockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LockId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for LockId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for LockId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for LockId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

// ── BoltState ────────────────────────────────────────────────────────

/// Position of the lock bolt as reported by the portal.
///
/// Only `1` and `2` are documented; anything else is preserved verbatim
/// in [`Unknown`](Self::Unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum BoltState {
    Locked,
    Unlocked,
    Unknown(i64),
}

impl BoltState {
    pub fn is_locked(self) -> bool {
        self == Self::Locked
    }
}

impl From<i64> for BoltState {
    fn from(raw: i64) -> Self {
        match raw {
            1 => Self::Locked,
            2 => Self::Unlocked,
            other => Self::Unknown(other),
        }
    }
}

impl From<BoltState> for i64 {
    fn from(state: BoltState) -> Self {
        match state {
            BoltState::Locked => 1,
            BoltState::Unlocked => 2,
            BoltState::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for BoltState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => f.write_str("locked"),
            Self::Unlocked => f.write_str("unlocked"),
            Self::Unknown(raw) => write!(f, "unknown ({raw})"),
        }
    }
}

// ── LockDetails ──────────────────────────────────────────────────────

/// Point-in-time snapshot from `lock.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockDetails {
    pub id: LockId,

    /// Display name configured in the Kevo app.
    pub name: String,

    pub bolt_state: BoltState,

    #[serde(default)]
    pub brand: Option<String>,

    #[serde(default)]
    pub firmware_version: Option<String>,

    /// All remaining fields the portal sends.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LockDetails {
    pub fn is_locked(&self) -> bool {
        self.bolt_state.is_locked()
    }
}

// ── PushMessage ──────────────────────────────────────────────────────

/// A decoded push notification.
///
/// The payload is kept as received; observers that only care about the
/// bolt position use [`bolt_state`](Self::bolt_state).
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    payload: serde_json::Value,
}

impl PushMessage {
    pub fn new(payload: serde_json::Value) -> Self {
        Self { payload }
    }

    /// Decode a WebSocket text frame.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text).map(Self::new)
    }

    /// The decoded JSON payload, untouched.
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// `messageData.boltState`, if present and numeric.
    pub fn bolt_state(&self) -> Option<BoltState> {
        self.payload
            .get("messageData")?
            .get("boltState")?
            .as_i64()
            .map(BoltState::from)
    }
}
