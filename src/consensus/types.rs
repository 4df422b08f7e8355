//! Consensus types and data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value in the binary consensus domain.
///
/// On the wire `Zero` and `One` travel as the numbers `0` and `1`, `Unknown`
/// as the string `"?"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawValue", into = "RawValue")]
pub enum Value {
    Zero,
    One,
    /// No quorum value was observed this round. Never a final decision.
    Unknown,
}

impl Value {
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            Value::One
        } else {
            Value::Zero
        }
    }

    pub fn is_concrete(&self) -> bool {
        !matches!(self, Value::Unknown)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Zero => write!(f, "0"),
            Value::One => write!(f, "1"),
            Value::Unknown => write!(f, "?"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bit(u8),
    Marker(String),
}

impl TryFrom<RawValue> for Value {
    type Error = String;

    fn try_from(raw: RawValue) -> Result<Self, Self::Error> {
        match raw {
            RawValue::Bit(0) => Ok(Value::Zero),
            RawValue::Bit(1) => Ok(Value::One),
            RawValue::Marker(marker) if marker == "?" => Ok(Value::Unknown),
            RawValue::Bit(other) => Err(format!("{} is not a binary value", other)),
            RawValue::Marker(other) => Err(format!("{:?} is not a binary value", other)),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Zero => RawValue::Bit(0),
            Value::One => RawValue::Bit(1),
            Value::Unknown => RawValue::Marker("?".to_string()),
        }
    }
}

/// Sub-step of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Propose,
    Vote,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Propose => write!(f, "propose"),
            Phase::Vote => write!(f, "vote"),
        }
    }
}

/// Protocol message exchanged between peers.
///
/// Identity is `(round, phase, sender_id)`; a second message with the same
/// identity is a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "k")]
    pub round: u64,
    #[serde(rename = "x")]
    pub value: Value,
    #[serde(rename = "type")]
    pub phase: Phase,
    #[serde(rename = "senderId")]
    pub sender_id: usize,
}

impl Message {
    pub fn propose(round: u64, value: Value, sender_id: usize) -> Self {
        Message {
            round,
            value,
            phase: Phase::Propose,
            sender_id,
        }
    }

    pub fn vote(round: u64, value: Value, sender_id: usize) -> Self {
        Message {
            round,
            value,
            phase: Phase::Vote,
            sender_id,
        }
    }
}

/// Read-only snapshot of a peer.
///
/// `value`, `decided` and `round` are `None` while the peer is not running
/// and always `None` for a faulty peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerState {
    pub alive: bool,
    pub value: Option<Value>,
    pub decided: Option<bool>,
    pub round: Option<u64>,
    pub phase: Phase,
}

impl PeerState {
    /// State of a peer that has never been started.
    pub fn idle() -> Self {
        PeerState {
            alive: true,
            value: None,
            decided: None,
            round: None,
            phase: Phase::Propose,
        }
    }

    /// What external observers see of a faulty peer.
    pub fn opaque(alive: bool) -> Self {
        PeerState {
            alive,
            ..PeerState::idle()
        }
    }

    pub fn is_decided(&self) -> bool {
        self.decided == Some(true)
    }
}

impl Default for PeerState {
    fn default() -> Self {
        Self::idle()
    }
}

/// What `handle_message` did with a message. The caller is acked either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Peer stopped, faulty, already decided, or message below current round.
    Discarded,
    /// Sender already counted for this (round, phase).
    Duplicate,
    /// Counted, no transition fired.
    Recorded,
    /// Counted and at least one transition fired; the peer is still undecided.
    Progressed,
    /// Counted and the peer decided.
    Decided(Value),
}
