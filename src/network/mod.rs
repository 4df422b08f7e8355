//! Peer-to-peer HTTP surface
//!
//! - `server.rs` - routes each peer exposes
//! - `client.rs` - outbound calls, including the broadcast transport
//! - `validator.rs` - inbound message checks
//! - `readiness.rs` - startup barrier

pub mod client;
pub mod readiness;
pub mod server;
pub mod validator;

pub use client::HttpBroadcaster;
pub use readiness::{Readiness, ReadinessTracker};
pub use server::{configure, start_server, PeerEndpoint};

use crate::consensus::{PeerState, Value};
use serde::{Deserialize, Serialize};

/// Wire form of a peer snapshot returned by `/getState`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateReport {
    pub killed: bool,
    pub x: Option<Value>,
    pub decided: Option<bool>,
    pub k: Option<u64>,
}

impl From<PeerState> for StateReport {
    fn from(state: PeerState) -> Self {
        StateReport {
            killed: !state.alive,
            x: state.value,
            decided: state.decided,
            k: state.round,
        }
    }
}
