//! Ben-Or asynchronous randomized binary consensus
//!
//! Each peer runs its own [`ConsensusEngine`]. A round has two phases:
//! peers broadcast a proposal, and once `N - F` distinct proposals are in,
//! vote for the value proposed by more than `N / 2` peers (or `Unknown`).
//! Once `N - F` votes are in, a value voted by more than `F` peers is
//! decided; otherwise the peer carries the best supported value, or a coin
//! flip, into the next round.
//!
//! ## Structure
//! - `types.rs` - values, phases, messages and peer snapshots
//! - `ledger.rs` - per-round tallies with sender deduplication
//! - `fault.rs` - static faulty/live gate
//! - `traits.rs` - broadcast and coin seams
//! - `engine.rs` - the state machine
//! - `simulation.rs` - in-process network for experiments and tests
//! - `tests.rs` - Unit tests

pub use engine::ConsensusEngine;
pub use fault::{FaultGate, Health};
pub use ledger::{RoundLedger, Tally};
pub use traits::{BroadcastPort, CoinSource, FixedCoin, RandomCoin, SeededCoin};
pub use types::{Message, MessageOutcome, Phase, PeerState, Value};

pub mod simulation;


mod engine;
mod fault;
mod ledger;
mod traits;
mod types;
