//! Ben-Or asynchronous randomized binary consensus over HTTP peers.

pub mod cluster;
pub mod config;
pub mod consensus;
pub mod error;
pub mod logger;
pub mod network;

pub use config::{AddressBook, NetworkSettings, PeerConfig, StopPolicy};
pub use consensus::{ConsensusEngine, Message, Phase, PeerState, Value};
