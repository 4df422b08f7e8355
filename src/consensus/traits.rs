//! Seams between the consensus engine and its collaborators

use crate::consensus::types::Message;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Emits a message to all N peers, the sender included.
///
/// Best-effort and fire-and-forget: implementations initiate delivery and
/// return immediately. The engine calls this while holding its state guard,
/// so it must never block on delivery.
pub trait BroadcastPort: Send + Sync {
    fn broadcast(&self, message: Message);
}

/// Source of the random bit used when a round ends with no concrete support.
pub trait CoinSource: Send + Sync {
    fn flip(&self) -> bool;
}

/// Uniform coin backed by the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCoin;

impl CoinSource for RandomCoin {
    fn flip(&self) -> bool {
        rand::thread_rng().gen_bool(0.5)
    }
}

/// Reproducible coin for simulations and tests
pub struct SeededCoin {
    rng: Mutex<StdRng>,
}

impl SeededCoin {
    pub fn new(seed: u64) -> Self {
        SeededCoin {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl CoinSource for SeededCoin {
    fn flip(&self) -> bool {
        self.rng.lock().gen_bool(0.5)
    }
}

/// Coin that always lands on the same side
#[derive(Debug, Clone, Copy)]
pub struct FixedCoin(pub bool);

impl CoinSource for FixedCoin {
    fn flip(&self) -> bool {
        self.0
    }
}
