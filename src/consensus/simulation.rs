//! In-process network of engines with randomized delivery order
//!
//! Every broadcast lands in one shared queue; delivery picks queued messages
//! at random from a seeded RNG, so a run is reproducible from its seed while
//! still exercising arbitrary interleavings.

use crate::config::PeerConfig;
use crate::consensus::engine::ConsensusEngine;
use crate::consensus::traits::{BroadcastPort, CoinSource, SeededCoin};
use crate::consensus::types::{Message, MessageOutcome, PeerState, Value};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::debug;

/// A message addressed to one peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub to: usize,
    pub message: Message,
}

type Queue = Arc<Mutex<Vec<Envelope>>>;

/// Broadcast port that enqueues one envelope per peer
pub struct QueueBroadcaster {
    total_nodes: usize,
    queue: Queue,
}

impl BroadcastPort for QueueBroadcaster {
    fn broadcast(&self, message: Message) {
        let mut queue = self.queue.lock();
        queue.extend((0..self.total_nodes).map(|to| Envelope { to, message }));
    }
}

/// Outcome of a simulation run
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub states: Vec<PeerState>,
    pub delivered: usize,
    pub undelivered: usize,
    faulty: Vec<bool>,
}

impl SimulationReport {
    /// Values decided by non-faulty peers, in peer order
    pub fn decisions(&self) -> Vec<Value> {
        self.honest_states()
            .filter(|s| s.is_decided())
            .filter_map(|s| s.value)
            .collect()
    }

    pub fn all_decided(&self) -> bool {
        self.honest_states().all(|s| s.is_decided())
    }

    /// The common decision, if every decided peer agrees and at least one
    /// decided.
    pub fn agreed_value(&self) -> Option<Value> {
        let decisions = self.decisions();
        let first = *decisions.first()?;
        decisions.iter().all(|v| *v == first).then_some(first)
    }

    /// No two non-faulty peers decided differently.
    pub fn is_safe(&self) -> bool {
        let decisions = self.decisions();
        decisions.windows(2).all(|w| w[0] == w[1])
    }

    pub fn max_round(&self) -> Option<u64> {
        self.honest_states().filter_map(|s| s.round).max()
    }

    fn honest_states(&self) -> impl Iterator<Item = &PeerState> {
        self.states
            .iter()
            .zip(self.faulty.iter())
            .filter(|(_, faulty)| !**faulty)
            .map(|(state, _)| state)
    }
}

pub struct InMemoryNetwork {
    engines: Vec<Arc<ConsensusEngine>>,
    queue: Queue,
    rng: StdRng,
    delivered: usize,
}

impl InMemoryNetwork {
    /// Engines get independent seeded coins derived from `seed`.
    pub fn new(configs: Vec<PeerConfig>, seed: u64) -> Self {
        Self::with_coins(configs, seed, |node_id| {
            Arc::new(SeededCoin::new(seed.wrapping_mul(31).wrapping_add(node_id as u64)))
        })
    }

    pub fn with_coins<C>(configs: Vec<PeerConfig>, seed: u64, coin_for: C) -> Self
    where
        C: Fn(usize) -> Arc<dyn CoinSource>,
    {
        let queue: Queue = Arc::new(Mutex::new(Vec::new()));
        let engines = configs
            .into_iter()
            .map(|config| {
                let broadcaster = Arc::new(QueueBroadcaster {
                    total_nodes: config.total_nodes,
                    queue: queue.clone(),
                });
                let coin = coin_for(config.node_id);
                Arc::new(ConsensusEngine::new(config, broadcaster, coin))
            })
            .collect();

        InMemoryNetwork {
            engines,
            queue,
            rng: StdRng::seed_from_u64(seed),
            delivered: 0,
        }
    }

    pub fn engine(&self, node_id: usize) -> &ConsensusEngine {
        &self.engines[node_id]
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn start_all(&self) {
        for engine in &self.engines {
            engine.start();
        }
    }

    pub fn stop_all(&self) {
        for engine in &self.engines {
            engine.stop();
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Copy of the queued envelopes
    pub fn queued(&self) -> Vec<Envelope> {
        self.queue.lock().clone()
    }

    /// Removes queued envelopes matching `filter`, returning how many.
    pub fn drop_where<F>(&self, filter: F) -> usize
    where
        F: Fn(&Envelope) -> bool,
    {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|e| !filter(e));
        before - queue.len()
    }

    /// Delivers one random queued envelope.
    pub fn deliver_next(&mut self) -> Option<(Envelope, MessageOutcome)> {
        self.deliver_matching(&|_: &Envelope| true)
    }

    /// Delivers random envelopes matching `filter` until none are queued,
    /// including ones broadcast during delivery. Returns the number
    /// delivered.
    pub fn deliver_where<F>(&mut self, filter: F) -> usize
    where
        F: Fn(&Envelope) -> bool,
    {
        let mut count = 0;
        while self.deliver_matching(&filter).is_some() {
            count += 1;
        }
        count
    }

    /// Delivers until the queue drains, every non-faulty peer decided, or
    /// `max_deliveries` is hit.
    pub fn run(&mut self, max_deliveries: usize) -> SimulationReport {
        for _ in 0..max_deliveries {
            if self.honest_decided() || self.deliver_next().is_none() {
                break;
            }
        }
        self.report()
    }

    pub fn states(&self) -> Vec<PeerState> {
        self.engines.iter().map(|e| e.state()).collect()
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            states: self.states(),
            delivered: self.delivered,
            undelivered: self.pending(),
            faulty: self.engines.iter().map(|e| e.config().is_faulty).collect(),
        }
    }

    fn honest_decided(&self) -> bool {
        self.engines
            .iter()
            .filter(|e| !e.config().is_faulty)
            .all(|e| e.state().is_decided())
    }

    fn deliver_matching<F>(&mut self, filter: &F) -> Option<(Envelope, MessageOutcome)>
    where
        F: Fn(&Envelope) -> bool,
    {
        let envelope = {
            let mut queue = self.queue.lock();
            let candidates: Vec<usize> = queue
                .iter()
                .enumerate()
                .filter(|(_, e)| filter(e))
                .map(|(i, _)| i)
                .collect();
            if candidates.is_empty() {
                return None;
            }
            let pick = candidates[self.rng.gen_range(0..candidates.len())];
            queue.swap_remove(pick)
        };

        let engine = self.engines.get(envelope.to)?;
        let outcome = engine.handle_message(envelope.message);
        self.delivered += 1;
        debug!(
            to = envelope.to,
            sender_id = envelope.message.sender_id,
            round = envelope.message.round,
            ?outcome,
            "Simulated delivery"
        );
        Some((envelope, outcome))
    }
}
