//! Per-round, per-phase tallies with sender deduplication

use crate::consensus::types::{Message, Phase, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Result of recording a message in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Counted,
    Duplicate,
}

#[derive(Debug, Clone, Default)]
struct PhaseTally {
    senders: HashSet<usize>,
    counts: HashMap<Value, usize>,
}

impl PhaseTally {
    fn record(&mut self, sender_id: usize, value: Value) -> Tally {
        if !self.senders.insert(sender_id) {
            return Tally::Duplicate;
        }
        *self.counts.entry(value).or_insert(0) += 1;
        Tally::Counted
    }

    fn count_for(&self, value: Value) -> usize {
        self.counts.get(&value).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
struct RoundEntry {
    propose: PhaseTally,
    vote: PhaseTally,
}

impl RoundEntry {
    fn phase(&self, phase: Phase) -> &PhaseTally {
        match phase {
            Phase::Propose => &self.propose,
            Phase::Vote => &self.vote,
        }
    }

    fn phase_mut(&mut self, phase: Phase) -> &mut PhaseTally {
        match phase {
            Phase::Propose => &mut self.propose,
            Phase::Vote => &mut self.vote,
        }
    }
}

/// Message tallies keyed by round.
///
/// Entries are created on the first message for a round and removed with
/// [`RoundLedger::clear`] once the round's decision logic has fired. The
/// ledger has no locking of its own; the engine owns it behind its state
/// guard.
#[derive(Debug, Clone, Default)]
pub struct RoundLedger {
    rounds: BTreeMap<u64, RoundEntry>,
}

impl RoundLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `message` unless its sender was already counted for the same
    /// (round, phase).
    pub fn record(&mut self, message: &Message) -> Tally {
        self.rounds
            .entry(message.round)
            .or_default()
            .phase_mut(message.phase)
            .record(message.sender_id, message.value)
    }

    pub fn count_for(&self, round: u64, phase: Phase, value: Value) -> usize {
        self.rounds
            .get(&round)
            .map(|entry| entry.phase(phase).count_for(value))
            .unwrap_or(0)
    }

    pub fn distinct_sender_count(&self, round: u64, phase: Phase) -> usize {
        self.rounds
            .get(&round)
            .map(|entry| entry.phase(phase).senders.len())
            .unwrap_or(0)
    }

    pub fn has_sender(&self, round: u64, phase: Phase, sender_id: usize) -> bool {
        self.rounds
            .get(&round)
            .map(|entry| entry.phase(phase).senders.contains(&sender_id))
            .unwrap_or(false)
    }

    pub fn clear(&mut self, round: u64) {
        self.rounds.remove(&round);
    }

    /// Drops every round strictly below `round`.
    pub fn clear_below(&mut self, round: u64) {
        self.rounds = self.rounds.split_off(&round);
    }

    pub fn clear_all(&mut self) {
        self.rounds.clear();
    }

    /// Number of rounds currently holding tallies.
    pub fn tracked_rounds(&self) -> usize {
        self.rounds.len()
    }
}
