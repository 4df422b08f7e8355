//! Ben-Or binary consensus state machine for a single peer

use crate::config::{PeerConfig, StopPolicy};
use crate::consensus::fault::{FaultGate, Health};
use crate::consensus::ledger::{RoundLedger, Tally};
use crate::consensus::traits::{BroadcastPort, CoinSource};
use crate::consensus::types::{Message, MessageOutcome, Phase, PeerState, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace};

#[derive(Debug)]
struct EngineState {
    state: PeerState,
    ledger: RoundLedger,
}

/// How a vote quorum resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoteResolution {
    Decide(Value),
    Advance(Value),
}

/// One peer's copy of the protocol.
///
/// Every state-changing call takes the same lock, so tallies and phase
/// transitions for a peer are applied one message at a time. Broadcasts are
/// issued under the lock; [`BroadcastPort`] only initiates delivery, and
/// issuing them there means nothing is broadcast once [`stop`] has returned.
///
/// [`stop`]: ConsensusEngine::stop
pub struct ConsensusEngine {
    config: PeerConfig,
    gate: FaultGate,
    inner: Mutex<EngineState>,
    broadcaster: Arc<dyn BroadcastPort>,
    coin: Arc<dyn CoinSource>,
}

impl ConsensusEngine {
    pub fn new(
        config: PeerConfig,
        broadcaster: Arc<dyn BroadcastPort>,
        coin: Arc<dyn CoinSource>,
    ) -> Self {
        ConsensusEngine {
            gate: FaultGate::new(config.is_faulty),
            config,
            inner: Mutex::new(EngineState {
                state: PeerState::idle(),
                ledger: RoundLedger::new(),
            }),
            broadcaster,
            coin,
        }
    }

    pub fn node_id(&self) -> usize {
        self.config.node_id
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn health(&self) -> Health {
        self.gate.health()
    }

    /// Starts a run from the configured initial value.
    pub fn start(&self) {
        self.start_with(self.config.initial_value)
    }

    /// Seeds the starting round with `initial_value` and broadcasts a
    /// proposal for it. A faulty peer only resets to its opaque state.
    pub fn start_with(&self, initial_value: Value) {
        let mut inner = self.inner.lock();

        if self.gate.is_faulty() {
            let alive = inner.state.alive;
            inner.state = PeerState::opaque(alive);
            info!(node_id = self.config.node_id, "Faulty peer ignoring start");
            return;
        }

        let round = self.config.starting_round;
        inner.state = PeerState {
            alive: true,
            value: Some(initial_value),
            decided: Some(false),
            round: Some(round),
            phase: Phase::Propose,
        };
        // Tallies that reached us before start are kept unless stale.
        inner.ledger.clear_below(round);

        info!(
            node_id = self.config.node_id,
            round,
            value = %initial_value,
            "Starting consensus"
        );
        self.broadcaster
            .broadcast(Message::propose(round, initial_value, self.config.node_id));

        self.advance(&mut inner);
    }

    /// Applies one inbound message. Never fails; the returned outcome only
    /// describes what happened.
    pub fn handle_message(&self, message: Message) -> MessageOutcome {
        let mut inner = self.inner.lock();

        if !self.gate.participates() || !inner.state.alive || inner.state.is_decided() {
            return MessageOutcome::Discarded;
        }
        if let Some(round) = inner.state.round {
            if message.round < round {
                trace!(
                    node_id = self.config.node_id,
                    round,
                    stale_round = message.round,
                    sender_id = message.sender_id,
                    "Dropping stale message"
                );
                return MessageOutcome::Discarded;
            }
        }

        if inner.ledger.record(&message) == Tally::Duplicate {
            trace!(
                node_id = self.config.node_id,
                round = message.round,
                phase = %message.phase,
                sender_id = message.sender_id,
                "Dropping duplicate message"
            );
            return MessageOutcome::Duplicate;
        }

        debug!(
            node_id = self.config.node_id,
            round = message.round,
            phase = %message.phase,
            sender_id = message.sender_id,
            value = %message.value,
            senders = inner.ledger.distinct_sender_count(message.round, message.phase),
            "Message counted"
        );

        if inner.state.round.is_none() {
            return MessageOutcome::Recorded;
        }
        self.advance(&mut inner)
    }

    /// Halts the peer. Idempotent.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        let was_alive = inner.state.alive;

        inner.state.alive = false;
        if self.config.stop_policy == StopPolicy::Reset {
            inner.state.value = None;
            inner.state.decided = None;
            inner.state.round = None;
            inner.state.phase = Phase::Propose;
        }
        inner.ledger.clear_all();

        if was_alive {
            info!(node_id = self.config.node_id, "Consensus stopped");
        }
    }

    /// Snapshot of the peer. A faulty peer reports nothing but liveness.
    pub fn state(&self) -> PeerState {
        let inner = self.inner.lock();
        if self.gate.is_faulty() {
            PeerState::opaque(inner.state.alive)
        } else {
            inner.state
        }
    }

    /// Current tally for a value in a round/phase.
    pub fn tally(&self, round: u64, phase: Phase, value: Value) -> usize {
        self.inner.lock().ledger.count_for(round, phase, value)
    }

    pub fn distinct_senders(&self, round: u64, phase: Phase) -> usize {
        self.inner.lock().ledger.distinct_sender_count(round, phase)
    }

    /// Fires every transition the current tallies allow. A transition moves
    /// the peer out of the phase it fired from, so each fires once per round.
    fn advance(&self, inner: &mut EngineState) -> MessageOutcome {
        let quorum = self.config.quorum();
        let node_id = self.config.node_id;
        let mut progressed = false;

        while let Some(round) = inner.state.round {
            let phase = inner.state.phase;
            if inner.ledger.distinct_sender_count(round, phase) < quorum {
                break;
            }

            match phase {
                Phase::Propose => {
                    let majority = self.propose_majority(&inner.ledger, round);
                    inner.state.phase = Phase::Vote;
                    debug!(node_id, round, value = %majority, "Proposal quorum reached, voting");
                    self.broadcaster
                        .broadcast(Message::vote(round, majority, node_id));
                }
                Phase::Vote => match self.resolve_votes(&inner.ledger, round) {
                    VoteResolution::Decide(value) => {
                        inner.state.value = Some(value);
                        inner.state.decided = Some(true);
                        inner.ledger.clear_all();
                        info!(node_id, round, value = %value, "Decided");
                        return MessageOutcome::Decided(value);
                    }
                    VoteResolution::Advance(value) => {
                        let next = round + 1;
                        inner.ledger.clear(round);
                        inner.state.round = Some(next);
                        inner.state.phase = Phase::Propose;
                        inner.state.value = Some(value);
                        debug!(node_id, round = next, value = %value, "No decision, next round");
                        self.broadcaster
                            .broadcast(Message::propose(next, value, node_id));
                    }
                },
            }
            progressed = true;
        }

        if progressed {
            MessageOutcome::Progressed
        } else {
            MessageOutcome::Recorded
        }
    }

    /// The value proposed by more than `N / 2` peers, or `Unknown`.
    fn propose_majority(&self, ledger: &RoundLedger, round: u64) -> Value {
        let total = self.config.total_nodes;
        [Value::Zero, Value::One]
            .into_iter()
            .find(|v| 2 * ledger.count_for(round, Phase::Propose, *v) > total)
            .unwrap_or(Value::Unknown)
    }

    /// Decides on a value voted by more than `F` peers. Otherwise carries the
    /// better supported concrete value into the next round (ties go to `1`),
    /// or a coin flip when no concrete value was voted.
    fn resolve_votes(&self, ledger: &RoundLedger, round: u64) -> VoteResolution {
        let zeros = ledger.count_for(round, Phase::Vote, Value::Zero);
        let ones = ledger.count_for(round, Phase::Vote, Value::One);
        let max_faulty = self.config.max_faulty;

        if zeros > max_faulty {
            VoteResolution::Decide(Value::Zero)
        } else if ones > max_faulty {
            VoteResolution::Decide(Value::One)
        } else if zeros + ones > 0 {
            VoteResolution::Advance(if zeros > ones { Value::Zero } else { Value::One })
        } else {
            VoteResolution::Advance(Value::from_bit(self.coin.flip()))
        }
    }
}
