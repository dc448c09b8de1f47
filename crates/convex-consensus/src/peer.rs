//! Peer round driver.
//!
//! A [`Peer`] owns one node's current Belief and runs merge rounds against
//! it: received payloads are queued, and each [`Peer::update`] drains the
//! queue, merges it into the current Belief and publishes the result.
//! Transport and timers live outside this crate.

use crate::belief::Belief;
use crate::block::{Block, SignedBlock};
use crate::config::MergeConfig;
use crate::error::{ConsensusError, Result};
use crate::merge::BeliefMerge;
use crate::message::BeliefPayload;
use crate::order::{Order, SignedOrder};
use crate::state::ConsensusState;
use crate::transaction::SignedTransaction;
use convex_identity::{Keypair, PublicKey};
use parking_lot::{Mutex, RwLock};

/// A consensus participant.
pub struct Peer {
    /// Our signing key.
    keypair: Keypair,

    /// Merge parameters shared by the network.
    config: MergeConfig,

    /// Currently published Belief.
    belief: RwLock<Belief>,

    /// Payloads received since the last round.
    pending: Mutex<Vec<BeliefPayload>>,

    /// Held for the duration of a round.
    round: Mutex<()>,
}

impl Peer {
    /// Creates a peer whose Belief holds only its own empty Order.
    pub fn new(keypair: Keypair, config: MergeConfig) -> Result<Self> {
        config.validate()?;
        let belief = Belief::create(&keypair, Order::create());
        Ok(Self::from_parts(keypair, belief, config))
    }

    /// Creates a peer resuming from a stored Belief.
    pub fn with_belief(keypair: Keypair, belief: Belief, config: MergeConfig) -> Result<Self> {
        config.validate()?;
        let key = keypair.public_key();
        if belief.get_order(&key).is_none() {
            return Err(ConsensusError::MissingOwnOrder(key));
        }
        Ok(Self::from_parts(keypair, belief, config))
    }

    fn from_parts(keypair: Keypair, belief: Belief, config: MergeConfig) -> Self {
        Self {
            keypair,
            config,
            belief: RwLock::new(belief),
            pending: Mutex::new(Vec::new()),
            round: Mutex::new(()),
        }
    }

    /// Returns this peer's public key.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Returns the merge parameters.
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Returns a snapshot of the current Belief.
    pub fn belief(&self) -> Belief {
        self.belief.read().clone()
    }

    /// Returns this peer's own signed Order.
    pub fn own_order(&self) -> Option<SignedOrder> {
        self.belief.read().get_order(&self.public_key()).cloned()
    }

    /// Queues a payload for the next round.
    pub fn receive(&self, payload: BeliefPayload) {
        tracing::trace!(kind = payload.kind(), "queued payload");
        self.pending.lock().push(payload);
    }

    /// Decodes and queues a wire payload.
    pub fn receive_bytes(&self, data: &[u8]) -> Result<()> {
        let payload = BeliefPayload::decode(data)?;
        self.receive(payload);
        Ok(())
    }

    /// Returns the number of payloads waiting for the next round.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Signs a new Block and appends it to our own Order.
    pub fn propose(
        &self,
        transactions: Vec<SignedTransaction>,
        timestamp: u64,
    ) -> Result<SignedBlock> {
        let _round = self.round.lock();

        let block = SignedBlock::sign(&self.keypair, Block::create(timestamp, transactions));
        let next = self
            .belief
            .read()
            .propose_block(&self.keypair, [block.clone()])?;
        *self.belief.write() = next;

        tracing::debug!(
            peer = %self.public_key().short_id(),
            block = %block.id(),
            transactions = block.value().len(),
            "proposed block"
        );

        Ok(block)
    }

    /// Runs one merge round against `state` at `timestamp`.
    ///
    /// Returns our own Order if the round changed it, so the caller can
    /// broadcast it.
    pub fn update<S: ConsensusState>(
        &self,
        state: S,
        timestamp: u64,
    ) -> Result<Option<SignedOrder>> {
        let _round = self.round.lock();

        let payloads = std::mem::take(&mut *self.pending.lock());
        let current = self.belief();
        let key = self.public_key();
        let before = current.get_order(&key).cloned();

        let merge = BeliefMerge::create(current, &self.keypair, timestamp, state, self.config.clone())?;
        let next = merge.merge_payloads(&payloads);
        let after = next.get_order(&key).cloned();
        *self.belief.write() = next;

        match after {
            Some(order) if before.as_ref() != Some(&order) => {
                let value = order.value();
                tracing::info!(
                    peer = %key.short_id(),
                    payloads = payloads.len(),
                    blocks = value.block_count(),
                    proposal = value.proposal_point(),
                    consensus = value.consensus_point(),
                    finality = value.finality_point(),
                    "own order updated"
                );
                Ok(Some(order))
            }
            _ => {
                tracing::debug!(
                    peer = %key.short_id(),
                    payloads = payloads.len(),
                    "round left own order unchanged"
                );
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("public_key", &self.public_key())
            .field("config", &self.config)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
