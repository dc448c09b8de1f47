//! The consensus view of ledger state.
//!
//! Merging needs two things from the ledger: how much stake each peer key
//! carries, and whether a Block is acceptable. Both come through
//! [`ConsensusState`], so the merge itself stays independent of execution.

use crate::block::SignedBlock;
use convex_identity::PublicKey;
use std::collections::BTreeMap;
use thiserror::Error;

/// Reason a Block was rejected by the state oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockRejection {
    /// The block was signed by a key that is not a registered peer.
    #[error("block signed by unknown peer {0}")]
    UnknownPeer(PublicKey),

    /// The signing peer's stake is below the voting minimum.
    #[error("peer {0} has insufficient stake to propose blocks")]
    InsufficientStake(PublicKey),

    /// Any other reason given by the execution layer.
    #[error("block rejected: {0}")]
    Invalid(String),
}

/// Snapshot of the ledger state as seen by one merge round.
pub trait ConsensusState {
    /// Returns the stake of every peer, keyed by peer public key.
    fn compute_stakes(&self) -> StakeTable;

    /// Returns `Ok(())` if `block` may be appended to the ordering.
    fn check_block(&self, block: &SignedBlock) -> Result<(), BlockRejection>;
}

impl<S: ConsensusState + ?Sized> ConsensusState for &S {
    fn compute_stakes(&self) -> StakeTable {
        (**self).compute_stakes()
    }

    fn check_block(&self, block: &SignedBlock) -> Result<(), BlockRejection> {
        (**self).check_block(block)
    }
}

/// Stake weights of every known peer.
///
/// Non-finite and negative stakes are stored as zero, so they can never
/// contribute to a vote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StakeTable {
    stakes: BTreeMap<PublicKey, f64>,
    total: f64,
}

impl StakeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stake of `peer`, replacing any previous value.
    pub fn insert(&mut self, peer: PublicKey, stake: f64) {
        let stake = if stake.is_finite() && stake > 0.0 {
            stake
        } else {
            0.0
        };
        let previous = self.stakes.insert(peer, stake).unwrap_or(0.0);
        self.total += stake - previous;
    }

    /// Returns the raw stake of `peer`, or `None` if it has no entry.
    pub fn stake(&self, peer: &PublicKey) -> Option<f64> {
        self.stakes.get(peer).copied()
    }

    /// Returns the stake of `peer` if it reaches `minimum`, otherwise zero.
    pub fn effective_stake(&self, peer: &PublicKey, minimum: f64) -> f64 {
        match self.stake(peer) {
            Some(stake) if stake > 0.0 && stake >= minimum => stake,
            _ => 0.0,
        }
    }

    /// Returns the total effective stake across all peers.
    pub fn total_effective(&self, minimum: f64) -> f64 {
        self.stakes
            .keys()
            .map(|peer| self.effective_stake(peer, minimum))
            .sum()
    }

    /// Returns the sum of all stakes.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Returns the number of peers with an entry.
    pub fn len(&self) -> usize {
        self.stakes.len()
    }

    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PublicKey, f64)> + '_ {
        self.stakes.iter().map(|(k, v)| (k, *v))
    }
}

impl FromIterator<(PublicKey, f64)> for StakeTable {
    fn from_iter<I: IntoIterator<Item = (PublicKey, f64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (peer, stake) in iter {
            table.insert(peer, stake);
        }
        table
    }
}
