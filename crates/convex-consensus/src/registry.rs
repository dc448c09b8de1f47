//! Peer registry: the read-only stake table behind a merge round.
//!
//! A [`PeerRegistry`] is the simplest [`ConsensusState`]: it knows each
//! peer's stake and accepts Blocks from any sufficiently staked peer.

use crate::block::SignedBlock;
use crate::error::{ConsensusError, Result};
use crate::state::{BlockRejection, ConsensusState, StakeTable};
use convex_identity::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerStatus {
    /// Peer's public key (identity).
    pub public_key: PublicKey,

    /// Human-readable name.
    pub name: String,

    /// Staked amount.
    pub stake: f64,

    /// Whether the peer currently participates in consensus.
    pub active: bool,
}

impl PeerStatus {
    /// Creates a new active peer.
    pub fn new(public_key: PublicKey, name: impl Into<String>, stake: f64) -> Self {
        Self {
            public_key,
            name: name.into(),
            stake,
            active: true,
        }
    }

    /// Sets the active status.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// The set of known peers and their stakes.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    peers: Vec<PeerStatus>,
    minimum_stake: f64,
    index: HashMap<PublicKey, usize>,
}

impl PeerRegistry {
    /// Creates a registry. Blocks from peers below `minimum_stake` are
    /// rejected by [`ConsensusState::check_block`].
    pub fn new(peers: Vec<PeerStatus>, minimum_stake: f64) -> Result<Self> {
        let mut index = HashMap::with_capacity(peers.len());
        for (i, peer) in peers.iter().enumerate() {
            if index.insert(peer.public_key, i).is_some() {
                return Err(ConsensusError::InvalidGenesis(format!(
                    "duplicate peer key: {}",
                    peer.public_key
                )));
            }
        }

        Ok(Self {
            peers,
            minimum_stake,
            index,
        })
    }

    /// Returns all peers.
    pub fn peers(&self) -> &[PeerStatus] {
        &self.peers
    }

    /// Returns the number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns true if there are no peers.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Gets a peer by public key.
    pub fn get(&self, key: &PublicKey) -> Option<&PeerStatus> {
        self.index.get(key).and_then(|&i| self.peers.get(i))
    }

    /// Checks if a public key belongs to a registered peer.
    pub fn is_peer(&self, key: &PublicKey) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the minimum stake for block proposals.
    pub fn minimum_stake(&self) -> f64 {
        self.minimum_stake
    }

    /// Returns the stake of every active peer.
    pub fn active_stake(&self) -> f64 {
        self.peers
            .iter()
            .filter(|p| p.active)
            .map(|p| p.stake)
            .sum()
    }

    /// Returns the public keys of all active peers.
    pub fn active_keys(&self) -> Vec<PublicKey> {
        self.peers
            .iter()
            .filter(|p| p.active)
            .map(|p| p.public_key)
            .collect()
    }
}

impl ConsensusState for PeerRegistry {
    /// Active peers carry their stake; inactive peers are listed with zero.
    fn compute_stakes(&self) -> StakeTable {
        self.peers
            .iter()
            .map(|p| (p.public_key, if p.active { p.stake } else { 0.0 }))
            .collect()
    }

    fn check_block(&self, block: &SignedBlock) -> std::result::Result<(), BlockRejection> {
        let signer = block.signer();
        let peer = self.get(&signer).ok_or(BlockRejection::UnknownPeer(signer))?;
        if !peer.active || peer.stake < self.minimum_stake {
            return Err(BlockRejection::InsufficientStake(signer));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use convex_identity::Keypair;

    fn test_peers(stakes: &[f64]) -> Vec<PeerStatus> {
        stakes
            .iter()
            .enumerate()
            .map(|(i, stake)| {
                let key = Keypair::from_seed(i as u64).public_key();
                PeerStatus::new(key, format!("peer-{}", i), *stake)
            })
            .collect()
    }

    #[test]
    fn test_registry_lookup() {
        let peers = test_peers(&[10.0, 20.0, 30.0]);
        let key = peers[1].public_key;
        let registry = PeerRegistry::new(peers, 1.0).unwrap();

        assert_eq!(registry.len(), 3);
        assert!(registry.is_peer(&key));
        assert_eq!(registry.get(&key).unwrap().name, "peer-1");
        assert_eq!(registry.active_stake(), 60.0);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut peers = test_peers(&[10.0, 20.0]);
        peers[1].public_key = peers[0].public_key;

        assert!(matches!(
            PeerRegistry::new(peers, 1.0),
            Err(ConsensusError::InvalidGenesis(msg)) if msg.contains("duplicate peer key")
        ));
    }

    #[test]
    fn test_compute_stakes_zeroes_inactive() {
        let mut peers = test_peers(&[10.0, 20.0]);
        peers[1] = peers[1].clone().with_active(false);
        let inactive = peers[1].public_key;
        let registry = PeerRegistry::new(peers, 1.0).unwrap();

        let stakes = registry.compute_stakes();
        assert_eq!(stakes.total(), 10.0);
        assert_eq!(stakes.stake(&inactive), Some(0.0));
        assert_eq!(registry.active_keys().len(), 1);
    }

    #[test]
    fn test_check_block() {
        let registry = PeerRegistry::new(test_peers(&[10.0, 0.5]), 1.0).unwrap();
        let staked = Keypair::from_seed(0);
        let poor = Keypair::from_seed(1);
        let stranger = Keypair::from_seed(99);

        let block = |kp: &Keypair| SignedBlock::sign(kp, Block::create(1, vec![]));

        assert_eq!(registry.check_block(&block(&staked)), Ok(()));
        assert_eq!(
            registry.check_block(&block(&poor)),
            Err(BlockRejection::InsufficientStake(poor.public_key()))
        );
        assert_eq!(
            registry.check_block(&block(&stranger)),
            Err(BlockRejection::UnknownPeer(stranger.public_key()))
        );
    }
}
