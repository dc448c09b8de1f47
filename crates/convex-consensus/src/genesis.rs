//! Genesis configuration for a peer network.
//!
//! The genesis file lists the initial peers with their stakes and the merge
//! parameters every peer must share.

use crate::config::MergeConfig;
use crate::error::{ConsensusError, Result};
use crate::registry::{PeerRegistry, PeerStatus};
use convex_identity::{Keypair, PublicKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Genesis entry for a single peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisPeer {
    /// Human-readable name.
    pub name: String,

    /// Public key (hex-encoded).
    pub public_key: String,

    /// Initial stake.
    pub stake: f64,
}

impl GenesisPeer {
    /// Converts to a [`PeerStatus`].
    pub fn into_status(self) -> Result<PeerStatus> {
        let key = PublicKey::from_hex(&self.public_key).map_err(|e| {
            ConsensusError::InvalidGenesis(format!("peer {}: {}", self.name, e))
        })?;

        if !(self.stake.is_finite() && self.stake >= 0.0) {
            return Err(ConsensusError::InvalidGenesis(format!(
                "peer {}: stake must be a non-negative number, got {}",
                self.name, self.stake
            )));
        }

        Ok(PeerStatus::new(key, self.name, self.stake))
    }
}

/// Complete genesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genesis {
    /// Network identifier.
    pub network_id: String,

    /// Genesis timestamp (unix milliseconds).
    pub timestamp: u64,

    /// Initial peers.
    pub peers: Vec<GenesisPeer>,

    /// Merge parameters.
    #[serde(default)]
    pub consensus: MergeConfig,
}

impl Genesis {
    /// Creates an empty genesis configuration.
    pub fn new(network_id: impl Into<String>, timestamp: u64) -> Self {
        Self {
            network_id: network_id.into(),
            timestamp,
            peers: Vec::new(),
            consensus: MergeConfig::default(),
        }
    }

    /// Adds a peer.
    pub fn with_peer(mut self, peer: GenesisPeer) -> Self {
        self.peers.push(peer);
        self
    }

    /// Sets the merge parameters.
    pub fn with_consensus(mut self, config: MergeConfig) -> Self {
        self.consensus = config;
        self
    }

    /// Loads genesis from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConsensusError::InvalidGenesis(format!("failed to read file: {}", e)))?;

        let genesis: Genesis = serde_json::from_str(&content)?;
        genesis.validate()?;
        Ok(genesis)
    }

    /// Loads genesis from a YAML file.
    pub fn load_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConsensusError::InvalidGenesis(format!("failed to read file: {}", e)))?;

        let genesis: Genesis = serde_yaml::from_str(&content)
            .map_err(|e| ConsensusError::InvalidGenesis(e.to_string()))?;
        genesis.validate()?;
        Ok(genesis)
    }

    /// Validates the genesis configuration.
    pub fn validate(&self) -> Result<()> {
        if self.network_id.is_empty() {
            return Err(ConsensusError::InvalidGenesis("network_id is empty".into()));
        }

        if self.peers.is_empty() {
            return Err(ConsensusError::InvalidGenesis("no peers".into()));
        }

        self.consensus.validate()?;

        let mut seen_names = HashSet::new();
        let mut seen_keys = HashSet::new();
        let mut total_stake = 0.0;

        for p in &self.peers {
            let status = p.clone().into_status()?;
            if !seen_names.insert(&p.name) {
                return Err(ConsensusError::InvalidGenesis(format!(
                    "duplicate peer name: {}",
                    p.name
                )));
            }
            if !seen_keys.insert(status.public_key) {
                return Err(ConsensusError::InvalidGenesis(format!(
                    "duplicate peer key: {}",
                    p.public_key
                )));
            }
            total_stake += status.stake;
        }

        if total_stake <= 0.0 {
            return Err(ConsensusError::InvalidGenesis(
                "total stake must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Converts to a [`PeerRegistry`] using the configured minimum stake.
    pub fn into_registry(self) -> Result<PeerRegistry> {
        let peers = self
            .peers
            .into_iter()
            .map(GenesisPeer::into_status)
            .collect::<Result<Vec<_>>>()?;

        PeerRegistry::new(peers, self.consensus.minimum_effective_stake)
    }

    /// Saves genesis to a JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| ConsensusError::InvalidGenesis(format!("failed to write file: {}", e)))?;

        Ok(())
    }

    /// Saves genesis to a YAML file.
    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConsensusError::InvalidGenesis(e.to_string()))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| ConsensusError::InvalidGenesis(format!("failed to write file: {}", e)))?;

        Ok(())
    }
}

/// Generates a devnet genesis with `peer_count` equally staked peers.
///
/// Peer `i` uses `Keypair::from_seed(i)`, so tests and local tooling can
/// recreate the matching keypairs.
pub fn generate_devnet_genesis(peer_count: usize, timestamp: u64) -> Genesis {
    let peers = (0..peer_count as u64)
        .map(|i| GenesisPeer {
            name: format!("peer-{}", i + 1),
            public_key: Keypair::from_seed(i).public_key().to_hex(),
            stake: 100.0,
        })
        .collect();

    Genesis {
        network_id: "convex-devnet".into(),
        timestamp,
        peers,
        consensus: MergeConfig::default(),
    }
}
