//! Tunables for the Belief merge.

use crate::error::{ConsensusError, Result};
use serde::{Deserialize, Serialize};

/// Default fraction of total stake required to promote a consensus level.
pub const DEFAULT_CONSENSUS_THRESHOLD: f64 = 0.67;

/// Default minimum stake for a peer's Order to be counted.
pub const DEFAULT_MINIMUM_EFFECTIVE_STAKE: f64 = 1.0;

/// Default time (ms) a peer keeps a proposal that the vote contradicts.
pub const DEFAULT_KEEP_PROPOSAL_TIME: u64 = 100;

/// Parameters of a merge round, passed into every
/// [`BeliefMerge`](crate::BeliefMerge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Fraction of total stake that must agree on a prefix before a
    /// consensus level advances over it.
    pub consensus_threshold: f64,

    /// Peers with less stake than this are ignored when accumulating Orders.
    pub minimum_effective_stake: f64,

    /// Milliseconds a peer holds on to its own proposal before adopting a
    /// conflicting vote outcome.
    pub keep_proposal_time: u64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            consensus_threshold: DEFAULT_CONSENSUS_THRESHOLD,
            minimum_effective_stake: DEFAULT_MINIMUM_EFFECTIVE_STAKE,
            keep_proposal_time: DEFAULT_KEEP_PROPOSAL_TIME,
        }
    }
}

impl MergeConfig {
    /// Sets the consensus threshold.
    pub fn with_consensus_threshold(mut self, threshold: f64) -> Self {
        self.consensus_threshold = threshold;
        self
    }

    /// Sets the minimum effective stake.
    pub fn with_minimum_effective_stake(mut self, stake: f64) -> Self {
        self.minimum_effective_stake = stake;
        self
    }

    /// Sets the keep-proposal time in milliseconds.
    pub fn with_keep_proposal_time(mut self, millis: u64) -> Self {
        self.keep_proposal_time = millis;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.consensus_threshold > 0.5 && self.consensus_threshold < 1.0) {
            return Err(ConsensusError::InvalidConfig(format!(
                "consensus_threshold must be in (0.5, 1.0), got {}",
                self.consensus_threshold
            )));
        }

        if !(self.minimum_effective_stake.is_finite() && self.minimum_effective_stake >= 0.0) {
            return Err(ConsensusError::InvalidConfig(format!(
                "minimum_effective_stake must be a non-negative number, got {}",
                self.minimum_effective_stake
            )));
        }

        Ok(())
    }
}
