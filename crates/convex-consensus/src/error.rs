//! Consensus error types.

use convex_identity::{IdentityError, PublicKey};
use thiserror::Error;

/// Errors that can occur during consensus operations.
///
/// Untrusted gossip input never produces one of these: stale, unstaked or
/// invalid data is filtered out during a merge instead.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// The peer has no Order of its own in the Belief it is working from.
    ///
    /// Every peer must seed its Belief with its own (possibly empty) Order
    /// before proposing or merging, so this indicates a mis-initialised peer.
    #[error("belief has no order for own key {0}")]
    MissingOwnOrder(PublicKey),

    /// An Order filed under one peer key but signed by another.
    #[error("order filed under {key} is signed by {signer}")]
    SignerMismatch {
        /// Key the Order was filed under.
        key: PublicKey,
        /// Key that signed it.
        signer: PublicKey,
    },

    /// A consensus level outside the writable range was addressed.
    #[error("invalid consensus level {level}: writable levels are 1..={max}")]
    InvalidConsensusLevel {
        /// Requested level.
        level: usize,
        /// Highest writable level.
        max: usize,
    },

    /// Consensus points that are not non-increasing by level.
    #[error("consensus points {0:?} are not non-increasing by level")]
    InvalidConsensusPoints([u64; 4]),

    /// Merge configuration out of range.
    #[error("invalid merge config: {0}")]
    InvalidConfig(String),

    /// Invalid genesis configuration.
    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Identity error (bad key or signature).
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// A specialized Result type for consensus operations.
pub type Result<T> = std::result::Result<T, ConsensusError>;
