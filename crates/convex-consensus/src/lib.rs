//! Convex Consensus
//!
//! This crate provides the stake-weighted Belief merge through which Convex
//! peers converge on one totally ordered sequence of transaction Blocks.
//!
//! # Architecture
//!
//! Every peer keeps a [`Belief`]: the latest signed [`Order`] it has seen from
//! each peer, its own included. Each gossip round a peer merges the Beliefs it
//! received into its own with a [`BeliefMerge`], votes over the Orders using
//! stake weights, and re-signs its own Order if the vote moved it.
//!
//! - **Deterministic**: identical inputs produce byte-identical Beliefs
//! - **Sybil resistant**: only staked peers' Orders are counted
//! - **Safe**: a peer never drops blocks below its own consensus point
//! - **Live**: new blocks are carried forward while history converges
//!
//! # Components
//!
//! - [`Block`]: Timestamped batch of signed transactions
//! - [`Order`]: A peer's block sequence plus four consensus points
//! - [`Belief`]: Map from peer key to that peer's latest [`SignedOrder`]
//! - [`BeliefMerge`]: One round of accumulate, vote and adopt
//! - [`ConsensusState`]: Stake table and block validity oracle
//! - [`PeerRegistry`]: Registry-backed [`ConsensusState`]
//! - [`Peer`]: Round driver holding a peer's current Belief
//! - [`Genesis`]: Initial network configuration
//!
//! # Consensus Levels
//!
//! ```text
//!  blocks:    [B1] [B2] [B3] [B4] [B5]
//!                                    ▲  level 0: block count      (5)
//!                          ▲            level 1: proposal point   (3)
//!                     ▲                 level 2: consensus point  (2)
//!                ▲                      level 3: finality point   (1)
//! ```
//!
//! Each level covers a prefix no longer than the level below it.
//!
//! # Example
//!
//! ```rust
//! use convex_consensus::{generate_devnet_genesis, MergeConfig, Peer};
//! use convex_identity::Keypair;
//!
//! let registry = generate_devnet_genesis(2, 0).into_registry().unwrap();
//! let alice = Peer::new(Keypair::from_seed(0), MergeConfig::default()).unwrap();
//! let bob = Peer::new(Keypair::from_seed(1), MergeConfig::default()).unwrap();
//!
//! bob.propose(vec![], 1).unwrap();
//! alice.receive(bob.belief().into());
//!
//! let changed = alice.update(&registry, 2).unwrap();
//! assert_eq!(changed.unwrap().value().block_count(), 1);
//! ```

mod belief;
mod block;
mod config;
mod error;
mod genesis;
mod merge;
mod message;
mod order;
mod peer;
mod registry;
mod signed;
mod state;
mod transaction;

pub use belief::Belief;
pub use block::{Block, SignedBlock};
pub use config::{
    MergeConfig, DEFAULT_CONSENSUS_THRESHOLD, DEFAULT_KEEP_PROPOSAL_TIME,
    DEFAULT_MINIMUM_EFFECTIVE_STAKE,
};
pub use error::{ConsensusError, Result};
pub use genesis::{generate_devnet_genesis, Genesis, GenesisPeer};
pub use merge::{compare_orders, BeliefMerge};
pub use message::BeliefPayload;
pub use order::{
    is_non_increasing, Order, SignedOrder, BLOCK_COUNT_LEVEL, CONSENSUS_LEVEL, CONSENSUS_LEVELS,
    FINALITY_LEVEL, PROPOSAL_LEVEL,
};
pub use peer::Peer;
pub use registry::{PeerRegistry, PeerStatus};
pub use signed::{Signed, ValueHash};
pub use state::{BlockRejection, ConsensusState, StakeTable};
pub use transaction::{SignedTransaction, Transaction};
