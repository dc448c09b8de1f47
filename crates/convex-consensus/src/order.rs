//! Orders: one peer's proposed Block sequence plus consensus markers.
//!
//! An Order carries a fixed array of consensus points, one per level:
//!
//! | level | name        | meaning                                         |
//! |-------|-------------|-------------------------------------------------|
//! | 0     | block count | always the number of blocks in the Order        |
//! | 1     | proposal    | prefix the peer proposes for agreement          |
//! | 2     | consensus   | prefix confirmed by a stake supermajority       |
//! | 3     | finality    | prefix the peer treats as irreversible          |
//!
//! Points never increase with level: each stronger level covers a prefix no
//! longer than the level below it. Every constructor and the decoder enforce
//! this.

use crate::block::SignedBlock;
use crate::error::{ConsensusError, Result};
use crate::signed::{Signed, ValueHash};
use im::Vector;
use serde::{Deserialize, Serialize};

/// Level 0: the number of blocks.
pub const BLOCK_COUNT_LEVEL: usize = 0;
/// Level 1: proposal point.
pub const PROPOSAL_LEVEL: usize = 1;
/// Level 2: consensus point.
pub const CONSENSUS_LEVEL: usize = 2;
/// Level 3: finality point.
pub const FINALITY_LEVEL: usize = 3;
/// Number of consensus levels, including the block count.
pub const CONSENSUS_LEVELS: usize = 4;

/// One peer's sequence of signed Blocks and its consensus points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOrder")]
pub struct Order {
    blocks: Vector<SignedBlock>,
    consensus_points: [u64; CONSENSUS_LEVELS],
    timestamp: u64,
}

/// An Order signed by the peer it belongs to.
pub type SignedOrder = Signed<Order>;

#[derive(Deserialize)]
struct RawOrder {
    blocks: Vector<SignedBlock>,
    consensus_points: [u64; CONSENSUS_LEVELS],
    timestamp: u64,
}

impl TryFrom<RawOrder> for Order {
    type Error = ConsensusError;

    fn try_from(raw: RawOrder) -> Result<Self> {
        let mut points = raw.consensus_points;
        points[BLOCK_COUNT_LEVEL] = raw.blocks.len() as u64;
        if !is_non_increasing(&points) {
            return Err(ConsensusError::InvalidConsensusPoints(raw.consensus_points));
        }
        Ok(Self {
            blocks: raw.blocks,
            consensus_points: points,
            timestamp: raw.timestamp,
        })
    }
}

/// Returns true if `points` never increase from one level to the next.
pub fn is_non_increasing(points: &[u64; CONSENSUS_LEVELS]) -> bool {
    points.windows(2).all(|pair| pair[0] >= pair[1])
}

/// Length of the longest common prefix of two block sequences.
pub(crate) fn common_prefix(a: &Vector<SignedBlock>, b: &Vector<SignedBlock>) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

impl Order {
    /// Creates an empty Order with every consensus point at zero.
    pub fn create() -> Self {
        Self {
            blocks: Vector::new(),
            consensus_points: [0; CONSENSUS_LEVELS],
            timestamp: 0,
        }
    }

    /// Returns a copy with `block` appended.
    ///
    /// Appending never deduplicates, and only the block count moves: the
    /// other points were already within the shorter sequence.
    pub fn append(&self, block: SignedBlock) -> Self {
        let mut blocks = self.blocks.clone();
        blocks.push_back(block);
        let mut consensus_points = self.consensus_points;
        consensus_points[BLOCK_COUNT_LEVEL] = blocks.len() as u64;
        Self {
            blocks,
            consensus_points,
            timestamp: self.timestamp,
        }
    }

    /// Returns a copy with the block sequence replaced.
    ///
    /// Proposal, consensus and finality points are clamped to the new length.
    pub fn with_blocks(&self, blocks: Vector<SignedBlock>) -> Self {
        let len = blocks.len() as u64;
        let mut consensus_points = self.consensus_points;
        consensus_points[BLOCK_COUNT_LEVEL] = len;
        for point in consensus_points.iter_mut().skip(1) {
            *point = (*point).min(len);
        }
        Self {
            blocks,
            consensus_points,
            timestamp: self.timestamp,
        }
    }

    /// Returns a copy with the point at `level` set to `point`.
    ///
    /// Level 0 is derived from the block count and cannot be written.
    pub fn with_consensus_point(&self, level: usize, point: u64) -> Result<Self> {
        if level == BLOCK_COUNT_LEVEL || level >= CONSENSUS_LEVELS {
            return Err(ConsensusError::InvalidConsensusLevel {
                level,
                max: FINALITY_LEVEL,
            });
        }
        let mut points = self.consensus_points;
        points[level] = point;
        self.with_consensus_points(points)
    }

    /// Returns a copy with all writable points replaced. Entry 0 of `points`
    /// is ignored and recomputed from the block count.
    pub fn with_consensus_points(&self, points: [u64; CONSENSUS_LEVELS]) -> Result<Self> {
        let mut consensus_points = points;
        consensus_points[BLOCK_COUNT_LEVEL] = self.blocks.len() as u64;
        if !is_non_increasing(&consensus_points) {
            return Err(ConsensusError::InvalidConsensusPoints(consensus_points));
        }
        Ok(Self {
            blocks: self.blocks.clone(),
            consensus_points,
            timestamp: self.timestamp,
        })
    }

    /// Returns a copy stamped with `timestamp`.
    pub fn with_timestamp(&self, timestamp: u64) -> Self {
        Self {
            blocks: self.blocks.clone(),
            consensus_points: self.consensus_points,
            timestamp,
        }
    }

    /// Returns the blocks.
    pub fn blocks(&self) -> &Vector<SignedBlock> {
        &self.blocks
    }

    /// Returns the block at `index`, if any.
    pub fn block(&self, index: usize) -> Option<&SignedBlock> {
        self.blocks.get(index)
    }

    /// Returns the number of blocks.
    pub fn block_count(&self) -> u64 {
        self.consensus_points[BLOCK_COUNT_LEVEL]
    }

    /// Returns all consensus points, indexed by level.
    pub fn consensus_points(&self) -> &[u64; CONSENSUS_LEVELS] {
        &self.consensus_points
    }

    /// Returns the point at `level`, or 0 for a level that does not exist.
    pub fn consensus_point_at(&self, level: usize) -> u64 {
        self.consensus_points.get(level).copied().unwrap_or(0)
    }

    /// Returns the proposal point.
    pub fn proposal_point(&self) -> u64 {
        self.consensus_points[PROPOSAL_LEVEL]
    }

    /// Returns the consensus point.
    pub fn consensus_point(&self) -> u64 {
        self.consensus_points[CONSENSUS_LEVEL]
    }

    /// Returns the finality point.
    pub fn finality_point(&self) -> u64 {
        self.consensus_points[FINALITY_LEVEL]
    }

    /// Returns the timestamp of the last update.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Returns the number of leading blocks shared with `other`.
    pub fn common_prefix_length(&self, other: &Order) -> u64 {
        common_prefix(&self.blocks, &other.blocks) as u64
    }

    /// Returns true if `other` keeps every block up to this Order's
    /// consensus point, i.e. it does not contradict confirmed history.
    pub fn check_consistent(&self, other: &Order) -> bool {
        self.common_prefix_length(other) >= self.consensus_point()
    }

    /// Compares blocks and consensus points, ignoring the timestamp.
    pub fn consensus_equals(&self, other: &Order) -> bool {
        self.consensus_points == other.consensus_points && self.blocks == other.blocks
    }

    /// Returns the content hash of this Order.
    pub fn hash(&self) -> ValueHash {
        ValueHash::of(self)
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::create()
    }
}
