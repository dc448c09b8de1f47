//! Consensus block structure.
//!
//! A Block is an immutable, timestamped batch of signed transactions. Peers
//! propose Blocks by appending them to their own Order; merging decides the
//! position each Block ends up at.

use crate::signed::{Signed, ValueHash};
use crate::transaction::SignedTransaction;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A timestamped, ordered batch of signed transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Proposal time (unix milliseconds) as stated by the proposer.
    timestamp: u64,

    /// Ordered transactions in this block.
    transactions: Vec<SignedTransaction>,
}

/// A block signed by the peer that proposed it.
pub type SignedBlock = Signed<Block>;

impl Block {
    /// Creates a new block.
    pub fn create(timestamp: u64, transactions: Vec<SignedTransaction>) -> Self {
        Self {
            timestamp,
            transactions,
        }
    }

    /// Returns the timestamp.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Returns the transactions in block order.
    pub fn transactions(&self) -> &[SignedTransaction] {
        &self.transactions
    }

    /// Returns the number of transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Returns true if the block carries no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Returns the content hash of the unsigned block.
    pub fn hash(&self) -> ValueHash {
        ValueHash::of(self)
    }

    /// Orders signed blocks by their stated timestamp.
    ///
    /// Used with a stable sort when blocks gathered from several Orders are
    /// appended in one go.
    pub fn timestamp_order(a: &SignedBlock, b: &SignedBlock) -> Ordering {
        a.value().timestamp.cmp(&b.value().timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use convex_identity::Keypair;

    fn signed_tx(kp: &Keypair, sequence: u64) -> SignedTransaction {
        SignedTransaction::sign(kp, Transaction::new(kp.public_key(), sequence, vec![0xc0]))
    }

    #[test]
    fn test_block_create() {
        let kp = Keypair::from_seed(1);
        let block = Block::create(1_000, vec![signed_tx(&kp, 1), signed_tx(&kp, 2)]);

        assert_eq!(block.timestamp(), 1_000);
        assert_eq!(block.len(), 2);
        assert!(!block.is_empty());
        assert_eq!(block.transactions()[1].value().sequence, 2);
    }

    #[test]
    fn test_block_value_equality() {
        let kp = Keypair::from_seed(1);
        let a = Block::create(5, vec![signed_tx(&kp, 1)]);
        let b = Block::create(5, vec![signed_tx(&kp, 1)]);
        let c = Block::create(6, vec![signed_tx(&kp, 1)]);

        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_signed_block_equality_fast_path() {
        let kp = Keypair::from_seed(3);
        let sb = SignedBlock::sign(&kp, Block::create(10, vec![]));
        let same = sb.clone();
        let resigned = SignedBlock::sign(&kp, Block::create(10, vec![]));

        assert!(sb.ptr_eq(&same));
        assert_eq!(sb, resigned);
        assert_eq!(sb.value_hash(), Block::create(10, vec![]).hash());
    }

    #[test]
    fn test_timestamp_order_is_stable() {
        let kp = Keypair::from_seed(1);
        let late = SignedBlock::sign(&kp, Block::create(30, vec![]));
        let early_a = SignedBlock::sign(&kp, Block::create(10, vec![signed_tx(&kp, 1)]));
        let early_b = SignedBlock::sign(&kp, Block::create(10, vec![signed_tx(&kp, 2)]));

        let mut blocks = vec![late.clone(), early_b.clone(), early_a.clone()];
        blocks.sort_by(Block::timestamp_order);

        assert_eq!(blocks, vec![early_b, early_a, late]);
    }
}
