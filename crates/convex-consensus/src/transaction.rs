//! Transactions carried by Blocks.
//!
//! Consensus only orders transactions; it never looks inside the payload.
//! Execution belongs to the ledger state that sits behind
//! [`ConsensusState`](crate::ConsensusState).

use crate::signed::Signed;
use convex_identity::PublicKey;
use serde::{Deserialize, Serialize};

/// A transaction as submitted by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Account that originated the transaction.
    pub origin: PublicKey,

    /// Per-origin sequence number.
    pub sequence: u64,

    /// Opaque encoded command for the execution engine.
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
}

impl Transaction {
    /// Creates a new transaction.
    pub fn new(origin: PublicKey, sequence: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            origin,
            sequence,
            payload: payload.into(),
        }
    }
}

/// A transaction signed by its origin.
pub type SignedTransaction = Signed<Transaction>;

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
