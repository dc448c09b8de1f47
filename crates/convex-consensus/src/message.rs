//! Gossip payloads exchanged between peers.
//!
//! Peers broadcast either their own freshly signed Order or a whole Belief.
//! The transport decodes either form into a [`BeliefPayload`], and merging
//! consumes the Orders it carries without inspecting types again.

use crate::belief::Belief;
use crate::error::Result;
use crate::order::SignedOrder;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A decoded gossip payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BeliefPayload {
    /// A single peer's signed Order.
    Order(SignedOrder),

    /// A full Belief.
    Belief(Belief),
}

impl BeliefPayload {
    /// Encodes the payload to bytes.
    pub fn encode(&self) -> Bytes {
        let json = serde_json::to_vec(self).expect("payload serialization should not fail");
        Bytes::from(json)
    }

    /// Decodes a payload from bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Returns the Orders carried by the payload.
    pub fn orders(&self) -> Vec<SignedOrder> {
        match self {
            BeliefPayload::Order(order) => vec![order.clone()],
            BeliefPayload::Belief(belief) => belief.orders().values().cloned().collect(),
        }
    }

    /// Returns the payload type as a string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            BeliefPayload::Order(_) => "order",
            BeliefPayload::Belief(_) => "belief",
        }
    }
}

impl From<SignedOrder> for BeliefPayload {
    fn from(order: SignedOrder) -> Self {
        BeliefPayload::Order(order)
    }
}

impl From<Belief> for BeliefPayload {
    fn from(belief: Belief) -> Self {
        BeliefPayload::Belief(belief)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, SignedBlock};
    use crate::order::Order;
    use convex_identity::Keypair;

    #[test]
    fn test_order_payload_extracts_one() {
        let kp = Keypair::from_seed(1);
        let order = SignedOrder::sign(&kp, Order::create());
        let payload = BeliefPayload::from(order.clone());

        assert_eq!(payload.kind(), "order");
        assert_eq!(Belief::extract_orders(&payload), vec![order]);
    }

    #[test]
    fn test_belief_payload_extracts_all() {
        let a = Keypair::from_seed(1);
        let b = Keypair::from_seed(2);
        let belief = Belief::create(&a, Order::create())
            .with_order(SignedOrder::sign(&b, Order::create().with_timestamp(3)));
        let payload = BeliefPayload::from(belief.clone());

        let orders = Belief::extract_orders(&payload);
        assert_eq!(payload.kind(), "belief");
        assert_eq!(orders.len(), 2);
        assert!(orders.contains(belief.get_order(&b.public_key()).unwrap()));
    }

    #[test]
    fn test_encode_decode() {
        let kp = Keypair::from_seed(4);
        let order = Order::create().append(SignedBlock::sign(&kp, Block::create(9, vec![])));
        let payload = BeliefPayload::Order(SignedOrder::sign(&kp, order));

        let decoded = BeliefPayload::decode(&payload.encode()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(BeliefPayload::decode(b"{\"type\":\"order\"}").is_err());
        assert!(BeliefPayload::decode(b"\xff\x00").is_err());
    }
}
