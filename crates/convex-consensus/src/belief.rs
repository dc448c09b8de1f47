//! Beliefs: a peer's view of every known peer's latest Order.

use crate::block::SignedBlock;
use crate::error::{ConsensusError, Result};
use crate::message::BeliefPayload;
use crate::order::{Order, SignedOrder};
use convex_identity::{Keypair, PublicKey};
use im::OrdMap;
use serde::{Deserialize, Serialize};

/// Immutable mapping from peer public key to that peer's latest signed Order.
///
/// Backed by a persistent map, so updating one entry shares the rest of the
/// structure with the previous Belief.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Belief {
    orders: OrdMap<PublicKey, SignedOrder>,
}

impl Belief {
    /// Creates a Belief with no Orders.
    pub fn initial() -> Self {
        Self::default()
    }

    /// Creates a Belief holding only `order`, signed by `keypair`.
    pub fn create(keypair: &Keypair, order: Order) -> Self {
        let signed = SignedOrder::sign(keypair, order);
        Self {
            orders: OrdMap::unit(keypair.public_key(), signed),
        }
    }

    /// Returns the Order filed under `peer`.
    pub fn get_order(&self, peer: &PublicKey) -> Option<&SignedOrder> {
        self.orders.get(peer)
    }

    /// Returns the underlying map.
    pub fn orders(&self) -> &OrdMap<PublicKey, SignedOrder> {
        &self.orders
    }

    /// Iterates entries in peer key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PublicKey, &SignedOrder)> + '_ {
        self.orders.iter()
    }

    /// Returns the number of peers with an Order.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Returns true if no Orders are known.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Returns a Belief holding `orders`.
    pub fn with_orders(&self, orders: OrdMap<PublicKey, SignedOrder>) -> Self {
        Self { orders }
    }

    /// Returns a copy with the entry for the signer of `order` replaced.
    pub fn with_order(&self, order: SignedOrder) -> Self {
        Self {
            orders: self.orders.update(order.signer(), order),
        }
    }

    /// Appends `blocks` to the caller's own Order and re-signs it.
    ///
    /// Fails with [`ConsensusError::MissingOwnOrder`] if the Belief holds no
    /// Order for `keypair`. A peer must seed its Belief with its own Order
    /// before proposing.
    pub fn propose_block(
        &self,
        keypair: &Keypair,
        blocks: impl IntoIterator<Item = SignedBlock>,
    ) -> Result<Self> {
        let key = keypair.public_key();
        let own = self
            .get_order(&key)
            .ok_or(ConsensusError::MissingOwnOrder(key))?;

        let order = blocks
            .into_iter()
            .fold(own.value().clone(), |order, block| order.append(block));

        tracing::trace!(
            peer = %key.short_id(),
            blocks = order.block_count(),
            "proposed blocks on own order"
        );

        Ok(self.with_order(SignedOrder::sign(keypair, order)))
    }

    /// Normalizes a gossip payload into the Orders it carries.
    pub fn extract_orders(payload: &BeliefPayload) -> Vec<SignedOrder> {
        payload.orders()
    }

    /// Checks every entry's signature and that each Order is filed under the
    /// key that signed it.
    ///
    /// Merging assumes the transport has already done this.
    pub fn verify(&self) -> Result<()> {
        for (key, order) in self.orders.iter() {
            if order.signer() != *key {
                return Err(ConsensusError::SignerMismatch {
                    key: *key,
                    signer: order.signer(),
                });
            }
            order.verify()?;
        }
        Ok(())
    }
}
