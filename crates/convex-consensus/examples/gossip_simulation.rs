//! Simulate a small network of peers converging through gossip.
//!
//! Every peer proposes one block, then all peers exchange Beliefs each round
//! until their own Orders reach finality over every block.
//!
//! Usage:
//!   RUST_LOG=convex_consensus=debug cargo run --example gossip_simulation

use convex_consensus::{generate_devnet_genesis, BeliefPayload, Peer};
use convex_identity::Keypair;
use tracing_subscriber::EnvFilter;

const PEERS: usize = 4;
const MAX_ROUNDS: u64 = 20;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let genesis = generate_devnet_genesis(PEERS, 0);
    let config = genesis.consensus.clone();
    let registry = genesis.into_registry()?;

    let peers = (0..PEERS as u64)
        .map(|seed| Peer::new(Keypair::from_seed(seed), config.clone()))
        .collect::<convex_consensus::Result<Vec<Peer>>>()?;

    for (i, peer) in peers.iter().enumerate() {
        peer.propose(vec![], i as u64 + 1)?;
    }

    for round in 1..=MAX_ROUNDS {
        let payloads: Vec<bytes::Bytes> = peers
            .iter()
            .map(|p| BeliefPayload::from(p.belief()).encode())
            .collect();

        for (i, peer) in peers.iter().enumerate() {
            for (j, payload) in payloads.iter().enumerate() {
                if i != j {
                    peer.receive_bytes(payload)?;
                }
            }
        }

        let mut changed = 0;
        for peer in &peers {
            if peer.update(&registry, round * 100)?.is_some() {
                changed += 1;
            }
        }

        let finalized = peers
            .iter()
            .filter_map(|p| p.own_order())
            .all(|o| o.value().finality_point() == PEERS as u64);

        tracing::info!(round, changed, finalized, "round complete");
        if finalized {
            break;
        }
    }

    for peer in &peers {
        if let Some(order) = peer.own_order() {
            println!(
                "{} points={:?}",
                peer.public_key().short_id(),
                order.value().consensus_points()
            );
        }
    }

    Ok(())
}
