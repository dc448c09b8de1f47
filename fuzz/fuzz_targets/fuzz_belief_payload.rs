//! Fuzz target for gossip payload decoding.
//!
//! Tests that the payload decoder handles arbitrary input without panicking,
//! and that anything it accepts can be merged.

#![no_main]

use convex_consensus::{BeliefMerge, BeliefPayload, MergeConfig, PeerRegistry, PeerStatus};
use convex_identity::Keypair;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = BeliefPayload::decode(data) else {
        return;
    };

    // Stake every signer the payload mentions so its Orders reach the vote
    let peers = payload
        .orders()
        .iter()
        .map(|o| PeerStatus::new(o.signer(), "fuzz", 10.0))
        .collect::<Vec<_>>();
    let Ok(registry) = PeerRegistry::new(peers, 1.0) else {
        return;
    };

    let keypair = Keypair::from_seed(0);
    let belief = convex_consensus::Belief::create(&keypair, convex_consensus::Order::create());
    let merge = BeliefMerge::create(belief, &keypair, u64::MAX, &registry, MergeConfig::default())
        .expect("own order is present");
    let _ = merge.merge_payloads(&[payload]);
});
