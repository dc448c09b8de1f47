//! Fuzz target for the Belief merge.
//!
//! Builds small networks from arbitrary stakes and block sequences and
//! checks that a merge keeps confirmed history and ordered points.

#![no_main]

use arbitrary::Arbitrary;
use convex_consensus::{
    is_non_increasing, Belief, BeliefMerge, Block, MergeConfig, Order, PeerRegistry, PeerStatus,
    SignedBlock,
};
use convex_identity::Keypair;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    stakes: Vec<u8>,
    chains: Vec<Vec<u8>>,
    points: [u8; 3],
    timestamp: u16,
}

fuzz_target!(|input: Input| {
    let n = input.stakes.len().clamp(1, 6);
    let keys: Vec<Keypair> = (0..n as u64).map(Keypair::from_seed).collect();
    let pool: Vec<SignedBlock> = (0..8u64)
        .map(|i| SignedBlock::sign(&keys[i as usize % n], Block::create(i, vec![])))
        .collect();

    let peers = keys
        .iter()
        .enumerate()
        .map(|(i, k)| {
            let stake = input.stakes.get(i).copied().unwrap_or(0);
            PeerStatus::new(k.public_key(), format!("peer-{i}"), f64::from(stake))
        })
        .collect();
    let registry = PeerRegistry::new(peers, 1.0).expect("seeded keys are distinct");

    let beliefs: Vec<Belief> = keys
        .iter()
        .enumerate()
        .map(|(i, kp)| {
            let chain = input.chains.get(i).map(Vec::as_slice).unwrap_or_default();
            let order = chain
                .iter()
                .take(8)
                .fold(Order::create(), |o, b| o.append(pool[*b as usize % pool.len()].clone()));
            Belief::create(kp, order)
        })
        .collect();

    // Give the merging peer some confirmed history
    let mine = beliefs[0]
        .get_order(&keys[0].public_key())
        .expect("own order is present")
        .value()
        .clone();
    let len = mine.block_count();
    let mut points = [len, 0, 0, 0];
    for (level, p) in input.points.iter().enumerate() {
        points[level + 1] = u64::from(*p).min(points[level]);
    }
    let Ok(mine) = mine.with_consensus_points(points) else {
        return;
    };
    let initial = Belief::create(&keys[0], mine.clone());

    let merge = BeliefMerge::create(
        initial,
        &keys[0],
        u64::from(input.timestamp),
        &registry,
        MergeConfig::default(),
    )
    .expect("own order is present");
    let result = merge.merge(&beliefs[1..]);

    let after = result
        .get_order(&keys[0].public_key())
        .expect("own order is kept")
        .value();
    assert!(mine.check_consistent(after));
    assert!(after.consensus_point() >= mine.consensus_point());
    assert!(is_non_increasing(after.consensus_points()));
});
