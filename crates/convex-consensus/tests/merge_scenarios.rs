//! End-to-end tests for the Belief merge.
//!
//! These tests verify:
//! - Stake-weighted voting and threshold-gated consensus levels
//! - Filtering of future, unstaked and misfiled Orders
//! - Determinism, fixed-point idempotence and safety
//! - Reproducible tie-breaks and block validation

use convex_consensus::{
    Belief, BeliefMerge, Block, BlockRejection, ConsensusState, MergeConfig, Order, SignedBlock,
    SignedOrder, StakeTable,
};
use convex_identity::{Keypair, PublicKey};
use std::collections::HashSet;

/// Stake table with an optional set of signers whose blocks are rejected.
struct TestState {
    stakes: StakeTable,
    rejected: HashSet<PublicKey>,
}

impl TestState {
    fn new(peers: &[(&Keypair, f64)]) -> Self {
        Self {
            stakes: peers.iter().map(|(k, s)| (k.public_key(), *s)).collect(),
            rejected: HashSet::new(),
        }
    }

    fn rejecting(mut self, signer: &Keypair) -> Self {
        self.rejected.insert(signer.public_key());
        self
    }
}

impl ConsensusState for TestState {
    fn compute_stakes(&self) -> StakeTable {
        self.stakes.clone()
    }

    fn check_block(&self, block: &SignedBlock) -> Result<(), BlockRejection> {
        if self.rejected.contains(&block.signer()) {
            return Err(BlockRejection::Invalid("blacklisted signer".into()));
        }
        Ok(())
    }
}

fn block(kp: &Keypair, ts: u64) -> SignedBlock {
    SignedBlock::sign(kp, Block::create(ts, vec![]))
}

fn order_of(blocks: &[&SignedBlock], ts: u64) -> Order {
    blocks
        .iter()
        .fold(Order::create(), |order, b| order.append((*b).clone()))
        .with_timestamp(ts)
}

fn merge(
    belief: &Belief,
    kp: &Keypair,
    ts: u64,
    state: &TestState,
    config: &MergeConfig,
    incoming: &[Belief],
) -> Belief {
    BeliefMerge::create(belief.clone(), kp, ts, state, config.clone())
        .unwrap()
        .merge(incoming)
}

fn own<'a>(belief: &'a Belief, kp: &Keypair) -> &'a Order {
    belief.get_order(&kp.public_key()).unwrap().value()
}

/// Three peers sharing B1, then diverging to B2a / B2b / B2b.
struct ScenarioA {
    keys: Vec<Keypair>,
    state: TestState,
    b1: SignedBlock,
    b2a: SignedBlock,
    b2b: SignedBlock,
    beliefs: Vec<Belief>,
}

fn scenario_a() -> ScenarioA {
    let keys: Vec<Keypair> = (0..3).map(Keypair::from_seed).collect();
    let state = TestState::new(&[(&keys[0], 40.0), (&keys[1], 35.0), (&keys[2], 25.0)]);

    let b1 = block(&keys[0], 1);
    let b2a = block(&keys[0], 2);
    let b2b = block(&keys[1], 2);

    let beliefs = vec![
        Belief::create(&keys[0], order_of(&[&b1, &b2a], 0)),
        Belief::create(&keys[1], order_of(&[&b1, &b2b], 0)),
        Belief::create(&keys[2], order_of(&[&b1, &b2b], 0)),
    ];

    ScenarioA {
        keys,
        state,
        b1,
        b2a,
        b2b,
        beliefs,
    }
}

/// Runs one gossip round where every peer merges every other peer's Belief.
fn gossip_round(keys: &[Keypair], beliefs: &[Belief], state: &TestState, ts: u64) -> Vec<Belief> {
    let config = MergeConfig::default();
    keys.iter()
        .enumerate()
        .map(|(i, kp)| {
            let incoming: Vec<Belief> = beliefs
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, b)| b.clone())
                .collect();
            merge(&beliefs[i], kp, ts, state, &config, &incoming)
        })
        .collect()
}

#[test]
fn test_scenario_a_threshold_gates_consensus() {
    let s = scenario_a();
    let result = merge(
        &s.beliefs[0],
        &s.keys[0],
        10,
        &s.state,
        &MergeConfig::default(),
        &s.beliefs[1..],
    );

    let mine = own(&result, &s.keys[0]);

    // B2b carries 60 stake and wins position 1; B2a is carried after it
    let blocks: Vec<&SignedBlock> = mine.blocks().iter().collect();
    assert_eq!(blocks, vec![&s.b1, &s.b2b, &s.b2a]);

    // 60 < 67: only B1 is agreed, and nothing is confirmed yet
    assert_eq!(mine.consensus_points(), &[3, 1, 0, 0]);
    assert_eq!(mine.timestamp(), 10);
    assert_eq!(result.len(), 3);
}

#[test]
fn test_scenario_a_converges_to_finality() {
    let s = scenario_a();
    let mut beliefs = s.beliefs.clone();

    for round in 1..=6 {
        beliefs = gossip_round(&s.keys, &beliefs, &s.state, round * 10);
    }

    let reference = own(&beliefs[0], &s.keys[0]);
    assert_eq!(reference.consensus_points(), &[3, 3, 3, 3]);
    for (belief, kp) in beliefs.iter().zip(&s.keys) {
        assert!(own(belief, kp).consensus_equals(reference));
    }
}

#[test]
fn test_scenario_b_future_order_ignored() {
    let s = scenario_a();
    let config = MergeConfig::default();

    let future = Belief::create(&s.keys[1], order_of(&[&s.b1, &s.b2b], 1_000));
    let with_future = merge(&s.beliefs[0], &s.keys[0], 10, &s.state, &config, &[future]);
    let without = merge(&s.beliefs[0], &s.keys[0], 10, &s.state, &config, &[]);

    assert_eq!(with_future, without);
    assert!(with_future.get_order(&s.keys[1].public_key()).is_none());
}

#[test]
fn test_scenario_c_append_keeps_duplicates_and_vote_dedupes() {
    let keys: Vec<Keypair> = (0..2).map(Keypair::from_seed).collect();
    let a = block(&keys[0], 1);
    let b = block(&keys[1], 2);

    let doubled = Order::create().append(b.clone()).append(b.clone());
    assert_eq!(doubled.block_count(), 2);
    assert_eq!(doubled.block(0), doubled.block(1));

    let state = TestState::new(&[(&keys[0], 60.0), (&keys[1], 40.0)]);
    let mine = Belief::create(&keys[0], order_of(&[&a], 0));
    let theirs = Belief::create(&keys[1], doubled);

    let result = merge(&mine, &keys[0], 5, &state, &MergeConfig::default(), &[theirs]);
    let blocks: Vec<&SignedBlock> = own(&result, &keys[0]).blocks().iter().collect();
    assert_eq!(blocks, vec![&a, &b]);
}

#[test]
fn test_merge_is_deterministic() {
    let s = scenario_a();
    let config = MergeConfig::default();

    let first = merge(&s.beliefs[0], &s.keys[0], 10, &s.state, &config, &s.beliefs[1..]);
    let second = merge(&s.beliefs[0], &s.keys[0], 10, &s.state, &config, &s.beliefs[1..]);
    let reversed: Vec<Belief> = s.beliefs[1..].iter().rev().cloned().collect();
    let third = merge(&s.beliefs[0], &s.keys[0], 10, &s.state, &config, &reversed);

    let bytes = serde_json::to_vec(&first).unwrap();
    assert_eq!(bytes, serde_json::to_vec(&second).unwrap());
    assert_eq!(bytes, serde_json::to_vec(&third).unwrap());
}

#[test]
fn test_merge_is_idempotent_at_fixed_point() {
    let s = scenario_a();
    let mut beliefs = s.beliefs.clone();
    for round in 1..=6 {
        beliefs = gossip_round(&s.keys, &beliefs, &s.state, round * 10);
    }

    let settled = merge(
        &beliefs[0],
        &s.keys[0],
        1_000,
        &s.state,
        &MergeConfig::default(),
        &[],
    );
    assert_eq!(settled, beliefs[0]);
    assert!(settled
        .get_order(&s.keys[0].public_key())
        .unwrap()
        .ptr_eq(beliefs[0].get_order(&s.keys[0].public_key()).unwrap()));
}

#[test]
fn test_confirmed_history_is_kept() {
    let keys: Vec<Keypair> = (0..3).map(Keypair::from_seed).collect();
    let state = TestState::new(&[(&keys[0], 40.0), (&keys[1], 35.0), (&keys[2], 25.0)]);

    let b1 = block(&keys[0], 1);
    let b2 = block(&keys[0], 2);
    let mine = order_of(&[&b1, &b2], 0)
        .with_consensus_points([2, 1, 1, 0])
        .unwrap();
    let before = mine.clone();
    let belief = Belief::create(&keys[0], mine);

    // a 60-stake majority proposing a history without B1
    let c1 = block(&keys[1], 1);
    let c2 = block(&keys[1], 2);
    let rival = order_of(&[&c1, &c2], 5);
    let incoming = [
        Belief::create(&keys[1], rival.clone()),
        Belief::create(&keys[2], rival),
    ];

    let result = merge(&belief, &keys[0], 500, &state, &MergeConfig::default(), &incoming);
    let after = own(&result, &keys[0]);

    assert!(before.check_consistent(after));
    assert_eq!(after.block(0), Some(&b1));
    assert!(after.consensus_point() >= 1);
    // the rival orders are still recorded
    assert_eq!(result.len(), 3);
}

#[test]
fn test_tie_break_prefers_lowest_block_id() {
    let keys: Vec<Keypair> = (0..3).map(Keypair::from_seed).collect();
    let state = TestState::new(&[(&keys[0], 50.0), (&keys[1], 50.0)]);

    let x = block(&keys[0], 1);
    let y = block(&keys[1], 1);
    let low = std::cmp::min(x.id(), y.id());

    let observer = Belief::create(&keys[2], Order::create());
    let forward = [
        Belief::create(&keys[0], order_of(&[&x], 0)),
        Belief::create(&keys[1], order_of(&[&y], 0)),
    ];
    let backward = [forward[1].clone(), forward[0].clone()];

    for incoming in [&forward, &backward] {
        let result = merge(&observer, &keys[2], 5, &state, &MergeConfig::default(), incoming);
        let mine = own(&result, &keys[2]);

        assert_eq!(mine.block_count(), 2);
        assert_eq!(mine.block(0).map(|b| b.id()), Some(low));
    }
}

#[test]
fn test_supermajority_wins_position() {
    let keys: Vec<Keypair> = (0..4).map(Keypair::from_seed).collect();
    let state = TestState::new(&[
        (&keys[0], 51.0),
        (&keys[1], 25.0),
        (&keys[2], 24.0),
        (&keys[3], 0.0),
    ]);

    let x = block(&keys[0], 3);
    let y = block(&keys[1], 1);
    let z = block(&keys[2], 2);

    let incoming = [
        Belief::create(&keys[0], order_of(&[&x], 0)),
        Belief::create(&keys[1], order_of(&[&y], 0)),
        Belief::create(&keys[2], order_of(&[&z], 0)),
    ];
    let observer = Belief::create(&keys[3], Order::create());

    let result = merge(&observer, &keys[3], 5, &state, &MergeConfig::default(), &incoming);
    let blocks: Vec<&SignedBlock> = own(&result, &keys[3]).blocks().iter().collect();

    // the rest follow in timestamp order
    assert_eq!(blocks, vec![&x, &y, &z]);
}

#[test]
fn test_rejected_blocks_are_not_appended() {
    let keys: Vec<Keypair> = (0..3).map(Keypair::from_seed).collect();
    let b1 = block(&keys[0], 1);
    let good = block(&keys[0], 2);
    let bad = block(&keys[2], 2);

    let mine = Belief::create(&keys[0], order_of(&[&b1, &good], 0));
    let theirs = Belief::create(&keys[1], order_of(&[&b1, &bad], 0));
    let config = MergeConfig::default();

    let accepting = TestState::new(&[(&keys[0], 60.0), (&keys[1], 40.0)]);
    let result = merge(&mine, &keys[0], 5, &accepting, &config, &[theirs.clone()]);
    assert_eq!(own(&result, &keys[0]).block_count(), 3);

    let rejecting = TestState::new(&[(&keys[0], 60.0), (&keys[1], 40.0)]).rejecting(&keys[2]);
    let result = merge(&mine, &keys[0], 5, &rejecting, &config, &[theirs]);
    let blocks: Vec<&SignedBlock> = own(&result, &keys[0]).blocks().iter().collect();
    assert_eq!(blocks, vec![&b1, &good]);
}

#[test]
fn test_unstaked_and_misfiled_orders_are_dropped() {
    let keys: Vec<Keypair> = (0..4).map(Keypair::from_seed).collect();
    let state = TestState::new(&[(&keys[0], 10.0), (&keys[1], 10.0), (&keys[2], 0.5)]);
    let mine = Belief::create(&keys[0], Order::create());

    // keys[2] is below the minimum stake and keys[3] has no entry at all
    let weak = Belief::create(&keys[2], order_of(&[&block(&keys[2], 1)], 0));
    let stranger = Belief::create(&keys[3], order_of(&[&block(&keys[3], 1)], 0));

    // an order signed by keys[3] filed under staked keys[1]
    let mut forged = Belief::initial().orders().clone();
    forged.insert(
        keys[1].public_key(),
        SignedOrder::sign(&keys[3], order_of(&[&block(&keys[3], 2)], 0)),
    );
    let forged = Belief::initial().with_orders(forged);

    let result = merge(
        &mine,
        &keys[0],
        5,
        &state,
        &MergeConfig::default(),
        &[weak, stranger, forged],
    );

    assert_eq!(result, mine);
    assert_eq!(result.len(), 1);
}

#[test]
fn test_keep_proposal_until_dwell_time() {
    let keys: Vec<Keypair> = (0..3).map(Keypair::from_seed).collect();
    let state = TestState::new(&[(&keys[0], 20.0), (&keys[1], 40.0), (&keys[2], 40.0)]);
    let config = MergeConfig::default().with_keep_proposal_time(100);

    let x = block(&keys[0], 1);
    let y = block(&keys[1], 1);
    let mine = order_of(&[&x], 10)
        .with_consensus_points([1, 1, 0, 0])
        .unwrap();
    let belief = Belief::create(&keys[0], mine.clone());
    let rival = order_of(&[&y], 10);
    let incoming = [
        Belief::create(&keys[1], rival.clone()),
        Belief::create(&keys[2], rival),
    ];

    // the vote puts Y first, contradicting our proposal over X
    let early = merge(&belief, &keys[0], 50, &state, &config, &incoming);
    assert!(own(&early, &keys[0]).consensus_equals(&mine));

    let late = merge(&belief, &keys[0], 110, &state, &config, &incoming);
    let adopted = own(&late, &keys[0]);
    assert_eq!(adopted.block(0), Some(&y));
    assert_eq!(adopted.timestamp(), 110);
}

#[test]
fn test_with_timestamp_reuses_context() {
    let s = scenario_a();
    let context = BeliefMerge::create(
        s.beliefs[0].clone(),
        &s.keys[0],
        10,
        &s.state,
        MergeConfig::default(),
    )
    .unwrap();

    let now = context.merge(&s.beliefs[1..]);
    let later = context.with_timestamp(20).merge(&s.beliefs[1..]);

    assert_eq!(own(&now, &s.keys[0]).timestamp(), 10);
    assert_eq!(own(&later, &s.keys[0]).timestamp(), 20);
    assert!(own(&now, &s.keys[0]).consensus_equals(own(&later, &s.keys[0])));
}
