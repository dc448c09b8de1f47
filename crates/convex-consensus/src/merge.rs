//! Belief merge: the stake-weighted vote at the heart of consensus.
//!
//! Each gossip round a peer folds every Belief it has received into its own,
//! keeping the latest Order per peer. It then votes over the Orders that
//! agree with its confirmed history:
//!
//! 1. The winning block sequence is found by narrowing the candidates one
//!    block position at a time, following stake.
//! 2. Blocks the winner does not contain yet are appended in timestamp order,
//!    so new transactions keep flowing while history converges.
//! 3. Each consensus level advances over the longest prefix that more than
//!    the threshold fraction of stake has reached at the level below.
//!
//! A merge is a pure function of its inputs. Irregular gossip (unstaked or
//! misfiled signers, future timestamps, rejected blocks) is filtered out,
//! never reported as an error.

use crate::belief::Belief;
use crate::block::{Block, SignedBlock};
use crate::config::MergeConfig;
use crate::error::{ConsensusError, Result};
use crate::message::BeliefPayload;
use crate::order::{common_prefix, Order, SignedOrder, BLOCK_COUNT_LEVEL, CONSENSUS_LEVELS};
use crate::signed::ValueHash;
use crate::state::{ConsensusState, StakeTable};
use convex_identity::{Keypair, PublicKey};
use im::{OrdMap, Vector};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Fraction of considered stake that wins a block position outright.
const MAJORITY: f64 = 0.5;

/// The consensus levels written by a vote, lowest first.
const VOTED_LEVELS: std::ops::Range<usize> = 1..CONSENSUS_LEVELS;

/// Levels a vote never moves backwards.
const CONFIRMED_LEVELS: std::ops::Range<usize> = 2..CONSENSUS_LEVELS;

/// Decides whether `new` should replace `old` as a peer's latest Order.
///
/// Newer timestamps win. On an exact tie the Order with the first strictly
/// higher point, checked from finality down to proposal, wins, and failing
/// that the one with strictly more blocks.
pub fn compare_orders(old: &Order, new: &Order) -> bool {
    match new.timestamp().cmp(&old.timestamp()) {
        Ordering::Greater => return true,
        Ordering::Less => return false,
        Ordering::Equal => {}
    }

    for level in VOTED_LEVELS.rev() {
        match new
            .consensus_point_at(level)
            .cmp(&old.consensus_point_at(level))
        {
            Ordering::Greater => return true,
            Ordering::Less => return false,
            Ordering::Equal => {}
        }
    }

    new.block_count() > old.block_count()
}

/// A distinct Order and the stake of every peer currently proposing it.
#[derive(Debug)]
struct Candidate<'a> {
    order: &'a Order,
    stake: f64,
}

/// Merge context for one peer and one round.
///
/// Construction snapshots the stake table, so a context can be reused for
/// several merges against the same ledger state.
#[derive(Debug)]
pub struct BeliefMerge<S> {
    belief: Belief,
    keypair: Keypair,
    public_key: PublicKey,
    timestamp: u64,
    state: S,
    stakes: StakeTable,
    config: MergeConfig,
}

impl<S: ConsensusState> BeliefMerge<S> {
    /// Creates a merge context for the owner of `keypair`.
    ///
    /// Fails with [`ConsensusError::InvalidConfig`] if `config` is out of
    /// range, and with [`ConsensusError::MissingOwnOrder`] if `belief` holds
    /// no Order for the owner.
    pub fn create(
        belief: Belief,
        keypair: &Keypair,
        timestamp: u64,
        state: S,
        config: MergeConfig,
    ) -> Result<Self> {
        config.validate()?;

        let public_key = keypair.public_key();
        if belief.get_order(&public_key).is_none() {
            return Err(ConsensusError::MissingOwnOrder(public_key));
        }

        let stakes = state.compute_stakes();
        Ok(Self {
            belief,
            keypair: keypair.clone(),
            public_key,
            timestamp,
            state,
            stakes,
            config,
        })
    }

    /// Returns a context for the same Belief at a different merge time.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the Belief merges start from.
    pub fn belief(&self) -> &Belief {
        &self.belief
    }

    /// Returns the merge timestamp.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Returns the stake snapshot used for voting.
    pub fn stakes(&self) -> &StakeTable {
        &self.stakes
    }

    /// Returns the merge configuration.
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merges every entry of `beliefs` into the initial Belief and votes.
    pub fn merge(&self, beliefs: &[Belief]) -> Belief {
        let entries = beliefs
            .iter()
            .flat_map(|belief| belief.iter().map(|(key, order)| (*key, order)));
        self.merge_entries(entries)
    }

    /// Merges the Orders of a single Belief.
    pub fn merge_orders(&self, belief: &Belief) -> Belief {
        self.merge(std::slice::from_ref(belief))
    }

    /// Merges decoded gossip payloads. A bare Order is filed under its signer.
    pub fn merge_payloads(&self, payloads: &[BeliefPayload]) -> Belief {
        let entries: Vec<(PublicKey, &SignedOrder)> = payloads
            .iter()
            .flat_map(|payload| match payload {
                BeliefPayload::Order(order) => vec![(order.signer(), order)],
                BeliefPayload::Belief(belief) => {
                    belief.iter().map(|(key, order)| (*key, order)).collect()
                }
            })
            .collect();
        self.merge_entries(entries)
    }

    fn merge_entries<'a>(
        &self,
        entries: impl IntoIterator<Item = (PublicKey, &'a SignedOrder)>,
    ) -> Belief {
        let accumulated = self.accumulate(entries);

        // Checked in `create`; an own Order is never removed by accumulation.
        let Some(mine) = accumulated.get(&self.public_key).cloned() else {
            return self.belief.clone();
        };

        let Some(proposed) = self.vote(&accumulated, mine.value()) else {
            tracing::debug!(
                peer = %self.public_key.short_id(),
                "no stake-weighted winner, keeping belief"
            );
            return self.belief.clone();
        };

        let orders = match self.adopt(mine.value(), proposed) {
            Some(order) => accumulated.update(self.public_key, order),
            None => accumulated,
        };
        self.belief.with_orders(orders)
    }

    /// Folds incoming entries into the initial Belief's Orders.
    fn accumulate<'a>(
        &self,
        entries: impl IntoIterator<Item = (PublicKey, &'a SignedOrder)>,
    ) -> OrdMap<PublicKey, SignedOrder> {
        let minimum = self.config.minimum_effective_stake;
        let mut orders = self.belief.orders().clone();

        for (key, signed) in entries {
            if signed.signer() != key {
                tracing::trace!(key = %key.short_id(), "skipping misfiled order");
                continue;
            }
            match self.stakes.stake(&key) {
                Some(stake) if stake >= minimum => {}
                _ => {
                    tracing::trace!(key = %key.short_id(), "skipping order from unstaked peer");
                    continue;
                }
            }
            if signed.value().timestamp() > self.timestamp {
                tracing::trace!(
                    key = %key.short_id(),
                    order_ts = signed.value().timestamp(),
                    merge_ts = self.timestamp,
                    "skipping order from the future"
                );
                continue;
            }

            let replace = match orders.get(&key) {
                None => true,
                Some(old) => !old.ptr_eq(signed) && compare_orders(old.value(), signed.value()),
            };
            if replace {
                orders.insert(key, signed.clone());
            }
        }

        orders
    }

    /// Votes over the accumulated Orders, returning the Order this peer
    /// would propose next, or `None` if no stake backs any candidate.
    fn vote(&self, orders: &OrdMap<PublicKey, SignedOrder>, mine: &Order) -> Option<Order> {
        let minimum = self.config.minimum_effective_stake;

        let mut weighted: BTreeMap<ValueHash, Candidate<'_>> = BTreeMap::new();
        for (key, signed) in orders.iter() {
            let order = signed.value();
            if !mine.check_consistent(order) {
                continue;
            }
            let stake = self.stakes.effective_stake(key, minimum);
            if stake <= 0.0 {
                continue;
            }
            weighted
                .entry(signed.value_hash())
                .or_insert(Candidate { order, stake: 0.0 })
                .stake += stake;
        }

        let candidates: Vec<Candidate<'_>> = weighted.into_values().collect();
        let considered: f64 = candidates.iter().map(|c| c.stake).sum();
        if candidates.is_empty() || considered <= 0.0 {
            return None;
        }

        let settled = mine.consensus_point() as usize;
        let mut blocks = winning_blocks(&candidates, settled);
        let fresh = self.new_blocks(&candidates, &blocks, settled);
        let fresh_count = fresh.len();
        blocks.extend(fresh);

        let points = self.promote(&candidates, &blocks, mine);

        tracing::debug!(
            peer = %self.public_key.short_id(),
            candidates = candidates.len(),
            blocks = blocks.len(),
            fresh = fresh_count,
            ?points,
            "voted on block order"
        );

        match mine.with_blocks(blocks).with_consensus_points(points) {
            Ok(order) => Some(order),
            Err(e) => {
                tracing::warn!(error = %e, "vote produced invalid consensus points");
                None
            }
        }
    }

    /// Collects blocks past the settled prefix that the winner lacks,
    /// deduplicated, validated and sorted by timestamp.
    fn new_blocks(
        &self,
        candidates: &[Candidate<'_>],
        winner: &Vector<SignedBlock>,
        settled: usize,
    ) -> Vec<SignedBlock> {
        let known: HashSet<ValueHash> = winner.iter().map(|b| b.id()).collect();

        let mut unseen: BTreeMap<ValueHash, &SignedBlock> = BTreeMap::new();
        for candidate in candidates {
            for block in candidate.order.blocks().iter().skip(settled) {
                let id = block.id();
                if !known.contains(&id) {
                    unseen.entry(id).or_insert(block);
                }
            }
        }

        let mut fresh: Vec<SignedBlock> = unseen
            .into_values()
            .filter(|block| match self.state.check_block(block) {
                Ok(()) => true,
                Err(reason) => {
                    tracing::debug!(block = %block.id(), %reason, "dropping rejected block");
                    false
                }
            })
            .cloned()
            .collect();
        fresh.sort_by(Block::timestamp_order);
        fresh
    }

    /// Computes the consensus points of the winning sequence.
    fn promote(
        &self,
        candidates: &[Candidate<'_>],
        winner: &Vector<SignedBlock>,
        mine: &Order,
    ) -> [u64; CONSENSUS_LEVELS] {
        let total = self
            .stakes
            .total_effective(self.config.minimum_effective_stake);
        let threshold = total * self.config.consensus_threshold;

        let prefixes: Vec<u64> = candidates
            .iter()
            .map(|c| common_prefix(c.order.blocks(), winner) as u64)
            .collect();

        let mut points = [0u64; CONSENSUS_LEVELS];
        points[BLOCK_COUNT_LEVEL] = winner.len() as u64;

        for level in VOTED_LEVELS {
            let mut ranked: Vec<(u64, f64)> = candidates
                .iter()
                .zip(&prefixes)
                .map(|(c, prefix)| ((*prefix).min(c.order.consensus_point_at(level - 1)), c.stake))
                .collect();
            ranked.sort_by(|a, b| b.0.cmp(&a.0));

            let mut accumulated = 0.0;
            let mut agreed = 0;
            for (point, stake) in ranked {
                accumulated += stake;
                if accumulated > threshold {
                    agreed = point;
                    break;
                }
            }
            points[level] = agreed.min(points[level - 1]);
        }

        // Consensus and finality only move forward. A level that would come
        // out lower than before, for example because stake behind it dropped
        // below the threshold, keeps its previous value rather than the
        // min(prefix, point below) the tally produced.
        for level in CONFIRMED_LEVELS {
            points[level] = points[level].max(mine.consensus_point_at(level));
        }
        for level in CONFIRMED_LEVELS.rev() {
            points[level - 1] = points[level - 1].max(points[level]);
        }

        points
    }

    /// Decides whether to replace the own Order with `proposed`, returning
    /// the newly signed Order if so.
    fn adopt(&self, mine: &Order, proposed: Order) -> Option<SignedOrder> {
        if proposed.consensus_equals(mine) {
            return None;
        }

        let consistent = proposed.common_prefix_length(mine) >= mine.proposal_point();
        let expired =
            self.timestamp >= mine.timestamp().saturating_add(self.config.keep_proposal_time);
        if !consistent && !expired {
            tracing::debug!(
                peer = %self.public_key.short_id(),
                proposal = mine.proposal_point(),
                "keeping own proposal against vote"
            );
            return None;
        }

        let order = proposed.with_timestamp(self.timestamp);
        tracing::debug!(
            peer = %self.public_key.short_id(),
            points = ?order.consensus_points(),
            ts = self.timestamp,
            "adopting voted order"
        );
        Some(SignedOrder::sign(&self.keypair, order))
    }
}

/// Narrows candidates block by block from `start`, following stake.
fn winning_blocks(candidates: &[Candidate<'_>], start: usize) -> Vector<SignedBlock> {
    let mut remaining: Vec<&Candidate<'_>> = candidates.iter().collect();
    let mut position = start;

    loop {
        let first = match remaining.as_slice() {
            [] => return Vector::new(),
            [only] => return only.order.blocks().clone(),
            [first, ..] => *first,
        };

        let considered: f64 = remaining.iter().map(|c| c.stake).sum();
        let mut groups: BTreeMap<ValueHash, (f64, Vec<&Candidate<'_>>)> = BTreeMap::new();
        for candidate in &remaining {
            if let Some(block) = candidate.order.block(position) {
                let group = groups.entry(block.id()).or_insert((0.0, Vec::new()));
                group.0 += candidate.stake;
                group.1.push(*candidate);
            }
        }

        // Ids iterate in ascending order, so a strict comparison keeps the
        // lowest id among equally staked groups.
        let mut best: Option<(f64, Vec<&Candidate<'_>>)> = None;
        for (stake, members) in groups.into_values() {
            if stake > considered * MAJORITY {
                best = Some((stake, members));
                break;
            }
            if best.as_ref().map_or(true, |(top, _)| stake > *top) {
                best = Some((stake, members));
            }
        }

        match best {
            Some((_, members)) => remaining = members,
            None => return first.order.blocks().take(position),
        }
        position += 1;
    }
}
