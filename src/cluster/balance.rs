//! Weighted slot rebalance planning.
//!
//! The planner looks at how many slots every master owns, works out how many
//! it should own given its weight, and pairs the biggest donors with the
//! biggest receivers until every master sits on its target. The result only
//! says *how many* slots go from where to where; picking concrete slot
//! numbers and driving `CLUSTER SETSLOT` is left to the executor.
//!
//! # Example
//!
//! ```
//! use redtrib::cluster::{balance_plan, ClusterNodes};
//!
//! let nodes = ClusterNodes::parse(
//!     "a 127.0.0.1:7000 master - 0 0 1 connected 0-16383\n\
//!      b 127.0.0.1:7001 master - 0 0 2 connected\n",
//! )
//! .unwrap();
//!
//! let plan = balance_plan(nodes.nodes()).unwrap();
//! assert_eq!(plan.len(), 1);
//! assert_eq!(plan[0].source.node_id(), "a");
//! assert_eq!(plan[0].destination.node_id(), "b");
//! assert_eq!(plan[0].slot_count, 8192);
//! ```

use super::node::ClusterNode;
use serde::{Serialize, Serializer};
use std::cmp::Reverse;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Slack added to each weighted share before flooring it.
const SHARE_EPSILON: f64 = 1e-6;

/// Reasons a plan cannot be computed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("No masters to balance")]
    NoMasters,

    #[error("Total weight of all masters is zero")]
    ZeroWeight,

    #[error("Invalid weight {weight} for node {node_id}")]
    InvalidWeight { node_id: String, weight: f64 },
}

/// Decides what share of the slot space a master should end up with.
///
/// Shares are relative: a node weighted `2.0` gets twice the slots of a node
/// weighted `1.0`. A weight of `0.0` drains the node.
pub trait Balancer {
    fn weight(&self, node: &ClusterNode) -> f64;
}

/// Every master weighs the same.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformBalancer;

impl Balancer for UniformBalancer {
    fn weight(&self, _node: &ClusterNode) -> f64 {
        1.0
    }
}

/// Weights looked up by node id first, then by `host:port`.
#[derive(Debug, Clone)]
pub struct WeightTable {
    default_weight: f64,
    weights: HashMap<String, f64>,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl WeightTable {
    pub fn new(default_weight: f64) -> Self {
        Self {
            default_weight,
            weights: HashMap::new(),
        }
    }

    /// Set the weight for a node id or a `host:port` address.
    pub fn with_weight(mut self, key: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(key.into(), weight);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, weight: f64) {
        self.weights.insert(key.into(), weight);
    }
}

impl Balancer for WeightTable {
    fn weight(&self, node: &ClusterNode) -> f64 {
        self.weights
            .get(node.node_id())
            .or_else(|| self.weights.get(&node.addr()))
            .copied()
            .unwrap_or(self.default_weight)
    }
}

fn serialize_node_id<S: Serializer>(node: &&ClusterNode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(node.node_id())
}

/// Move `slot_count` slots from `source` to `destination`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Migration<'a> {
    #[serde(serialize_with = "serialize_node_id")]
    pub source: &'a ClusterNode,
    #[serde(serialize_with = "serialize_node_id")]
    pub destination: &'a ClusterNode,
    pub slot_count: usize,
}

/// Where one master stands before and after the plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeAllocation<'a> {
    #[serde(rename = "node_id", serialize_with = "serialize_node_id")]
    pub node: &'a ClusterNode,
    pub weight: f64,
    /// Slots owned now
    pub origin: usize,
    /// Floor of the weighted share
    pub target: usize,
    /// Slots owned once the plan has run; `target` or `target + 1`
    pub planned: usize,
}

/// A plan together with the per-master numbers it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceReport<'a> {
    pub allocations: Vec<NodeAllocation<'a>>,
    pub plan: Vec<Migration<'a>>,
}

impl BalanceReport<'_> {
    /// Total number of slots the plan moves.
    pub fn slots_moved(&self) -> usize {
        self.plan.iter().map(|m| m.slot_count).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.plan.is_empty()
    }
}

/// Plan with every master weighted equally.
pub fn balance_plan<'a, I>(nodes: I) -> Result<Vec<Migration<'a>>, PlanError>
where
    I: IntoIterator<Item = &'a ClusterNode>,
{
    base_balance_plan(nodes, &UniformBalancer)
}

/// Compute the migrations that move the masters among `nodes` to the
/// distribution `balancer` asks for. Slaves are ignored.
pub fn base_balance_plan<'a, I, B>(nodes: I, balancer: &B) -> Result<Vec<Migration<'a>>, PlanError>
where
    I: IntoIterator<Item = &'a ClusterNode>,
    B: Balancer + ?Sized,
{
    balance_report(nodes, balancer).map(|report| report.plan)
}

/// Like [`base_balance_plan`], keeping the per-master breakdown.
pub fn balance_report<'a, I, B>(nodes: I, balancer: &B) -> Result<BalanceReport<'a>, PlanError>
where
    I: IntoIterator<Item = &'a ClusterNode>,
    B: Balancer + ?Sized,
{
    let masters: Vec<&ClusterNode> = nodes.into_iter().filter(|n| n.is_master()).collect();
    if masters.is_empty() {
        return Err(PlanError::NoMasters);
    }
    for node in masters.iter().filter(|n| n.is_migrating()) {
        warn!(node_id = %node.node_id(), "planning over a master with slots in migration");
    }

    let origin: Vec<i64> = masters.iter().map(|n| n.slot_count() as i64).collect();
    let total_slots: i64 = origin.iter().sum();

    let weights = masters
        .iter()
        .map(|node| {
            let weight = balancer.weight(node);
            if weight.is_finite() && weight >= 0.0 {
                Ok(weight)
            } else {
                Err(PlanError::InvalidWeight {
                    node_id: node.node_id().to_string(),
                    weight,
                })
            }
        })
        .collect::<Result<Vec<f64>, _>>()?;
    let total_weight: f64 = weights.iter().sum();
    if total_weight <= 0.0 {
        return Err(PlanError::ZeroWeight);
    }

    // A share that is mathematically whole may land just below it in floats.
    let mut target: Vec<i64> = weights
        .iter()
        .map(|w| (total_slots as f64 * w / total_weight + SHARE_EPSILON).floor() as i64)
        .collect();
    // float rounding can push a share past an integer boundary
    while target.iter().sum::<i64>() > total_slots {
        let largest = (0..target.len()).max_by_key(|&i| target[i]).unwrap_or(0);
        target[largest] -= 1;
    }

    let frag_slots = (total_slots - target.iter().sum::<i64>()) as usize;
    let mut delta: Vec<i64> = target.iter().zip(&origin).map(|(t, o)| t - o).collect();

    // Rounding remainder: at most one slot per node, shrinking nodes first.
    // Zero-weight nodes are drained completely and never absorb any.
    let mut order: Vec<usize> = (0..masters.len()).filter(|&i| weights[i] > 0.0).collect();
    order.sort_by_key(|&i| (delta[i] >= 0, delta[i], Reverse(origin[i]), masters[i].node_id()));
    for &i in order.iter().cycle().take(frag_slots) {
        delta[i] += 1;
    }

    let planned: Vec<i64> = origin.iter().zip(&delta).map(|(o, d)| o + d).collect();

    let mut moving: Vec<(usize, i64)> = delta
        .iter()
        .enumerate()
        .filter(|(_, d)| **d != 0)
        .map(|(i, d)| (i, *d))
        .collect();
    moving.sort_by_key(|&(i, d)| (d, masters[i].node_id()));

    let mut plan = Vec::new();
    let mut mig_out = 0;
    let mut mig_in = moving.len().saturating_sub(1);
    // Remaining deltas between the pointers always sum to zero, so the left
    // end is a donor and the right end a receiver.
    while mig_out < mig_in {
        let (donor, give) = moving[mig_out];
        let (receiver, take) = moving[mig_in];
        let amount = (-give).min(take);

        plan.push(Migration {
            source: masters[donor],
            destination: masters[receiver],
            slot_count: amount as usize,
        });
        debug!(
            from = %masters[donor].node_id(),
            to = %masters[receiver].node_id(),
            slots = amount,
            "planned migration"
        );

        moving[mig_out].1 += amount;
        moving[mig_in].1 -= amount;
        if moving[mig_out].1 == 0 {
            mig_out += 1;
        }
        if moving[mig_in].1 == 0 {
            mig_in -= 1;
        }
    }

    let allocations = masters
        .iter()
        .enumerate()
        .map(|(i, node)| NodeAllocation {
            node,
            weight: weights[i],
            origin: origin[i] as usize,
            target: target[i] as usize,
            planned: planned[i] as usize,
        })
        .collect();

    let report = BalanceReport { allocations, plan };
    info!(
        masters = masters.len(),
        total_slots,
        migrations = report.plan.len(),
        slots_moved = report.slots_moved(),
        "computed balance plan"
    );

    Ok(report)
}
