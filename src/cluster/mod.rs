//! Cluster topology and rebalance planning.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  CLUSTER NODES   ┌──────────────┐
//! │    Talker    │ ───────────────▶ │ ClusterNodes │
//! └──────────────┘   (bulk string)  └──────┬───────┘
//!                                          │ masters + weights
//!                                          ▼
//!                                   ┌──────────────┐
//!                                   │   Balancer   │ ──▶ Vec<Migration>
//!                                   └──────────────┘
//! ```
//!
//! - `node`: `CLUSTER NODES` parsing into immutable [`ClusterNode`] snapshots
//! - `info`: `CLUSTER INFO` parsing
//! - `balance`: weight policies and the migration planner

mod balance;
mod info;
mod node;
mod types;

pub use balance::{
    balance_plan, balance_report, base_balance_plan, BalanceReport, Balancer, Migration,
    NodeAllocation, PlanError, UniformBalancer, WeightTable,
};
pub use info::{ClusterInfo, ClusterState};
pub use node::{ClusterNode, ClusterNodes};
pub use types::{compress_slots, LinkState, NodeRole, ParseError, SlotRange, MAX_SLOT, SLOT_COUNT};
