//! Planner tests over parsed `CLUSTER NODES` snapshots

use proptest::prelude::*;
use redtrib::cluster::{
    balance_plan, balance_report, base_balance_plan, ClusterNode, ClusterNodes, Migration,
    PlanError, UniformBalancer, WeightTable, SLOT_COUNT,
};
use std::collections::HashMap;

fn node_id(i: usize) -> String {
    format!("{:040x}", i + 1)
}

/// Masters owning `counts[i]` consecutive slots each, starting at slot 0.
fn masters_with(counts: &[usize]) -> Vec<ClusterNode> {
    let mut next = 0usize;
    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let slots = if count == 0 {
                String::new()
            } else {
                format!("{}-{}", next, next + count - 1)
            };
            next += count;
            ClusterNode::parse_line(&format!(
                "{} 127.0.0.1:{}@{} master - 0 0 {} connected {}",
                node_id(i),
                7000 + i,
                17000 + i,
                i + 1,
                slots
            ))
            .unwrap()
        })
        .collect()
}

/// Apply `plan` in order, checking no donor ever gives more than it holds.
fn apply(nodes: &[ClusterNode], plan: &[Migration<'_>]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = nodes
        .iter()
        .filter(|n| n.is_master())
        .map(|n| (n.node_id().to_string(), n.slot_count()))
        .collect();
    for m in plan {
        assert!(m.slot_count > 0, "empty migration in plan");
        assert_ne!(m.source.node_id(), m.destination.node_id());
        let held = counts[m.source.node_id()];
        assert!(held >= m.slot_count, "{} over-donates", m.source.node_id());
        *counts.get_mut(m.source.node_id()).unwrap() -= m.slot_count;
        *counts.get_mut(m.destination.node_id()).unwrap() += m.slot_count;
    }
    counts
}

#[test]
fn test_balanced_cluster_needs_no_moves() {
    let nodes = masters_with(&[5461, 5462, 5461]);
    assert!(balance_plan(&nodes).unwrap().is_empty());
}

#[test]
fn test_one_full_two_empty() {
    let nodes = masters_with(&[16384, 0, 0]);
    let plan = balance_plan(&nodes).unwrap();

    assert_eq!(plan.len(), 2);
    assert!(plan.iter().all(|m| m.source.node_id() == node_id(0)));
    let after = apply(&nodes, &plan);
    assert_eq!(after.values().sum::<usize>(), usize::from(SLOT_COUNT));
    for count in after.values() {
        assert!((5461..=5462).contains(count), "got {}", count);
    }
}

#[test]
fn test_from_cluster_nodes_output() {
    let output = "\
aaaa 10.0.0.1:7000@17000 myself,master - 0 0 1 connected 0-16383
bbbb 10.0.0.2:7000@17000 master - 0 1426238316232 2 connected
cccc 10.0.0.3:7000@17000 master - 0 1426238316232 3 connected
dddd 10.0.0.4:7000@17000 slave aaaa 0 1426238316232 1 connected
eeee 10.0.0.5:7000@17000 master - 0 1426238316232 4 connected
";
    let nodes = ClusterNodes::parse(output).unwrap();
    let weights = WeightTable::default()
        .with_weight("eeee", 0.0)
        .with_weight("10.0.0.2:7000", 3.0);
    let report = balance_report(nodes.nodes(), &weights).unwrap();

    // bbbb gets three shares, cccc one, aaaa one, eeee none.
    let planned: HashMap<&str, usize> = report
        .allocations
        .iter()
        .map(|a| (a.node.node_id(), a.planned))
        .collect();
    assert_eq!(planned.len(), 4);
    assert_eq!(planned["eeee"], 0);
    assert!((9830..=9831).contains(&planned["bbbb"]));
    assert!((3276..=3277).contains(&planned["cccc"]));
    assert!((3276..=3277).contains(&planned["aaaa"]));
    assert_eq!(planned.values().sum::<usize>(), usize::from(SLOT_COUNT));

    let after = apply(nodes.nodes(), &report.plan);
    for (id, count) in after {
        assert_eq!(count, planned[id.as_str()]);
    }
}

#[test]
fn test_plan_skips_node_still_in_handshake() {
    let output = "\
aaaa 127.0.0.1:7000@17000 myself,master - 0 0 1 connected 0-16383
bbbb 127.0.0.1:7001@17001 master - 0 0 2 connected
cccc 127.0.0.1:7002@17002 handshake - 0 0 0 disconnected
";
    let nodes = ClusterNodes::parse(output).unwrap();
    let report = balance_report(nodes.nodes(), &UniformBalancer).unwrap();

    assert_eq!(report.allocations.len(), 2);
    assert!(report.allocations.iter().all(|a| a.node.node_id() != "cccc"));
    assert_eq!(report.plan.len(), 1);
    assert_eq!(report.plan[0].source.node_id(), "aaaa");
    assert_eq!(report.plan[0].destination.node_id(), "bbbb");
    assert_eq!(report.plan[0].slot_count, 8192);
}

#[test]
fn test_drain_node() {
    let nodes = masters_with(&[4096, 4096, 4096, 4096]);
    let weights = WeightTable::default().with_weight(node_id(3), 0.0);
    let plan = base_balance_plan(&nodes, &weights).unwrap();

    assert!(plan.iter().all(|m| m.source.node_id() == node_id(3)));
    assert_eq!(plan.iter().map(|m| m.slot_count).sum::<usize>(), 4096);
    let after = apply(&nodes, &plan);
    assert_eq!(after[&node_id(3)], 0);
}

#[test]
fn test_errors() {
    let slave = ClusterNode::parse_line("aaaa 127.0.0.1:7000 slave bbbb 0 0 1 connected").unwrap();
    assert_eq!(
        balance_plan(std::slice::from_ref(&slave)).unwrap_err(),
        PlanError::NoMasters
    );

    let nodes = masters_with(&[100, 100]);
    assert_eq!(
        base_balance_plan(&nodes, &WeightTable::new(0.0)).unwrap_err(),
        PlanError::ZeroWeight
    );
    assert!(matches!(
        base_balance_plan(&nodes, &WeightTable::default().with_weight(node_id(1), -1.0)),
        Err(PlanError::InvalidWeight { .. })
    ));
}

fn cluster_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<u32>)> {
    (1usize..8)
        .prop_flat_map(|n| {
            (
                prop::collection::vec(0usize..2048, n),
                prop::collection::vec(0u32..5, n),
            )
        })
        .prop_filter("at least one positive weight", |(_, w)| w.iter().any(|&w| w > 0))
}

proptest! {
    #[test]
    fn prop_plan_conserves_slots((counts, weights) in cluster_strategy()) {
        let nodes = masters_with(&counts);
        let mut table = WeightTable::new(1.0);
        for (i, w) in weights.iter().enumerate() {
            table.insert(node_id(i), f64::from(*w));
        }

        let report = balance_report(&nodes, &table).unwrap();
        let after = apply(&nodes, &report.plan);

        let total: usize = counts.iter().sum();
        prop_assert_eq!(after.values().sum::<usize>(), total);
        for alloc in &report.allocations {
            prop_assert!(alloc.planned == alloc.target || alloc.planned == alloc.target + 1);
            prop_assert_eq!(after[alloc.node.node_id()], alloc.planned);
        }
    }

    #[test]
    fn prop_uniform_plan_is_within_one_slot(counts in prop::collection::vec(0usize..2300, 1..8)) {
        let nodes = masters_with(&counts);
        let report = balance_report(&nodes, &UniformBalancer).unwrap();
        let after = apply(&nodes, &report.plan);

        let total: usize = counts.iter().sum();
        let share = total / counts.len();
        for count in after.values() {
            prop_assert!(*count == share || *count == share + 1);
        }
        // Each migration settles at least one node, so the plan stays short.
        prop_assert!(report.plan.len() < counts.len().max(1));
    }
}
