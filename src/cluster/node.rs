//! Parsed `CLUSTER NODES` output.
//!
//! Every line of the reply describes one member:
//!
//! ```text
//! <id> <ip:port@cport[,hostname]> <flags> <master> <ping-sent> <pong-recv> <config-epoch> <link-state> <slot> <slot> ...
//! ```
//!
//! A [`ClusterNode`] is built once per snapshot and never mutated; a fresh
//! `CLUSTER NODES` call produces a fresh [`ClusterNodes`].

use super::types::{compress_slots, LinkState, NodeRole, ParseError, SlotRange, SLOT_COUNT};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Number of fixed fields before the slot tokens.
const FIXED_FIELDS: usize = 8;

/// Offset between the client port and the cluster bus port when a line does
/// not spell the bus port out.
const CLUSTER_BUS_PORT_OFFSET: u16 = 10000;

/// One cluster member as reported by `CLUSTER NODES`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterNode {
    node_id: String,
    host: String,
    port: u16,
    cluster_bus_port: u16,
    hostname: Option<String>,
    flags: Vec<String>,
    role: NodeRole,
    master_id: Option<String>,
    ping_sent: u64,
    pong_recv: u64,
    config_epoch: u64,
    link_state: LinkState,
    assigned_slots: BTreeSet<u16>,
    migrating: bool,
}

impl ClusterNode {
    /// Parse a single line from `CLUSTER NODES` output.
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < FIXED_FIELDS {
            return Err(ParseError::InvalidClusterNodes(format!(
                "expected at least {} fields, got {}: {}",
                FIXED_FIELDS,
                parts.len(),
                line
            )));
        }

        let node_id = parts[0].to_string();
        let (host, port, cluster_bus_port, hostname) = parse_address(parts[1])?;

        let flags: Vec<String> = parts[2].split(',').map(str::to_string).collect();
        if flags.iter().any(String::is_empty) {
            return Err(ParseError::InvalidFlags(parts[2].to_string()));
        }
        // handshake/noflags lines carry no role yet
        let role = if flags.iter().any(|f| f == "master") {
            NodeRole::Master
        } else if flags.iter().any(|f| f == "slave") {
            NodeRole::Slave
        } else {
            NodeRole::Unknown
        };

        let master_id = match parts[3] {
            "-" => None,
            id => Some(id.to_string()),
        };

        let ping_sent = parse_number(parts[4], "ping sent")?;
        let pong_recv = parse_number(parts[5], "pong received")?;
        let config_epoch = parse_number(parts[6], "config epoch")?;
        let link_state = parts[7].parse()?;

        let mut assigned_slots = BTreeSet::new();
        let mut migrating = false;
        for token in &parts[FIXED_FIELDS..] {
            // [slot->-id] / [slot-<-id]: mid-migration, owned by nobody yet
            if token.starts_with('[') && token.ends_with(']') {
                migrating = true;
                continue;
            }
            assigned_slots.extend(SlotRange::parse(token)?.iter());
        }

        if migrating {
            debug!(node_id = %node_id, "node has slots in migration");
        }

        Ok(Self {
            node_id,
            host,
            port,
            cluster_bus_port,
            hostname,
            flags,
            role,
            master_id,
            ping_sent,
            pong_recv,
            config_epoch,
            link_state,
            assigned_slots,
            migrating,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, with IPv6 hosts bracketed.
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn cluster_bus_port(&self) -> u16 {
        self.cluster_bus_port
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Raw flags, `myself` included.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn is_master(&self) -> bool {
        self.role == NodeRole::Master
    }

    pub fn is_slave(&self) -> bool {
        self.role == NodeRole::Slave
    }

    pub fn is_myself(&self) -> bool {
        self.has_flag("myself")
    }

    /// Flagged as failing or possibly failing.
    pub fn is_failing(&self) -> bool {
        self.has_flag("fail") || self.has_flag("fail?") || self.has_flag("pfail")
    }

    pub fn master_id(&self) -> Option<&str> {
        self.master_id.as_deref()
    }

    pub fn ping_sent(&self) -> u64 {
        self.ping_sent
    }

    pub fn pong_recv(&self) -> u64 {
        self.pong_recv
    }

    pub fn config_epoch(&self) -> u64 {
        self.config_epoch
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub fn assigned_slots(&self) -> &BTreeSet<u16> {
        &self.assigned_slots
    }

    pub fn slot_count(&self) -> usize {
        self.assigned_slots.len()
    }

    pub fn slot_ranges(&self) -> Vec<SlotRange> {
        compress_slots(self.assigned_slots.iter().copied())
    }

    /// True when the line carried importing/migrating markers.
    pub fn is_migrating(&self) -> bool {
        self.migrating
    }
}

/// Split `ip:port[@cport][,hostname]`.
fn parse_address(field: &str) -> Result<(String, u16, u16, Option<String>), ParseError> {
    let invalid = || ParseError::InvalidAddress(field.to_string());

    let (addr, hostname) = match field.split_once(',') {
        Some((addr, name)) if !name.is_empty() => (addr, Some(name.to_string())),
        Some((addr, _)) => (addr, None),
        None => (field, None),
    };
    let (ip_port, bus) = match addr.split_once('@') {
        Some((ip_port, bus)) => (ip_port, Some(bus)),
        None => (addr, None),
    };

    let (host, port) = ip_port.rsplit_once(':').ok_or_else(invalid)?;
    let port: u16 = port.parse().map_err(|_| invalid())?;
    let cluster_bus_port = match bus {
        Some(bus) => bus.parse().map_err(|_| invalid())?,
        None => port.saturating_add(CLUSTER_BUS_PORT_OFFSET),
    };

    Ok((host.to_string(), port, cluster_bus_port, hostname))
}

fn parse_number(value: &str, field: &'static str) -> Result<u64, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// Parsed output of the `CLUSTER NODES` command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterNodes {
    nodes: Vec<ClusterNode>,
}

impl ClusterNodes {
    /// Parse the whole reply; blank lines are skipped, any bad line fails the lot.
    pub fn parse(output: &str) -> Result<Self, ParseError> {
        let nodes = output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(ClusterNode::parse_line)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn masters(&self) -> Vec<&ClusterNode> {
        self.nodes.iter().filter(|n| n.is_master()).collect()
    }

    pub fn slaves(&self) -> Vec<&ClusterNode> {
        self.nodes.iter().filter(|n| n.is_slave()).collect()
    }

    /// The node that answered the command.
    pub fn myself(&self) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.is_myself())
    }

    pub fn get(&self, node_id: &str) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    pub fn slaves_of(&self, master_id: &str) -> Vec<&ClusterNode> {
        self.nodes
            .iter()
            .filter(|n| n.master_id.as_deref() == Some(master_id))
            .collect()
    }

    pub fn total_assigned_slots(&self) -> usize {
        self.masters().iter().map(|m| m.slot_count()).sum()
    }

    pub fn all_slots_assigned(&self) -> bool {
        self.total_assigned_slots() == usize::from(SLOT_COUNT)
    }

    /// Check that no slot is owned by two masters.
    pub fn validate(&self) -> Result<(), ParseError> {
        let mut owners: HashMap<u16, &str> = HashMap::new();
        for master in self.masters() {
            for &slot in master.assigned_slots() {
                if let Some(first) = owners.insert(slot, master.node_id()) {
                    return Err(ParseError::DuplicateSlot {
                        slot,
                        first: first.to_string(),
                        second: master.node_id().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
