//! Parsed `CLUSTER INFO` output.

use super::types::{ParseError, SLOT_COUNT};
use serde::Serialize;
use std::collections::BTreeMap;

/// Cluster health as reported by `cluster_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterState {
    Ok,
    Fail,
}

impl std::str::FromStr for ClusterState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "fail" => Ok(Self::Fail),
            _ => Err(ParseError::InvalidClusterInfo(format!(
                "unknown cluster state: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// `key:value` report of `CLUSTER INFO`.
///
/// Only `cluster_state` is mandatory. Counters are optional because older
/// servers omit some of them, but a counter that is present must be numeric.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterInfo {
    state: ClusterState,
    slots_assigned: Option<u64>,
    slots_ok: Option<u64>,
    slots_pfail: Option<u64>,
    slots_fail: Option<u64>,
    known_nodes: Option<u64>,
    size: Option<u64>,
    current_epoch: Option<u64>,
    raw: BTreeMap<String, String>,
}

impl ClusterInfo {
    pub fn parse(info: &str) -> Result<Self, ParseError> {
        let mut raw = BTreeMap::new();
        for line in info.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::InvalidClusterInfo(line.to_string()))?;
            raw.insert(key.to_string(), value.to_string());
        }

        let state = raw
            .get("cluster_state")
            .ok_or_else(|| ParseError::MissingField("cluster_state".to_string()))?
            .parse()?;

        let counter = |key: &str| -> Result<Option<u64>, ParseError> {
            raw.get(key)
                .map(|v| {
                    v.parse().map_err(|_| {
                        ParseError::InvalidClusterInfo(format!("invalid {} value: {}", key, v))
                    })
                })
                .transpose()
        };

        Ok(Self {
            state,
            slots_assigned: counter("cluster_slots_assigned")?,
            slots_ok: counter("cluster_slots_ok")?,
            slots_pfail: counter("cluster_slots_pfail")?,
            slots_fail: counter("cluster_slots_fail")?,
            known_nodes: counter("cluster_known_nodes")?,
            size: counter("cluster_size")?,
            current_epoch: counter("cluster_current_epoch")?,
            raw,
        })
    }

    pub fn state(&self) -> ClusterState {
        self.state
    }

    pub fn slots_assigned(&self) -> Option<u64> {
        self.slots_assigned
    }

    pub fn slots_ok(&self) -> Option<u64> {
        self.slots_ok
    }

    pub fn slots_pfail(&self) -> Option<u64> {
        self.slots_pfail
    }

    pub fn slots_fail(&self) -> Option<u64> {
        self.slots_fail
    }

    pub fn known_nodes(&self) -> Option<u64> {
        self.known_nodes
    }

    /// Number of masters serving at least one slot.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn current_epoch(&self) -> Option<u64> {
        self.current_epoch
    }

    /// Any field by its raw name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }

    pub fn all_slots_assigned(&self) -> bool {
        self.slots_assigned == Some(u64::from(SLOT_COUNT))
    }
}
