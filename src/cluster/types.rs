//! Cluster type definitions shared by the topology parsers and the planner.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of hash slots in a Redis Cluster.
pub const SLOT_COUNT: u16 = 16384;

/// Highest valid slot number.
pub const MAX_SLOT: u16 = SLOT_COUNT - 1;

/// Errors raised while reading `CLUSTER NODES` / `CLUSTER INFO` text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid cluster nodes line: {0}")]
    InvalidClusterNodes(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("Invalid node flags: {0}")]
    InvalidFlags(String),

    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Slot {slot} claimed by both {first} and {second}")]
    DuplicateSlot {
        slot: u16,
        first: String,
        second: String,
    },

    #[error("Invalid cluster info: {0}")]
    InvalidClusterInfo(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Role of a node in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Owns hash slots and serves writes
    Master,
    /// Replicates a master, owns no slots
    Slave,
    /// Neither flag set yet, e.g. mid-handshake or `noflags`
    Unknown,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Master => write!(f, "master"),
            Self::Slave => write!(f, "slave"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// State of the node-to-node link as seen by the reporting node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Connected,
    Disconnected,
}

impl std::str::FromStr for LinkState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(Self::Connected),
            "disconnected" => Ok(Self::Disconnected),
            _ => Err(ParseError::InvalidField {
                field: "link state",
                value: s.to_string(),
            }),
        }
    }
}

/// An inclusive range of slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    /// Start slot (inclusive)
    pub start: u16,
    /// End slot (inclusive)
    pub end: u16,
}

impl SlotRange {
    /// Parse `"17"` or `"0-5460"`, rejecting reversed or out of range bounds.
    pub fn parse(token: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidSlot(token.to_string());
        let parse_slot = |s: &str| -> Result<u16, ParseError> {
            let slot = s.parse::<u16>().map_err(|_| invalid())?;
            if slot > MAX_SLOT {
                return Err(invalid());
            }
            Ok(slot)
        };

        match token.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse_slot(start)?, parse_slot(end)?);
                if start > end {
                    return Err(invalid());
                }
                Ok(Self { start, end })
            }
            None => {
                let slot = parse_slot(token)?;
                Ok(Self {
                    start: slot,
                    end: slot,
                })
            }
        }
    }

    /// Number of slots in this range
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    /// Always false; a range holds at least one slot
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

impl std::fmt::Display for SlotRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Collapse an ascending slot sequence into contiguous ranges.
pub fn compress_slots<I: IntoIterator<Item = u16>>(slots: I) -> Vec<SlotRange> {
    let mut ranges: Vec<SlotRange> = Vec::new();
    for slot in slots {
        match ranges.last_mut() {
            Some(last) if last.end.checked_add(1) == Some(slot) => last.end = slot,
            _ => ranges.push(SlotRange {
                start: slot,
                end: slot,
            }),
        }
    }
    ranges
}
