use crate::cluster::{ParseError, PlanError};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TribError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Reply(ReplyError),

    #[error("No reply")]
    NoReply,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Config error: {0}")]
    Config(String),
}

impl TribError {
    /// True for failures of the transport itself, as opposed to replies the
    /// server sent on purpose.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            TribError::Connect { .. } | TribError::Io(_) | TribError::NoReply
        )
    }

    /// The server-side error, if this failure is one.
    pub fn reply_error(&self) -> Option<&ReplyError> {
        match self {
            TribError::Reply(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TribError>;

/// Kinds of error replies a cluster node sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyErrorKind {
    Err,
    Moved,
    Ask,
    TryAgain,
    ClusterDown,
    CrossSlot,
    Loading,
    Busy,
    NoAuth,
    WrongType,
    Other(String),
}

/// Where a `MOVED` or `ASK` reply points the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub slot: u16,
    pub addr: String,
}

/// A RESP error reply (`-CODE detail\r\n`), kept as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyError {
    code: String,
    detail: String,
}

impl ReplyError {
    /// Split a raw error line into its leading code and the rest.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.split_once(' ') {
            Some((code, detail)) => Self {
                code: code.to_string(),
                detail: detail.to_string(),
            },
            None => Self {
                code: line.to_string(),
                detail: String::new(),
            },
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn kind(&self) -> ReplyErrorKind {
        match self.code.as_str() {
            "ERR" => ReplyErrorKind::Err,
            "MOVED" => ReplyErrorKind::Moved,
            "ASK" => ReplyErrorKind::Ask,
            "TRYAGAIN" => ReplyErrorKind::TryAgain,
            "CLUSTERDOWN" => ReplyErrorKind::ClusterDown,
            "CROSSSLOT" => ReplyErrorKind::CrossSlot,
            "LOADING" => ReplyErrorKind::Loading,
            "BUSY" => ReplyErrorKind::Busy,
            "NOAUTH" => ReplyErrorKind::NoAuth,
            "WRONGTYPE" => ReplyErrorKind::WrongType,
            other => ReplyErrorKind::Other(other.to_string()),
        }
    }

    /// Target of a `MOVED <slot> <addr>` / `ASK <slot> <addr>` reply.
    pub fn redirect(&self) -> Option<Redirect> {
        if !matches!(self.kind(), ReplyErrorKind::Moved | ReplyErrorKind::Ask) {
            return None;
        }
        let mut parts = self.detail.split_whitespace();
        let slot = parts.next()?.parse().ok()?;
        let addr = parts.next()?.to_string();
        Some(Redirect { slot, addr })
    }
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.detail)
        }
    }
}

impl std::error::Error for ReplyError {}
