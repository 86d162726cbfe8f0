pub mod cluster;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod talker;

pub use error::{Result, TribError};
pub use talker::{RecvOutcome, Talker, TalkerConfig};
