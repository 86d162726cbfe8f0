//! RESP wire protocol: request framing and incremental reply decoding.

pub mod encoder;
pub mod parser;
pub mod types;

pub use encoder::{pack_command, pack_commands, Arg};
pub use parser::RespParser;
pub use types::RespValue;
