//! Observability for the `redtrib` tools
//!
//! Structured logging through `tracing`, with text or JSON output and an
//! `RUST_LOG` override on top of the configured level.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};
