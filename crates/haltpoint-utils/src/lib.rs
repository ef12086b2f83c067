//! # Haltpoint Utilities
//!
//! Logging setup shared by the Haltpoint binaries.
//!
//! The engine itself only emits `tracing` events; this crate decides where
//! they go. Trace breakpoints and monitors log under [`TRACE_TARGET`] and
//! [`MONITOR_TARGET`], which can be split into their own file so that output
//! never mixes with diagnostics.

pub mod logging;

// Re-export commonly used logging items for convenience
pub use logging::{default_trace_file, LogConfig, LogFormat, LogGuard, LogLevel, LoggingError, MONITOR_TARGET, TRACE_TARGET};
pub use tracing::{debug, error, info, trace, warn};
