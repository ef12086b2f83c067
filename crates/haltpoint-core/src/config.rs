//! # Engine Configuration
//!
//! Tunables for the event dispatcher and session setup.
//!
//! ## Environment Variables
//!
//! - `HALTPOINT_INBOX_CAPACITY`: notifications buffered before delivery
//!   blocks (default: `256`)
//! - `HALTPOINT_WORKERS`: notifications gated concurrently (default: `8`)
//! - `HALTPOINT_UNCAUGHT_BREAKPOINT`: add a breakpoint on every uncaught
//!   exception when a session opens (`true`/`false`, default: `true`)
//!
//! Invalid values are logged and replaced by the default.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default capacity of the dispatcher inbox.
pub const DEFAULT_INBOX_CAPACITY: usize = 256;
/// Default number of concurrently gated notifications.
pub const DEFAULT_WORKERS: usize = 8;

/// Configuration of one breakpoint engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig
{
    /// Notifications buffered by the dispatcher
    pub inbox_capacity: usize,
    /// Notifications evaluated at the same time
    pub workers: usize,
    /// Whether a session starts with an uncaught exception breakpoint
    pub uncaught_breakpoint: bool,
}

impl Default for EngineConfig
{
    fn default() -> Self
    {
        Self {
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            workers: DEFAULT_WORKERS,
            uncaught_breakpoint: true,
        }
    }
}

impl EngineConfig
{
    /// Defaults overridden by `HALTPOINT_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self
    {
        let defaults = Self::default();
        Self {
            inbox_capacity: positive("HALTPOINT_INBOX_CAPACITY").unwrap_or(defaults.inbox_capacity),
            workers: positive("HALTPOINT_WORKERS").unwrap_or(defaults.workers),
            uncaught_breakpoint: read("HALTPOINT_UNCAUGHT_BREAKPOINT").unwrap_or(defaults.uncaught_breakpoint),
        }
    }

    /// Set the inbox capacity (at least 1).
    #[must_use]
    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self
    {
        self.inbox_capacity = capacity.max(1);
        self
    }

    /// Set the number of workers (at least 1).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self
    {
        self.workers = workers.max(1);
        self
    }

    /// Enable or disable the default uncaught exception breakpoint.
    #[must_use]
    pub const fn with_uncaught_breakpoint(mut self, enabled: bool) -> Self
    {
        self.uncaught_breakpoint = enabled;
        self
    }
}

fn read<T: FromStr>(name: &str) -> Option<T>
{
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring invalid configuration value");
            None
        }
    }
}

fn positive(name: &str) -> Option<usize>
{
    read::<usize>(name).filter(|value| {
        if *value == 0 {
            warn!(variable = name, "ignoring zero; a positive value is required");
        }
        *value > 0
    })
}
