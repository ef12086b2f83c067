//! # Logging Utilities
//!
//! Logging infrastructure for Haltpoint using `tracing`.
//!
//! A [`LogConfig`] describes up to three sinks:
//! - the console, pretty or JSON
//! - an optional diagnostics file mirroring the console
//! - an optional trace file that receives only [`TRACE_TARGET`] and
//!   [`MONITOR_TARGET`] events
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use haltpoint_utils::LogConfig;
//!
//! // Reads RUST_LOG, HALTPOINT_LOG_FORMAT, HALTPOINT_LOG_FILE and HALTPOINT_TRACE_FILE
//! let _guard = LogConfig::from_env()
//!     .expect("invalid logging environment")
//!     .init()
//!     .expect("Failed to initialize logging");
//!
//! tracing::info!("Session opened");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=haltpoint_core=trace`)
//! - `HALTPOINT_LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `HALTPOINT_LOG_FILE`: Optional diagnostics file
//! - `HALTPOINT_TRACE_FILE`: Optional file for trace breakpoint output
//!
//! The returned [`LogGuard`] flushes file output when dropped, so keep it
//! alive for as long as the program logs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::{Local, NaiveDate};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Target used by the engine when a trace breakpoint fires.
pub const TRACE_TARGET: &str = "haltpoint::trace";

/// Target used by the engine for monitor results.
pub const MONITOR_TARGET: &str = "haltpoint::monitor";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format
    #[default]
    Pretty,
    /// JSON format, one object per line
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {s}. Use 'pretty' or 'json'")),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl fmt::Display for LogLevel
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", Level::from(*self))
    }
}

impl FromStr for LogLevel
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Unknown log level: {s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            )),
        }
    }
}

/// Where and how to log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig
{
    /// Explicit level; overrides `RUST_LOG` when set
    pub level: Option<LogLevel>,
    /// Output format for the console and the diagnostics file
    pub format: LogFormat,
    /// Write diagnostics to the console
    pub console: bool,
    /// Mirror diagnostics into this file
    pub file: Option<PathBuf>,
    /// Write trace breakpoint and monitor output into this file
    pub trace_file: Option<PathBuf>,
}

impl Default for LogConfig
{
    fn default() -> Self
    {
        Self {
            level: None,
            format: LogFormat::Pretty,
            console: true,
            file: None,
            trace_file: None,
        }
    }
}

impl LogConfig
{
    /// Read the format and file locations from the `HALTPOINT_*` variables.
    ///
    /// ## Errors
    ///
    /// Returns [`LoggingError::InvalidFormat`] when `HALTPOINT_LOG_FORMAT` is set
    /// to something other than `pretty` or `json`.
    pub fn from_env() -> Result<Self, LoggingError>
    {
        let format = match env::var("HALTPOINT_LOG_FORMAT") {
            Ok(value) => LogFormat::from_str(&value).map_err(LoggingError::InvalidFormat)?,
            Err(_) => LogFormat::Pretty,
        };
        Ok(Self {
            format,
            file: env::var_os("HALTPOINT_LOG_FILE").map(PathBuf::from),
            trace_file: env::var_os("HALTPOINT_TRACE_FILE").map(PathBuf::from),
            ..Self::default()
        })
    }

    /// Use an explicit level instead of `RUST_LOG`.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self
    {
        self.level = Some(level);
        self
    }

    /// Use a different output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self
    {
        self.format = format;
        self
    }

    /// Send trace breakpoint output to `path`.
    #[must_use]
    pub fn with_trace_file(mut self, path: impl Into<PathBuf>) -> Self
    {
        self.trace_file = Some(path.into());
        self
    }

    /// Keep the console quiet; only files receive output.
    #[must_use]
    pub fn without_console(mut self) -> Self
    {
        self.console = false;
        self
    }

    /// Filter for the console and diagnostics file.
    ///
    /// Priority: the explicit level, then `RUST_LOG`, then `info`.
    fn filter(&self) -> EnvFilter
    {
        if let Some(level) = self.level {
            return EnvFilter::new(level.to_string());
        }
        match env::var("RUST_LOG") {
            Ok(rust_log) => EnvFilter::try_new(rust_log).unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
            Err(_) => EnvFilter::new(Level::INFO.to_string()),
        }
    }

    /// Install the global subscriber.
    ///
    /// ## Errors
    ///
    /// Returns an error if a subscriber is already installed or a log
    /// directory cannot be created.
    pub fn init(self) -> Result<LogGuard, LoggingError>
    {
        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guards = Vec::new();

        if self.console {
            layers.push(format_layer(self.format, io::stdout, true).with_filter(self.filter()).boxed());
        }
        if let Some(path) = &self.file {
            let (writer, guard) = file_writer(path)?;
            guards.push(guard);
            layers.push(format_layer(self.format, writer, false).with_filter(self.filter()).boxed());
        }
        if let Some(path) = &self.trace_file {
            let (writer, guard) = file_writer(path)?;
            guards.push(guard);
            let only_traces = Targets::new()
                .with_target(TRACE_TARGET, Level::INFO)
                .with_target(MONITOR_TARGET, Level::INFO);
            layers.push(format_layer(LogFormat::Pretty, writer, false).with_filter(only_traces).boxed());
        }

        Registry::default()
            .with(layers)
            .try_init()
            .map_err(|error| LoggingError::InitializationFailed(error.to_string()))?;
        Ok(LogGuard { guards })
    }
}

/// Keeps the background file writers alive; dropping it flushes them.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard
{
    guards: Vec<WorkerGuard>,
}

impl fmt::Debug for LogGuard
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("LogGuard").field("writers", &self.guards.len()).finish()
    }
}

/// Default trace file: `~/.haltpoint/YYYY-MM-DD-trace.log`, or the same name
/// under the system temp directory when `HOME` is not set.
///
/// ## Errors
///
/// Returns an error if `~/.haltpoint` cannot be created.
pub fn default_trace_file() -> Result<PathBuf, LoggingError>
{
    let name = trace_file_name(Local::now().date_naive());
    match env::var_os("HOME") {
        Some(home) => {
            let dir = PathBuf::from(home).join(".haltpoint");
            std::fs::create_dir_all(&dir)?;
            Ok(dir.join(name))
        }
        None => Ok(env::temp_dir().join(name)),
    }
}

fn trace_file_name(date: NaiveDate) -> String
{
    format!("{}-trace.log", date.format("%Y-%m-%d"))
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::Pretty => layer.with_ansi(ansi).boxed(),
        LogFormat::Json => layer.json().with_current_span(true).with_span_list(true).boxed(),
    }
}

/// Non-blocking appender for `path`. The date is part of the name already,
/// so the file never rolls.
fn file_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError>
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.display().to_string()))?;
    let appender = tracing_appender::rolling::never(dir, name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// The log path does not name a file
    #[error("Invalid log file path: {0}")]
    InvalidPath(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
