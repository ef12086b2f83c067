//! Thread identity and suspend policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Thread identifier
///
/// A thread identifier uniquely identifies a thread within the debug target
/// for the lifetime of one connection. The event source decides what the raw
/// value means (a JDWP object id, an OS thread id, ...); the engine only
/// compares and passes it back.
///
/// ## Example
///
/// ```rust
/// use haltpoint_core::types::ThreadId;
///
/// let thread = ThreadId::from(12345);
/// assert_eq!(thread.raw(), 12345);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl ThreadId
{
    /// Get the raw `u64` representation of the thread identifier
    #[must_use]
    pub const fn raw(self) -> u64
    {
        self.0
    }
}

impl From<u64> for ThreadId
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{}", self.0)
    }
}

/// How much of the target is paused when a breakpoint's gate passes
///
/// ## Policies
///
/// - `All`: every thread in the target is suspended (the default).
/// - `EventThread`: only the thread that triggered the event is suspended.
/// - `None`: nothing is suspended; used for logging and tracing breakpoints
///   that only want their monitors to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SuspendPolicy
{
    /// Suspend every thread in the target
    #[default]
    All,
    /// Suspend only the thread that hit the breakpoint
    EventThread,
    /// Never suspend
    None,
}

impl SuspendPolicy
{
    /// Keyword used by the breakpoint command grammar, if the policy has one.
    ///
    /// `All` is the default and therefore has no keyword.
    #[must_use]
    pub const fn keyword(self) -> Option<&'static str>
    {
        match self {
            Self::All => None,
            Self::EventThread => Some("thread"),
            Self::None => Some("go"),
        }
    }

    /// Whether a gate pass under this policy halts anything.
    #[must_use]
    pub const fn suspends(self) -> bool
    {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for SuspendPolicy
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::All => write!(f, "all"),
            Self::EventThread => write!(f, "thread"),
            Self::None => write!(f, "none"),
        }
    }
}

impl FromStr for SuspendPolicy
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "thread" | "event-thread" => Ok(Self::EventThread),
            "none" | "go" => Ok(Self::None),
            _ => Err(format!("Unknown suspend policy: {s}. Use 'all', 'thread' or 'none'")),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_suspend_policy_from_str()
    {
        assert_eq!(SuspendPolicy::from_str("all").unwrap(), SuspendPolicy::All);
        assert_eq!(SuspendPolicy::from_str("thread").unwrap(), SuspendPolicy::EventThread);
        assert_eq!(SuspendPolicy::from_str("go").unwrap(), SuspendPolicy::None);
        assert!(SuspendPolicy::from_str("sometimes").is_err());
    }

    #[test]
    fn test_suspend_policy_keywords()
    {
        assert_eq!(SuspendPolicy::All.keyword(), None);
        assert_eq!(SuspendPolicy::EventThread.keyword(), Some("thread"));
        assert_eq!(SuspendPolicy::None.keyword(), Some("go"));
        assert!(!SuspendPolicy::None.suspends());
    }
}
