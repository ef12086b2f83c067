//! # Event Gate
//!
//! Decides whether a matched event stops the target.
//!
//! The gate works on a [`GateSnapshot`] copied out of the store while the
//! structural lock is held. Evaluation itself runs without the lock, so a
//! slow or blocking expression never stalls mutations of the tree, and a
//! breakpoint removed mid-evaluation is harmless: its snapshot completes once
//! and the manager discards the result.
//!
//! ## Order
//!
//! 1. Monitors run, breakpoint first, then each enclosing group. A failing
//!    monitor is reported and the rest still run.
//! 2. Trace breakpoints stop here: they never gate.
//! 3. Conditions run in the same order and short-circuit on the first one
//!    that is false. A condition that fails to evaluate counts as false.

use tracing::{debug, warn};

use crate::breakpoints::{BreakpointId, BreakpointStore, Condition, Monitor};
use crate::error::EvaluationError;
use crate::target::{Evaluator, TargetEvent};

/// Everything the gate needs from one breakpoint and its ancestors.
#[derive(Debug, Clone)]
pub struct GateSnapshot
{
    /// Breakpoint being gated
    pub id: BreakpointId,
    /// Whether the breakpoint only traces
    pub trace: bool,
    /// Breakpoint conditions followed by each ancestor group's
    pub conditions: Vec<Condition>,
    /// Breakpoint monitors followed by each ancestor group's
    pub monitors: Vec<Monitor>,
}

impl GateSnapshot
{
    /// Copy the gate inputs of `id` out of the store.
    #[must_use]
    pub fn capture(store: &BreakpointStore, id: BreakpointId) -> Option<Self>
    {
        let breakpoint = store.get(id)?;
        let mut conditions = breakpoint.conditions().to_vec();
        let mut monitors = breakpoint.monitors().to_vec();
        for group in store.ancestry(breakpoint.group()) {
            if let Some(node) = store.group(group) {
                conditions.extend_from_slice(node.conditions());
                monitors.extend_from_slice(node.monitors());
            }
        }
        Some(Self {
            id,
            trace: breakpoint.kind().is_trace(),
            conditions,
            monitors,
        })
    }
}

/// Result of running the gate once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateOutcome
{
    /// Whether every condition held
    pub passed: bool,
    /// Number of monitors that ran successfully
    pub monitors_fired: usize,
    /// Evaluation failures to report
    pub errors: Vec<EvaluationError>,
}

/// Run monitors and conditions of `snapshot` for `event`.
pub fn run_gate(snapshot: &GateSnapshot, event: &TargetEvent, evaluator: &dyn Evaluator) -> GateOutcome
{
    let mut outcome = GateOutcome::default();

    for monitor in &snapshot.monitors {
        match monitor.fire(snapshot.id, evaluator, event.thread) {
            Ok(_) => outcome.monitors_fired += 1,
            Err(error) => {
                warn!(breakpoint = %snapshot.id, %error, "monitor failed");
                outcome.errors.push(error);
            }
        }
    }

    if snapshot.trace {
        outcome.passed = true;
        return outcome;
    }

    outcome.passed = true;
    for condition in &snapshot.conditions {
        match condition.evaluate(evaluator, event.thread) {
            Ok(true) => {}
            Ok(false) => {
                debug!(breakpoint = %snapshot.id, condition = %condition.describe(), "condition not satisfied");
                outcome.passed = false;
                break;
            }
            Err(error) => {
                warn!(breakpoint = %snapshot.id, %error, "condition failed, treating as false");
                outcome.errors.push(error);
                outcome.passed = false;
                break;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::target::memory::{MemoryTarget, MAIN_THREAD};
    use crate::target::{EventDetail, SubscriptionHandle};
    use crate::types::{Location, SuspendPolicy};

    fn event() -> TargetEvent
    {
        TargetEvent {
            handle: SubscriptionHandle::from_raw(1),
            thread: Some(MAIN_THREAD),
            suspended: SuspendPolicy::All,
            detail: EventDetail::Location(Location::new("Foo", 10)),
        }
    }

    fn snapshot(conditions: &[&str], monitors: &[&str], trace: bool) -> GateSnapshot
    {
        GateSnapshot {
            id: BreakpointId::from_raw(1),
            trace,
            conditions: conditions.iter().map(|c| Condition::expression(*c)).collect(),
            monitors: monitors.iter().map(|m| Monitor::expression(*m)).collect(),
        }
    }

    #[test]
    fn test_empty_conditions_pass()
    {
        let target = MemoryTarget::new();
        let outcome = run_gate(&snapshot(&[], &[], false), &event(), &target);
        assert!(outcome.passed);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_conditions_short_circuit()
    {
        let target = MemoryTarget::new();
        target.set_variable("count", 3);
        let outcome = run_gate(&snapshot(&["count > 5", "undefined > 1"], &[], false), &event(), &target);
        assert!(!outcome.passed);
        // The second condition would fail to evaluate; it must never run.
        assert!(outcome.errors.is_empty());
        assert_eq!(target.evaluation_count(), 1);
    }

    #[test]
    fn test_failing_condition_counts_as_false()
    {
        let target = MemoryTarget::new();
        let outcome = run_gate(&snapshot(&["undefined > 1"], &[], false), &event(), &target);
        assert!(!outcome.passed);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_non_boolean_condition_is_an_error()
    {
        let target = MemoryTarget::new();
        target.set_variable("count", 3);
        let outcome = run_gate(&snapshot(&["count"], &[], false), &event(), &target);
        assert!(!outcome.passed);
        assert!(matches!(outcome.errors[0], EvaluationError::NotBoolean { .. }));
    }

    #[test]
    fn test_monitors_run_even_when_conditions_fail()
    {
        let target = MemoryTarget::new();
        target.set_variable("count", 3);
        let outcome = run_gate(&snapshot(&["count > 5"], &["count"], false), &event(), &target);
        assert!(!outcome.passed);
        assert_eq!(outcome.monitors_fired, 1);
    }

    #[test]
    fn test_trace_ignores_conditions()
    {
        let target = MemoryTarget::new();
        let outcome = run_gate(&snapshot(&["false"], &["true"], true), &event(), &target);
        assert!(outcome.passed);
        assert_eq!(outcome.monitors_fired, 1);
        assert_eq!(target.evaluation_count(), 1);
    }
}
