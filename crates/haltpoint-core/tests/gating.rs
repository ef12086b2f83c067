//! Tests for event gating: conditions, monitors, skip/expire counts and
//! suspend policies

use std::sync::{Arc, Weak};

use haltpoint_core::breakpoints::builder::BreakpointBuilder;
use haltpoint_core::breakpoints::{BreakpointKind, Condition, Monitor};
use haltpoint_core::error::EvaluationError;
use haltpoint_core::events::{event_channel, BreakpointEvent, BreakpointEventReceiver, ChannelListener};
use haltpoint_core::factory::{BreakpointFactory, DebuggingContext};
use haltpoint_core::manager::{BreakpointManager, EventOutcome};
use haltpoint_core::target::memory::{MemoryTarget, MAIN_THREAD};
use haltpoint_core::target::Evaluator;
use haltpoint_core::types::{Location, ReferenceType, ThreadId, Value};
use haltpoint_core::{BreakpointId, BreakpointState, GroupId};

struct Fixture
{
    manager: BreakpointManager,
    target: Arc<MemoryTarget>,
    events: BreakpointEventReceiver,
}

impl Fixture
{
    fn new() -> Self
    {
        let target = Arc::new(MemoryTarget::new());
        target.define_class(ReferenceType::new("Foo").with_lines([10, 11]));
        let manager = BreakpointManager::new();
        manager.attach(target.clone(), target.clone());
        let (sender, events) = event_channel();
        manager.add_listener(Arc::new(ChannelListener::new(sender)));
        Self { manager, target, events }
    }

    fn add(&self, command: &str) -> BreakpointId
    {
        let breakpoint = BreakpointFactory::new()
            .create_from_command(command, &DebuggingContext::default(), &self.manager.loaded_classes())
            .unwrap();
        self.manager.add_breakpoint(breakpoint).unwrap()
    }

    /// Hit `Foo:line` on the main thread and handle every notification.
    fn hit(&self, line: u32) -> Vec<EventOutcome>
    {
        self.target
            .hit("Foo", line, MAIN_THREAD)
            .iter()
            .map(|event| self.manager.handle_event(event))
            .collect()
    }

    fn stops(&self) -> usize
    {
        self.events
            .try_iter()
            .filter(|event| matches!(event, BreakpointEvent::Stopped { .. }))
            .count()
    }
}

/// Evaluator that edits the breakpoint tree before every evaluation, the
/// way a user acting from another thread would while a condition runs.
struct MeddlingEvaluator
{
    target: Arc<MemoryTarget>,
    manager: Weak<BreakpointManager>,
    meddle: fn(&BreakpointManager),
}

impl Evaluator for MeddlingEvaluator
{
    fn evaluate(&self, expression: &str, thread: ThreadId, frame: usize) -> Result<Value, EvaluationError>
    {
        if let Some(manager) = self.manager.upgrade() {
            (self.meddle)(&manager);
        }
        self.target.evaluate(expression, thread, frame)
    }
}

/// A manager over `Foo:10` whose condition evaluation runs `meddle` first.
fn meddled(
    meddle: fn(&BreakpointManager),
) -> (Arc<BreakpointManager>, Arc<MemoryTarget>, BreakpointId, BreakpointEventReceiver)
{
    let target = Arc::new(MemoryTarget::new());
    target.define_class(ReferenceType::new("Foo").with_lines([10, 11]));
    let manager = Arc::new(BreakpointManager::new());
    let evaluator = Arc::new(MeddlingEvaluator {
        target: target.clone(),
        manager: Arc::downgrade(&manager),
        meddle,
    });
    manager.attach(target.clone(), evaluator);
    let (sender, events) = event_channel();
    manager.add_listener(Arc::new(ChannelListener::new(sender)));

    let breakpoint = BreakpointFactory::new()
        .create_from_command("Foo:10", &DebuggingContext::default(), &manager.loaded_classes())
        .unwrap();
    let id = manager.add_breakpoint(breakpoint).unwrap();
    manager.add_condition(id, Condition::expression("true")).unwrap();
    (manager, target, id, events)
}

#[test]
fn test_stop_emits_exactly_one_event()
{
    let fixture = Fixture::new();
    let id = fixture.add("Foo:10");
    assert_eq!(fixture.hit(10), vec![EventOutcome::Stopped(id)]);
    assert_eq!(fixture.stops(), 1);
    assert_eq!(fixture.target.resume_count(), 0);
}

#[test]
fn test_condition_holds_back_stops_until_true()
{
    let fixture = Fixture::new();
    let id = fixture.add("Foo:10");
    fixture.manager.add_condition(id, Condition::expression("count > 5")).unwrap();

    for count in 1..=5 {
        fixture.target.set_variable("count", count);
        assert_eq!(fixture.hit(10), vec![EventOutcome::Filtered(id)]);
    }
    assert_eq!(fixture.stops(), 0);
    assert_eq!(fixture.target.resume_count(), 5);

    fixture.target.set_variable("count", 6);
    assert_eq!(fixture.hit(10), vec![EventOutcome::Stopped(id)]);
    assert_eq!(fixture.stops(), 1);
    // Only the passing evaluation counts as a hit.
    assert_eq!(fixture.manager.breakpoint(id).unwrap().hit_count(), 1);
}

#[test]
fn test_false_condition_never_stops_any_policy()
{
    for command in ["Foo:10", "thread Foo:10", "go Foo:10"] {
        let fixture = Fixture::new();
        let id = fixture.add(command);
        fixture.manager.add_condition(id, Condition::expression("false")).unwrap();
        assert_eq!(fixture.hit(10), vec![EventOutcome::Filtered(id)]);
        assert_eq!(fixture.stops(), 0);
    }
}

#[test]
fn test_failing_condition_reports_error_and_resumes()
{
    let fixture = Fixture::new();
    let id = fixture.add("Foo:10");
    fixture.manager.add_condition(id, Condition::expression("broken")).unwrap();
    fixture.target.fail_expression("broken", "NullPointerException");

    assert_eq!(fixture.hit(10), vec![EventOutcome::Filtered(id)]);
    let errors: Vec<String> = fixture
        .events
        .try_iter()
        .filter_map(|event| match event {
            BreakpointEvent::ErrorOccurred { message, .. } => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("NullPointerException"));
}

#[test]
fn test_monitors_run_even_when_condition_fails()
{
    let fixture = Fixture::new();
    let id = fixture.add("Foo:10");
    fixture.manager.add_monitor(id, Monitor::expression("count")).unwrap();
    fixture.manager.add_condition(id, Condition::expression("count > 5")).unwrap();
    fixture.target.set_variable("count", 1);

    assert_eq!(fixture.hit(10), vec![EventOutcome::Filtered(id)]);
    assert_eq!(fixture.target.evaluation_count(), 2);
}

#[test]
fn test_silent_breakpoint_without_gate_work_never_suspends()
{
    let fixture = Fixture::new();
    let id = fixture.add("go Foo:10");
    assert_eq!(fixture.hit(10), vec![EventOutcome::Passed(id)]);
    assert_eq!(fixture.stops(), 0);
    // Nothing was suspended, so nothing needed resuming.
    assert_eq!(fixture.target.resume_count(), 0);
    assert_eq!(fixture.manager.breakpoint(id).unwrap().hit_count(), 1);
}

#[test]
fn test_silent_breakpoint_with_monitor_pauses_event_thread()
{
    let fixture = Fixture::new();
    let id = fixture.add("go Foo:10");
    fixture.manager.add_monitor(id, Monitor::expression("true")).unwrap();
    let requests = fixture.target.subscriptions();
    assert_eq!(requests[0].suspend_policy, haltpoint_core::types::SuspendPolicy::EventThread);

    assert_eq!(fixture.hit(10), vec![EventOutcome::Passed(id)]);
    assert_eq!(fixture.target.resume_count(), 1);
    assert_eq!(fixture.stops(), 0);
}

#[test]
fn test_skip_count_resumes_first_passes()
{
    let fixture = Fixture::new();
    let id = BreakpointBuilder::new(BreakpointKind::Line {
        class: haltpoint_core::names::ClassPattern::parse("Foo").unwrap(),
        line: 11,
    })
    .skip(2)
    .install(&fixture.manager)
    .unwrap();

    assert_eq!(fixture.hit(11), vec![EventOutcome::Passed(id)]);
    assert_eq!(fixture.hit(11), vec![EventOutcome::Passed(id)]);
    assert_eq!(fixture.hit(11), vec![EventOutcome::Stopped(id)]);
    assert_eq!(fixture.stops(), 1);
}

#[test]
fn test_expired_breakpoint_ignores_further_hits()
{
    let fixture = Fixture::new();
    let id = fixture.add("Foo:10");
    fixture.manager.set_expire_count(id, 2).unwrap();

    assert_eq!(fixture.hit(10), vec![EventOutcome::Stopped(id)]);
    assert_eq!(fixture.hit(10), vec![EventOutcome::Stopped(id)]);
    assert_eq!(fixture.manager.state(id), Some(BreakpointState::Disabled));
    // Expiry releases the subscription.
    assert!(fixture.hit(10).is_empty());

    fixture.manager.reset_hit_count(id).unwrap();
    assert_eq!(fixture.manager.state(id), Some(BreakpointState::Resolved));
}

#[test]
fn test_group_condition_applies_to_members()
{
    let fixture = Fixture::new();
    let group = fixture.manager.add_group("guarded", GroupId::DEFAULT).unwrap();
    let breakpoint = BreakpointFactory::new().create_line_breakpoint("Foo", 10).unwrap();
    let id = fixture.manager.add_breakpoint_to(breakpoint, group).unwrap();
    fixture
        .manager
        .add_group_condition(group, Condition::expression("ready"))
        .unwrap();

    fixture.target.set_variable("ready", false);
    assert_eq!(fixture.hit(10), vec![EventOutcome::Filtered(id)]);
    fixture.target.set_variable("ready", true);
    assert_eq!(fixture.hit(10), vec![EventOutcome::Stopped(id)]);
}

#[test]
fn test_thread_filter_is_exact_name()
{
    let fixture = Fixture::new();
    let worker = ThreadId(2);
    fixture.target.add_thread(worker, "worker");
    let id = fixture.add("Foo:10 t:worker");

    assert!(fixture.hit(10).is_empty());
    let events = fixture.target.hit("Foo", 10, worker);
    assert_eq!(fixture.manager.handle_event(&events[0]), EventOutcome::Stopped(id));
}

#[test]
fn test_trace_runs_monitors_and_never_stops()
{
    let fixture = Fixture::new();
    let id = fixture.add("enter c:Foo");
    fixture.manager.add_monitor(id, Monitor::expression("depth")).unwrap();
    fixture.manager.add_condition(id, Condition::expression("false")).unwrap();
    fixture.target.set_variable("depth", 3);

    let entered = fixture.target.enter_method(Location::new("Foo", 10), MAIN_THREAD);
    assert_eq!(fixture.manager.handle_event(&entered[0]), EventOutcome::Traced(id));
    // Entries into classes outside the filter are never delivered.
    assert!(fixture
        .target
        .enter_method(Location::new("Bar", 1), MAIN_THREAD)
        .is_empty());

    let traced = fixture
        .events
        .try_iter()
        .filter(|event| matches!(event, BreakpointEvent::Traced { .. }))
        .count();
    assert_eq!(traced, 1);
    assert_eq!(fixture.target.evaluation_count(), 1);
    assert_eq!(fixture.target.resume_count(), 1);
}

#[test]
fn test_exception_breakpoint_matches_caught_only()
{
    let fixture = Fixture::new();
    let id = fixture.add("java.io.IOException caught");
    assert!(fixture.target.throw("java.io.IOException", false, MAIN_THREAD).is_empty());
    let thrown = fixture.target.throw("java.io.IOException", true, MAIN_THREAD);
    assert_eq!(fixture.manager.handle_event(&thrown[0]), EventOutcome::Stopped(id));
}

#[test]
fn test_watch_breakpoint_on_modification()
{
    let fixture = Fixture::new();
    fixture
        .target
        .define_class(ReferenceType::new("com.acme.Counter").with_field("count"));
    let id = fixture.add("com.acme.Counter.count modify");
    assert!(fixture.target.access_field("com.acme.Counter", "count", MAIN_THREAD).is_empty());
    let modified = fixture
        .target
        .modify_field("com.acme.Counter", "count", 4.into(), MAIN_THREAD);
    assert_eq!(fixture.manager.handle_event(&modified[0]), EventOutcome::Stopped(id));
}

#[test]
fn test_disabled_breakpoint_resumes_without_evaluating()
{
    let fixture = Fixture::new();
    let id = fixture.add("Foo:10");
    fixture.manager.add_condition(id, Condition::expression("true")).unwrap();
    let pending = fixture.target.hit("Foo", 10, MAIN_THREAD);
    fixture.manager.set_enabled(id, false).unwrap();

    assert_eq!(fixture.manager.handle_event(&pending[0]), EventOutcome::Unknown);
    assert_eq!(fixture.target.evaluation_count(), 0);
    assert_eq!(fixture.target.resume_count(), 1);
}

#[test]
fn test_disabled_during_condition_is_ignored()
{
    let (manager, target, id, events) = meddled(|manager| {
        for id in manager.all_breakpoints() {
            manager.set_enabled(id, false).unwrap();
        }
    });
    let pending = target.hit("Foo", 10, MAIN_THREAD);

    assert_eq!(manager.handle_event(&pending[0]), EventOutcome::Ignored);
    assert_eq!(target.evaluation_count(), 1);
    assert_eq!(target.resume_count(), 1);
    assert_eq!(manager.breakpoint(id).unwrap().hit_count(), 0);
    assert!(!events
        .try_iter()
        .any(|event| matches!(event, BreakpointEvent::Stopped { .. })));
}

#[test]
fn test_removed_during_condition_is_ignored()
{
    let (manager, target, id, events) = meddled(|manager| {
        for id in manager.all_breakpoints() {
            manager.remove_breakpoint(id);
        }
    });
    let pending = target.hit("Foo", 10, MAIN_THREAD);

    assert_eq!(manager.handle_event(&pending[0]), EventOutcome::Ignored);
    assert!(target.evaluation_count() <= 1);
    assert_eq!(target.resume_count(), 1);
    assert!(manager.breakpoint(id).is_none());
    assert!(!events
        .try_iter()
        .any(|event| matches!(event, BreakpointEvent::Stopped { .. })));

    // The subscription went with the breakpoint.
    assert!(target.hit("Foo", 10, MAIN_THREAD).is_empty());
    assert_eq!(target.evaluation_count(), 1);
}
