//! Tests for saving and restoring breakpoints

use std::sync::Arc;

use haltpoint_core::breakpoints::{Condition, Monitor};
use haltpoint_core::factory::{BreakpointFactory, DebuggingContext};
use haltpoint_core::manager::BreakpointManager;
use haltpoint_core::persist::{MemberRecord, Snapshot};
use haltpoint_core::target::memory::MemoryTarget;
use haltpoint_core::types::{ReferenceType, SuspendPolicy};
use haltpoint_core::{BreakpointState, GroupId};

fn populated() -> BreakpointManager
{
    let manager = BreakpointManager::new();
    let factory = BreakpointFactory::new();
    let context = DebuggingContext::default();
    for command in [
        "com.acme.Foo:10",
        "go com.acme.Foo.run(int,String) t:main",
        "thread java.io.IOException caught c:com.acme.*",
        "com.acme.Foo.count access modify",
        "worker start death",
        "enter exit c:com.acme.* t:main",
        "com.acme.* prepare",
    ] {
        let breakpoint = factory.create_from_command(command, &context, &[]).unwrap();
        manager.add_breakpoint(breakpoint).unwrap();
    }
    manager
}

#[test]
fn test_round_trip_preserves_descriptions_and_numbers()
{
    let manager = populated();
    let first = manager.all_breakpoints()[0];
    manager.set_skip_count(first, 3).unwrap();
    manager.add_condition(first, Condition::expression("count > 5")).unwrap();
    manager.add_monitor(first, Monitor::expression("count")).unwrap();
    manager.set_enabled(manager.all_breakpoints()[1], false).unwrap();

    let json = manager.snapshot().to_json().unwrap();
    let restored = BreakpointManager::new();
    restored.restore(&Snapshot::from_json(&json).unwrap()).unwrap();

    let describe = |manager: &BreakpointManager| -> Vec<String> {
        manager
            .all_breakpoints()
            .into_iter()
            .filter_map(|id| manager.breakpoint(id))
            .map(|breakpoint| breakpoint.to_string())
            .collect()
    };
    assert_eq!(describe(&restored), describe(&manager));

    let bp = restored.breakpoint(first).unwrap();
    assert_eq!(bp.skip_count(), 3);
    assert_eq!(bp.conditions().len(), 1);
    assert_eq!(bp.monitors().len(), 1);
    assert_eq!(bp.hit_count(), 0);
    assert!(!restored.breakpoint(restored.all_breakpoints()[1]).unwrap().is_enabled());
    assert_eq!(
        restored.breakpoint(restored.all_breakpoints()[1]).unwrap().suspend_policy(),
        SuspendPolicy::None
    );
}

#[test]
fn test_restore_subscribes_against_attached_target()
{
    let saved = BreakpointManager::new();
    let factory = BreakpointFactory::new();
    let id = saved
        .add_breakpoint(factory.create_line_breakpoint("com.acme.Foo", 10).unwrap())
        .unwrap();
    let snapshot = saved.snapshot();

    let target = Arc::new(MemoryTarget::new());
    target.define_class(ReferenceType::new("com.acme.Foo").with_lines([10]));
    let manager = BreakpointManager::new();
    manager.attach(target.clone(), target.clone());
    manager.restore(&snapshot).unwrap();
    assert_eq!(manager.state(id), Some(BreakpointState::Resolved));
    assert_eq!(target.subscription_count(), 1);
}

#[test]
fn test_restore_never_reuses_numbers()
{
    let manager = BreakpointManager::new();
    let factory = BreakpointFactory::new();
    for line in 1..=4 {
        manager
            .add_breakpoint(factory.create_line_breakpoint("Foo", line).unwrap())
            .unwrap();
    }
    let empty = BreakpointManager::new().snapshot();
    manager.restore(&empty).unwrap();
    assert_eq!(manager.breakpoint_count(GroupId::DEFAULT, true), 0);
    let next = manager
        .add_breakpoint(factory.create_line_breakpoint("Foo", 9).unwrap())
        .unwrap();
    assert_eq!(next.raw(), 5);
}

#[test]
fn test_save_and_load_file()
{
    let manager = populated();
    let group = manager.add_group("later", GroupId::DEFAULT).unwrap();
    manager.add_group_monitor(group, Monitor::expression("phase")).unwrap();

    let path = std::env::temp_dir().join(format!("haltpoint-persist-{}.json", std::process::id()));
    manager.save_to(&path).unwrap();
    let loaded = BreakpointManager::new();
    loaded.load_from(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.snapshot(), manager.snapshot());
    let snapshot = loaded.snapshot();
    assert_eq!(snapshot.breakpoint_count(), 7);
    assert!(snapshot
        .root
        .members
        .iter()
        .any(|member| matches!(member, MemberRecord::Group(group) if group.monitors.len() == 1)));
}
