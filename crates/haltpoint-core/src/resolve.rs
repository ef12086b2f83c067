//! Binding breakpoint kinds to subscription requests.

use smallvec::{smallvec, SmallVec};

use crate::breakpoints::{Breakpoint, BreakpointKind};
use crate::error::{BreakpointError, Result};
use crate::target::{MatchSpec, SubscriptionRequest};
use crate::types::{Location, ReferenceType, SuspendPolicy};

pub(crate) type Specs = SmallVec<[MatchSpec; 2]>;

/// Requests for kinds that need no loaded class.
pub(crate) fn direct_specs(kind: &BreakpointKind) -> Specs
{
    let mut specs = Specs::new();
    match kind {
        BreakpointKind::Exception { class, caught, uncaught } => specs.push(MatchSpec::Exception {
            class: class.clone(),
            caught: *caught,
            uncaught: *uncaught,
        }),
        BreakpointKind::Thread { on_start, on_death } => {
            if *on_start {
                specs.push(MatchSpec::ThreadStart);
            }
            if *on_death {
                specs.push(MatchSpec::ThreadDeath);
            }
        }
        BreakpointKind::Trace { on_enter, on_exit } => {
            if *on_enter {
                specs.push(MatchSpec::MethodEntry);
            }
            if *on_exit {
                specs.push(MatchSpec::MethodExit);
            }
        }
        BreakpointKind::ClassLifecycle {
            class,
            on_prepare,
            on_unload,
        } => {
            if *on_prepare {
                specs.push(MatchSpec::ClassPrepare(class.clone()));
            }
            if *on_unload {
                specs.push(MatchSpec::ClassUnload(class.clone()));
            }
        }
        BreakpointKind::Line { .. } | BreakpointKind::Method { .. } | BreakpointKind::Watch { .. } => {}
    }
    specs
}

/// Requests binding a resolvable kind to one loaded class.
pub(crate) fn class_specs(kind: &BreakpointKind, class: &ReferenceType) -> Result<Specs>
{
    match kind {
        BreakpointKind::Line { line, .. } => {
            if !class.has_line_info {
                return Err(BreakpointError::AbsentInformation {
                    class: class.name.clone(),
                });
            }
            if !class.has_code_at(*line) {
                return Err(BreakpointError::NoCodeAtLine {
                    class: class.name.clone(),
                    line: *line,
                });
            }
            Ok(smallvec![MatchSpec::Location(Location::new(class.name.clone(), *line))])
        }
        BreakpointKind::Method { method, arguments, .. } => {
            let overloads: Vec<_> = class
                .methods_named(method)
                .filter(|overload| arguments.as_ref().is_none_or(|arguments| overload.matches_arguments(arguments)))
                .collect();
            if overloads.is_empty() {
                return Err(BreakpointError::NoSuchMethod {
                    class: class.name.clone(),
                    method: method.clone(),
                });
            }
            let specs: Specs = overloads
                .iter()
                .filter_map(|overload| {
                    overload.first_line.map(|line| {
                        MatchSpec::Location(Location {
                            class: class.name.clone(),
                            method: Some(overload.name.clone()),
                            line,
                        })
                    })
                })
                .collect();
            if specs.is_empty() {
                return Err(BreakpointError::AbsentInformation {
                    class: class.name.clone(),
                });
            }
            Ok(specs)
        }
        BreakpointKind::Watch {
            field,
            on_access,
            on_modify,
            ..
        } => {
            if !class.has_field(field) {
                return Err(BreakpointError::NoSuchField {
                    class: class.name.clone(),
                    field: field.clone(),
                });
            }
            let mut specs = Specs::new();
            if *on_access {
                specs.push(MatchSpec::FieldAccess {
                    class: class.name.clone(),
                    field: field.clone(),
                });
            }
            if *on_modify {
                specs.push(MatchSpec::FieldModify {
                    class: class.name.clone(),
                    field: field.clone(),
                });
            }
            Ok(specs)
        }
        _ => Ok(direct_specs(kind)),
    }
}

/// Policy to register with the target.
///
/// A breakpoint that never suspends still needs a paused thread to evaluate
/// its conditions and monitors, so it is registered as suspending the event
/// thread and resumed by the gate.
pub(crate) fn request_policy(breakpoint: &Breakpoint, gate_work: bool) -> SuspendPolicy
{
    if breakpoint.suspend_policy() == SuspendPolicy::None && gate_work {
        SuspendPolicy::EventThread
    } else {
        breakpoint.suspend_policy()
    }
}

pub(crate) fn request(breakpoint: &Breakpoint, spec: MatchSpec, policy: SuspendPolicy) -> SubscriptionRequest
{
    SubscriptionRequest {
        spec,
        class_filter: breakpoint.class_filter().cloned(),
        thread_filter: breakpoint.thread_filter().map(str::to_string),
        suspend_policy: policy,
    }
}
