//! # Breakpoint Factory
//!
//! Turns specification strings and structured parameters into configured
//! [`Breakpoint`]s.
//!
//! Parsing (see [`parse`]) is independent of any target. Resolution against
//! the loaded classes is a separate, optional step: given the classes a
//! target currently has loaded, a partial class name is expanded to the one
//! class that matches, or rejected as ambiguous. A class that is not loaded
//! yet is accepted as written; the manager binds it when it loads.

pub mod parse;

use tracing::debug;

pub use self::parse::{parse_command, parse_spec, CommandBody, ParsedCommand, ParsedSpec};
use crate::breakpoints::builder::BreakpointBuilder;
use crate::breakpoints::{Breakpoint, BreakpointKind, Condition, Monitor};
use crate::error::{BreakpointError, Result};
use crate::names::{is_java_identifier, is_method_identifier, is_valid_class_name, is_valid_type_name, ClassPattern};
use crate::types::{ReferenceType, ThreadId};

/// Where the user currently is in the target.
///
/// Specs that omit the class (`42`, `run()`) use the current class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebuggingContext
{
    /// Class of the current frame
    pub current_class: Option<String>,
    /// Line of the current frame
    pub current_line: Option<u32>,
    /// Current thread
    pub current_thread: Option<ThreadId>,
}

impl DebuggingContext
{
    /// A context positioned in `class` at `line`.
    #[must_use]
    pub fn at(class: impl Into<String>, line: u32) -> Self
    {
        Self {
            current_class: Some(class.into()),
            current_line: Some(line),
            current_thread: None,
        }
    }
}

/// Builds breakpoints, conditions and monitors.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreakpointFactory;

impl BreakpointFactory
{
    /// Create a factory.
    #[must_use]
    pub const fn new() -> Self
    {
        Self
    }

    /// Parse a location spec without resolving it.
    ///
    /// # Errors
    ///
    /// See [`parse::parse_spec`].
    pub fn parse_spec(&self, spec: &str) -> Result<ParsedSpec>
    {
        parse_spec(spec)
    }

    /// Build a line or method breakpoint from a location spec, resolving the
    /// class against `classes`.
    ///
    /// # Errors
    ///
    /// Spec errors from parsing, [`BreakpointError::AmbiguousClassSpec`] when
    /// several loaded classes match (or the class was omitted with no current
    /// location), [`BreakpointError::AbsentInformation`] for a line in a class
    /// without line tables, and [`BreakpointError::AmbiguousMethod`] /
    /// [`BreakpointError::NoSuchMethod`] for methods of loaded classes.
    pub fn create_breakpoint(&self, spec: &str, context: &DebuggingContext, classes: &[ReferenceType]) -> Result<Breakpoint>
    {
        let parsed = parse_spec(spec)?;
        let class = self.resolve_class(parsed.class(), spec, context, classes)?;
        let loaded = loaded(&class, classes);
        let kind = match parsed {
            ParsedSpec::Line { line, .. } => {
                if let Some(reference) = loaded {
                    if !reference.has_line_info {
                        return Err(BreakpointError::AbsentInformation {
                            class: reference.name.clone(),
                        });
                    }
                }
                BreakpointKind::Line { class, line }
            }
            ParsedSpec::Method { method, arguments, .. } => {
                if let Some(reference) = loaded {
                    check_method(reference, &method, arguments.as_deref())?;
                }
                BreakpointKind::Method {
                    class,
                    method,
                    arguments,
                }
            }
        };
        debug!(spec, kind = kind.label(), "created breakpoint from spec");
        Ok(Breakpoint::new(kind))
    }

    /// Build any kind of breakpoint from a command in the breakpoint grammar.
    ///
    /// # Errors
    ///
    /// Spec errors from parsing and resolution, and
    /// [`BreakpointError::FilterNotSupported`] for filters the kind cannot
    /// carry.
    pub fn create_from_command(&self, command: &str, context: &DebuggingContext, classes: &[ReferenceType]) -> Result<Breakpoint>
    {
        let parsed = parse_command(command)?;
        let mut thread_filter = parsed.thread_filter;
        let breakpoint = match parsed.body {
            CommandBody::Location(spec) => self.create_breakpoint(&spec, context, classes)?,
            CommandBody::Exception { class, caught, uncaught } => {
                let (caught, uncaught) = if caught || uncaught { (caught, uncaught) } else { (true, true) };
                let class = self.resolve_class(Some(&class), &class, context, classes)?;
                new_kind(BreakpointKind::Exception { class, caught, uncaught })
            }
            CommandBody::Watch {
                class,
                field,
                on_access,
                on_modify,
            } => {
                let resolved = self.resolve_class(Some(&class), &class, context, classes)?;
                if let Some(reference) = loaded(&resolved, classes) {
                    if !reference.has_field(&field) {
                        return Err(BreakpointError::NoSuchField {
                            class: reference.name.clone(),
                            field,
                        });
                    }
                }
                self.create_watch_breakpoint(&resolved.to_string(), &field, on_access, on_modify)?
            }
            CommandBody::Thread { name, on_start, on_death } => {
                if name.is_some() {
                    thread_filter = name;
                }
                self.create_thread_breakpoint(None, on_start, on_death)?
            }
            CommandBody::Trace { on_enter, on_exit } => self.create_trace_breakpoint(None, None, on_enter, on_exit)?,
            CommandBody::Class {
                class,
                on_prepare,
                on_unload,
            } => self.create_class_breakpoint(&class.to_string(), on_prepare, on_unload)?,
        };

        let mut builder = BreakpointBuilder::from_breakpoint(breakpoint);
        if let Some(policy) = parsed.policy {
            builder = builder.suspend(policy);
        }
        if let Some(filter) = parsed.class_filter {
            builder = builder.with_class_filter(filter);
        }
        if let Some(name) = thread_filter {
            builder = builder.for_thread(name);
        }
        builder.build()
    }

    /// A line breakpoint.
    ///
    /// # Errors
    ///
    /// Malformed class name or a line below 1.
    pub fn create_line_breakpoint(&self, class: &str, line: u32) -> Result<Breakpoint>
    {
        if line == 0 {
            return Err(BreakpointError::InvalidLineNumber(line.to_string()));
        }
        Ok(new_kind(BreakpointKind::Line {
            class: pattern(class)?,
            line,
        }))
    }

    /// A method breakpoint. `arguments` of `None` matches every overload.
    ///
    /// # Errors
    ///
    /// Malformed class, method or argument type names.
    pub fn create_method_breakpoint(&self, class: &str, method: &str, arguments: Option<Vec<String>>) -> Result<Breakpoint>
    {
        let class = pattern(class)?;
        if !is_method_identifier(method) {
            return Err(BreakpointError::MalformedMemberName(method.to_string()));
        }
        if let Some(bad) = arguments.iter().flatten().find(|argument| !is_valid_type_name(argument)) {
            return Err(BreakpointError::MalformedMemberName(bad.clone()));
        }
        Ok(new_kind(BreakpointKind::Method {
            class,
            method: method.to_string(),
            arguments,
        }))
    }

    /// An exception breakpoint for classes matching `class`.
    ///
    /// # Errors
    ///
    /// Malformed class pattern, or neither `caught` nor `uncaught` requested.
    pub fn create_exception_breakpoint(&self, class: &str, caught: bool, uncaught: bool) -> Result<Breakpoint>
    {
        require_any(caught || uncaught, "exception breakpoints report caught or uncaught exceptions")?;
        Ok(new_kind(BreakpointKind::Exception {
            class: pattern(class)?,
            caught,
            uncaught,
        }))
    }

    /// The breakpoint that stops on any exception nobody catches.
    #[must_use]
    pub fn create_uncaught_exception_breakpoint(&self) -> Breakpoint
    {
        new_kind(BreakpointKind::Exception {
            class: ClassPattern::Any,
            caught: false,
            uncaught: true,
        })
    }

    /// A watch breakpoint on `class.field`.
    ///
    /// # Errors
    ///
    /// Malformed names, or neither access nor modify requested.
    pub fn create_watch_breakpoint(&self, class: &str, field: &str, on_access: bool, on_modify: bool) -> Result<Breakpoint>
    {
        require_any(on_access || on_modify, "watch breakpoints report access or modify")?;
        if !is_valid_class_name(class, false) {
            return Err(BreakpointError::MalformedClassName(class.to_string()));
        }
        if !is_java_identifier(field) {
            return Err(BreakpointError::MalformedMemberName(field.to_string()));
        }
        Ok(new_kind(BreakpointKind::Watch {
            class: ClassPattern::Exact(class.to_string()),
            field: field.to_string(),
            on_access,
            on_modify,
        }))
    }

    /// A thread lifecycle breakpoint, optionally for one named thread.
    ///
    /// # Errors
    ///
    /// Neither start nor death requested.
    pub fn create_thread_breakpoint(&self, thread: Option<&str>, on_start: bool, on_death: bool) -> Result<Breakpoint>
    {
        require_any(on_start || on_death, "thread breakpoints report start or death")?;
        let mut builder = BreakpointBuilder::new(BreakpointKind::Thread { on_start, on_death });
        if let Some(name) = thread {
            builder = builder.for_thread(name);
        }
        builder.build()
    }

    /// A trace breakpoint. Its monitors run on every entry and/or exit that
    /// passes the filters; it never stops the target.
    ///
    /// # Errors
    ///
    /// Malformed class filter, or neither enter nor exit requested.
    pub fn create_trace_breakpoint(
        &self,
        class_filter: Option<&str>,
        thread_filter: Option<&str>,
        on_enter: bool,
        on_exit: bool,
    ) -> Result<Breakpoint>
    {
        require_any(on_enter || on_exit, "trace breakpoints report enter or exit")?;
        let mut builder = BreakpointBuilder::new(BreakpointKind::Trace { on_enter, on_exit });
        if let Some(filter) = class_filter {
            builder = builder.with_class_filter(pattern(filter)?);
        }
        if let Some(name) = thread_filter {
            builder = builder.for_thread(name);
        }
        builder.build()
    }

    /// A class prepare/unload breakpoint.
    ///
    /// # Errors
    ///
    /// Malformed pattern, or neither prepare nor unload requested.
    pub fn create_class_breakpoint(&self, class: &str, on_prepare: bool, on_unload: bool) -> Result<Breakpoint>
    {
        require_any(on_prepare || on_unload, "class breakpoints report prepare or unload")?;
        Ok(new_kind(BreakpointKind::ClassLifecycle {
            class: pattern(class)?,
            on_prepare,
            on_unload,
        }))
    }

    /// An expression condition.
    ///
    /// # Errors
    ///
    /// Empty expression.
    pub fn create_condition(&self, expression: &str) -> Result<Condition>
    {
        non_empty(expression).map(Condition::expression)
    }

    /// An expression monitor.
    ///
    /// # Errors
    ///
    /// Empty expression.
    pub fn create_monitor(&self, expression: &str) -> Result<Monitor>
    {
        non_empty(expression).map(Monitor::expression)
    }

    /// Expand the class portion of a spec against the loaded classes.
    ///
    /// Wildcard patterns are never expanded. An exact loaded match wins;
    /// otherwise loaded classes whose name ends in `.name` or `$name` are
    /// candidates. No candidates leaves the name as written.
    fn resolve_class(
        &self,
        class: Option<&str>,
        spec: &str,
        context: &DebuggingContext,
        classes: &[ReferenceType],
    ) -> Result<ClassPattern>
    {
        let Some(name) = class.map(str::to_string).or_else(|| context.current_class.clone()) else {
            return Err(BreakpointError::AmbiguousClassSpec {
                spec: spec.trim().to_string(),
                candidates: Vec::new(),
            });
        };
        let pattern = pattern(&name)?;
        if pattern.is_wildcard() || classes.iter().any(|reference| reference.name == name) {
            return Ok(pattern);
        }
        let dotted = format!(".{name}");
        let nested = format!("${name}");
        let mut candidates: Vec<String> = classes
            .iter()
            .filter(|reference| reference.name.ends_with(&dotted) || reference.name.ends_with(&nested))
            .map(|reference| reference.name.clone())
            .collect();
        candidates.sort();
        candidates.dedup();
        match candidates.len() {
            0 => Ok(pattern),
            1 => Ok(ClassPattern::Exact(candidates.remove(0))),
            _ => Err(BreakpointError::AmbiguousClassSpec { spec: name, candidates }),
        }
    }
}

fn new_kind(kind: BreakpointKind) -> Breakpoint
{
    Breakpoint::new(kind)
}

fn pattern(class: &str) -> Result<ClassPattern>
{
    ClassPattern::parse(class).ok_or_else(|| BreakpointError::MalformedClassName(class.to_string()))
}

fn loaded<'a>(class: &ClassPattern, classes: &'a [ReferenceType]) -> Option<&'a ReferenceType>
{
    match class {
        ClassPattern::Exact(name) => classes.iter().find(|reference| &reference.name == name),
        _ => None,
    }
}

fn require_any(requested: bool, message: &str) -> Result<()>
{
    if requested {
        Ok(())
    } else {
        Err(BreakpointError::InvalidCommand(message.to_string()))
    }
}

fn non_empty(expression: &str) -> Result<&str>
{
    let expression = expression.trim();
    if expression.is_empty() {
        Err(BreakpointError::InvalidCommand("empty expression".to_string()))
    } else {
        Ok(expression)
    }
}

/// Check that `method` names exactly one method of a loaded class, or that
/// the argument list picks one overload.
fn check_method(reference: &ReferenceType, method: &str, arguments: Option<&[String]>) -> Result<()>
{
    let overloads: Vec<_> = reference.methods_named(method).collect();
    let missing = || BreakpointError::NoSuchMethod {
        class: reference.name.clone(),
        method: match arguments {
            Some(arguments) => format!("{method}({})", arguments.join(",")),
            None => method.to_string(),
        },
    };
    if overloads.is_empty() {
        return Err(missing());
    }
    match arguments {
        None if overloads.len() > 1 => Err(BreakpointError::AmbiguousMethod {
            class: reference.name.clone(),
            method: method.to_string(),
            candidates: overloads.iter().map(|overload| overload.signature()).collect(),
        }),
        None => Ok(()),
        Some(arguments) => {
            if overloads.iter().any(|overload| overload.matches_arguments(arguments)) {
                Ok(())
            } else {
                Err(missing())
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::types::{MethodInfo, SuspendPolicy};

    fn classes() -> Vec<ReferenceType>
    {
        vec![
            ReferenceType::new("com.acme.Foo").with_lines([10, 11]),
            ReferenceType::new("com.acme.Bar")
                .with_method(MethodInfo::new("run", &[], Some(5)))
                .with_method(MethodInfo::new("put", &["int"], Some(8)))
                .with_method(MethodInfo::new("put", &["java.lang.String"], Some(12))),
            ReferenceType::new("org.other.Bar"),
            ReferenceType::new("com.acme.Stripped").without_line_info(),
        ]
    }

    #[test]
    fn test_partial_name_resolves_to_single_candidate()
    {
        let factory = BreakpointFactory::new();
        let bp = factory
            .create_breakpoint("Foo:10", &DebuggingContext::default(), &classes())
            .unwrap();
        assert_eq!(
            bp.kind(),
            &BreakpointKind::Line {
                class: ClassPattern::Exact("com.acme.Foo".to_string()),
                line: 10,
            }
        );
    }

    #[test]
    fn test_ambiguous_class_lists_candidates()
    {
        let factory = BreakpointFactory::new();
        let err = factory
            .create_breakpoint("Bar:3", &DebuggingContext::default(), &classes())
            .unwrap_err();
        match err {
            BreakpointError::AmbiguousClassSpec { candidates, .. } => {
                assert_eq!(candidates, vec!["com.acme.Bar".to_string(), "org.other.Bar".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bare_line_needs_context()
    {
        let factory = BreakpointFactory::new();
        let err = factory.create_breakpoint("42", &DebuggingContext::default(), &[]).unwrap_err();
        assert!(matches!(err, BreakpointError::AmbiguousClassSpec { ref candidates, .. } if candidates.is_empty()));

        let bp = factory
            .create_breakpoint("42", &DebuggingContext::at("com.acme.Foo", 10), &classes())
            .unwrap();
        assert_eq!(bp.describe(), "com.acme.Foo:42");
    }

    #[test]
    fn test_unloaded_class_kept_as_written()
    {
        let factory = BreakpointFactory::new();
        let bp = factory.create_breakpoint("Later:7", &DebuggingContext::default(), &classes()).unwrap();
        assert_eq!(bp.describe(), "Later:7");
    }

    #[test]
    fn test_absent_line_information()
    {
        let factory = BreakpointFactory::new();
        let err = factory
            .create_breakpoint("com.acme.Stripped:3", &DebuggingContext::default(), &classes())
            .unwrap_err();
        assert!(matches!(err, BreakpointError::AbsentInformation { .. }));
    }

    #[test]
    fn test_method_overloads()
    {
        let factory = BreakpointFactory::new();
        let context = DebuggingContext::default();
        assert!(matches!(
            factory.create_breakpoint("com.acme.Bar.put", &context, &classes()),
            Err(BreakpointError::AmbiguousMethod { ref candidates, .. }) if candidates.len() == 2
        ));
        assert!(factory.create_breakpoint("com.acme.Bar.put(String)", &context, &classes()).is_ok());
        assert!(factory.create_breakpoint("com.acme.Bar.run", &context, &classes()).is_ok());
        assert!(matches!(
            factory.create_breakpoint("com.acme.Bar.put(long)", &context, &classes()),
            Err(BreakpointError::NoSuchMethod { .. })
        ));
    }

    #[test]
    fn test_command_round_trip()
    {
        let factory = BreakpointFactory::new();
        let context = DebuggingContext::default();
        for command in [
            "com.acme.Foo:10",
            "go com.acme.Foo:10 t:main",
            "thread java.io.IOException caught c:com.acme.*",
            "* uncaught",
            "com.acme.Foo.count access modify",
            "worker start death",
            "enter exit c:com.acme.* t:main",
            "all enter",
            "com.acme.* prepare",
        ] {
            let bp = factory.create_from_command(command, &context, &[]).unwrap();
            assert_eq!(bp.describe(), command);
            let again = factory.create_from_command(&bp.describe(), &context, &[]).unwrap();
            assert_eq!(again.kind(), bp.kind());
        }
    }

    #[test]
    fn test_thread_named_like_keyword_round_trips()
    {
        let factory = BreakpointFactory::new();
        let context = DebuggingContext::default();
        for (command, name) in [("start t:go", "go"), ("death t:thread", "thread"), ("start t:death", "death")] {
            let bp = factory.create_from_command(command, &context, &[]).unwrap();
            assert_eq!(bp.thread_filter(), Some(name));
            assert_eq!(bp.describe(), command);
            let again = factory.create_from_command(&bp.describe(), &context, &[]).unwrap();
            assert_eq!(again.kind(), bp.kind());
            assert_eq!(again.thread_filter(), Some(name));
            assert_eq!(again.suspend_policy(), bp.suspend_policy());
        }
    }

    #[test]
    fn test_command_filters_checked_against_kind()
    {
        let factory = BreakpointFactory::new();
        let err = factory
            .create_from_command("Foo:10 c:com.*", &DebuggingContext::default(), &[])
            .unwrap_err();
        assert!(matches!(err, BreakpointError::FilterNotSupported { filter: "class", .. }));
    }

    #[test]
    fn test_kind_constructors_validate_flags()
    {
        let factory = BreakpointFactory::new();
        let bp = factory.create_exception_breakpoint("java.lang.Error", true, false).unwrap();
        assert_eq!(bp.suspend_policy(), SuspendPolicy::All);
        assert!(factory.create_exception_breakpoint("java.lang.Error", false, false).is_err());
        assert!(factory.create_condition("  ").is_err());
        assert_eq!(factory.create_monitor(" x ").unwrap().describe(), "x");
    }
}
