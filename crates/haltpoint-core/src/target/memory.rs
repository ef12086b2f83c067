//! Deterministic, in-memory debug target.
//!
//! [`MemoryTarget`] implements both [`EventSource`] and [`Evaluator`]. Tests
//! and the command-line replay drive it by loading classes and triggering
//! events; each trigger returns the notifications the target would deliver,
//! already filtered, for the caller to hand to the manager.
//!
//! Expressions understood by the evaluator: literals (`true`, `42`, `"s"`,
//! `null`), variable names, `!expr`, and one comparison (`a > 5`,
//! `name == "x"`).

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{EvaluationError, SubscriptionError};
use crate::target::{EventDetail, EventSource, Evaluator, MatchSpec, SubscriptionHandle, SubscriptionRequest, TargetEvent};
use crate::types::{Location, ReferenceType, SuspendPolicy, ThreadId, Value};

/// Thread created by [`MemoryTarget::new`].
pub const MAIN_THREAD: ThreadId = ThreadId(1);

#[derive(Debug)]
struct Inner
{
    connected: bool,
    next_handle: u64,
    classes: Vec<ReferenceType>,
    threads: HashMap<ThreadId, String>,
    subscriptions: BTreeMap<SubscriptionHandle, SubscriptionRequest>,
    variables: HashMap<String, Value>,
    failures: HashMap<String, String>,
    rejection: Option<SubscriptionError>,
    resumes: usize,
    evaluations: usize,
}

/// In-memory event source and evaluator.
#[derive(Debug)]
pub struct MemoryTarget
{
    inner: Mutex<Inner>,
}

impl Default for MemoryTarget
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl MemoryTarget
{
    /// A connected target with a single thread named `main`.
    #[must_use]
    pub fn new() -> Self
    {
        let mut threads = HashMap::new();
        threads.insert(MAIN_THREAD, "main".to_string());
        Self {
            inner: Mutex::new(Inner {
                connected: true,
                next_handle: 0,
                classes: Vec::new(),
                threads,
                subscriptions: BTreeMap::new(),
                variables: HashMap::new(),
                failures: HashMap::new(),
                rejection: None,
                resumes: 0,
                evaluations: 0,
            }),
        }
    }

    /// Load a class without notifying anyone. Useful before attaching.
    pub fn define_class(&self, class: ReferenceType)
    {
        let mut inner = self.inner.lock();
        inner.classes.retain(|existing| existing.name != class.name);
        inner.classes.push(class);
    }

    /// Load a class and return the class prepare notifications it causes.
    pub fn load_class(&self, class: ReferenceType) -> Vec<TargetEvent>
    {
        self.define_class(class.clone());
        let name = class.name.clone();
        self.emit(Some(MAIN_THREAD), Some(&name), &EventDetail::ClassPrepare(class), |spec| {
            matches!(spec, MatchSpec::ClassPrepare(pattern) if pattern.matches(&name))
        })
    }

    /// Unload a class and return the class unload notifications it causes.
    pub fn unload_class(&self, name: &str) -> Vec<TargetEvent>
    {
        self.inner.lock().classes.retain(|class| class.name != name);
        let detail = EventDetail::ClassUnload { class: name.to_string() };
        self.emit(None, Some(name), &detail, |spec| {
            matches!(spec, MatchSpec::ClassUnload(pattern) if pattern.matches(name))
        })
    }

    /// Register a thread.
    pub fn add_thread(&self, thread: ThreadId, name: impl Into<String>)
    {
        self.inner.lock().threads.insert(thread, name.into());
    }

    /// Start a thread and return the notifications.
    pub fn start_thread(&self, thread: ThreadId, name: impl Into<String>) -> Vec<TargetEvent>
    {
        let name = name.into();
        self.add_thread(thread, name.clone());
        self.emit(Some(thread), None, &EventDetail::ThreadStart { name }, |spec| {
            matches!(spec, MatchSpec::ThreadStart)
        })
    }

    /// End a thread and return the notifications.
    pub fn end_thread(&self, thread: ThreadId) -> Vec<TargetEvent>
    {
        let name = self.inner.lock().threads.get(&thread).cloned().unwrap_or_default();
        let events = self.emit(Some(thread), None, &EventDetail::ThreadDeath { name }, |spec| {
            matches!(spec, MatchSpec::ThreadDeath)
        });
        self.inner.lock().threads.remove(&thread);
        events
    }

    /// Execute `class:line` on `thread`.
    pub fn hit(&self, class: &str, line: u32, thread: ThreadId) -> Vec<TargetEvent>
    {
        let location = Location::new(class, line);
        let detail = EventDetail::Location(location.clone());
        self.emit(Some(thread), Some(class), &detail, |spec| {
            matches!(spec, MatchSpec::Location(target) if target.class == location.class && target.line == location.line)
        })
    }

    /// Throw an exception of class `class` on `thread`.
    pub fn throw(&self, class: &str, caught: bool, thread: ThreadId) -> Vec<TargetEvent>
    {
        let detail = EventDetail::Exception {
            class: class.to_string(),
            location: None,
            caught,
        };
        self.emit(Some(thread), Some(class), &detail, |spec| match spec {
            MatchSpec::Exception {
                class: pattern,
                caught: on_caught,
                uncaught: on_uncaught,
            } => pattern.matches(class) && (if caught { *on_caught } else { *on_uncaught }),
            _ => false,
        })
    }

    /// Read `class.field` on `thread`.
    pub fn access_field(&self, class: &str, field: &str, thread: ThreadId) -> Vec<TargetEvent>
    {
        let detail = EventDetail::FieldAccess {
            class: class.to_string(),
            field: field.to_string(),
            location: None,
        };
        self.emit(Some(thread), Some(class), &detail, |spec| {
            matches!(spec, MatchSpec::FieldAccess { class: c, field: f } if c == class && f == field)
        })
    }

    /// Write `value` into `class.field` on `thread`.
    pub fn modify_field(&self, class: &str, field: &str, value: Value, thread: ThreadId) -> Vec<TargetEvent>
    {
        let detail = EventDetail::FieldModify {
            class: class.to_string(),
            field: field.to_string(),
            value,
        };
        self.emit(Some(thread), Some(class), &detail, |spec| {
            matches!(spec, MatchSpec::FieldModify { class: c, field: f } if c == class && f == field)
        })
    }

    /// Enter the method at `location` on `thread`.
    pub fn enter_method(&self, location: Location, thread: ThreadId) -> Vec<TargetEvent>
    {
        let class = location.class.clone();
        self.emit(Some(thread), Some(&class), &EventDetail::MethodEntry(location), |spec| {
            matches!(spec, MatchSpec::MethodEntry)
        })
    }

    /// Return from the method at `location` on `thread`.
    pub fn exit_method(&self, location: Location, thread: ThreadId) -> Vec<TargetEvent>
    {
        let class = location.class.clone();
        self.emit(Some(thread), Some(&class), &EventDetail::MethodExit(location), |spec| {
            matches!(spec, MatchSpec::MethodExit)
        })
    }

    fn emit(
        &self,
        thread: Option<ThreadId>,
        class: Option<&str>,
        detail: &EventDetail,
        matches: impl Fn(&MatchSpec) -> bool,
    ) -> Vec<TargetEvent>
    {
        let inner = self.inner.lock();
        if !inner.connected {
            return Vec::new();
        }
        let thread_name = thread.and_then(|id| inner.threads.get(&id));
        inner
            .subscriptions
            .iter()
            .filter(|(_, request)| matches(&request.spec))
            .filter(|(_, request)| {
                request
                    .class_filter
                    .as_ref()
                    .is_none_or(|filter| class.is_some_and(|class| filter.matches(class)))
            })
            .filter(|(_, request)| {
                request
                    .thread_filter
                    .as_ref()
                    .is_none_or(|filter| thread_name.is_some_and(|name| name == filter))
            })
            .map(|(handle, request)| TargetEvent {
                handle: *handle,
                thread,
                suspended: request.suspend_policy,
                detail: detail.clone(),
            })
            .collect()
    }

    /// Set a variable visible to every frame.
    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<Value>)
    {
        self.inner.lock().variables.insert(name.into(), value.into());
    }

    /// Make evaluating `expression` fail with `message`.
    pub fn fail_expression(&self, expression: impl Into<String>, message: impl Into<String>)
    {
        self.inner.lock().failures.insert(expression.into(), message.into());
    }

    /// Reject every subscription with `error` until cleared with `None`.
    pub fn reject_subscriptions(&self, error: Option<SubscriptionError>)
    {
        self.inner.lock().rejection = error;
    }

    /// Drop the connection. Every live subscription becomes invalid.
    pub fn disconnect(&self)
    {
        let mut inner = self.inner.lock();
        inner.connected = false;
        inner.subscriptions.clear();
    }

    /// Live subscriptions, in handle order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscriptionRequest>
    {
        self.inner.lock().subscriptions.values().cloned().collect()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize
    {
        self.inner.lock().subscriptions.len()
    }

    /// Number of resume calls received.
    #[must_use]
    pub fn resume_count(&self) -> usize
    {
        self.inner.lock().resumes
    }

    /// Number of expressions evaluated.
    #[must_use]
    pub fn evaluation_count(&self) -> usize
    {
        self.inner.lock().evaluations
    }
}

impl EventSource for MemoryTarget
{
    fn is_connected(&self) -> bool
    {
        self.inner.lock().connected
    }

    fn classes(&self) -> Vec<ReferenceType>
    {
        let inner = self.inner.lock();
        if inner.connected { inner.classes.clone() } else { Vec::new() }
    }

    fn subscribe(&self, request: &SubscriptionRequest) -> Result<SubscriptionHandle, SubscriptionError>
    {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(SubscriptionError::Disconnected);
        }
        if let Some(error) = &inner.rejection {
            return Err(error.clone());
        }
        inner.next_handle += 1;
        let handle = SubscriptionHandle::from_raw(inner.next_handle);
        trace!(handle = %handle, spec = ?request.spec, "subscribed");
        inner.subscriptions.insert(handle, request.clone());
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SubscriptionError>
    {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(SubscriptionError::Disconnected);
        }
        inner
            .subscriptions
            .remove(&handle)
            .map(|_| ())
            .ok_or(SubscriptionError::InvalidHandle(handle.raw()))
    }

    fn resume(&self, _event: &TargetEvent) -> Result<(), SubscriptionError>
    {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(SubscriptionError::Disconnected);
        }
        inner.resumes += 1;
        Ok(())
    }
}

impl Evaluator for MemoryTarget
{
    fn evaluate(&self, expression: &str, thread: ThreadId, _frame: usize) -> Result<Value, EvaluationError>
    {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(EvaluationError::Disconnected);
        }
        inner.evaluations += 1;
        if let Some(message) = inner.failures.get(expression) {
            return Err(failed(expression, message));
        }
        if !inner.threads.contains_key(&thread) {
            return Err(failed(expression, &format!("no such thread {thread}")));
        }
        evaluate_expression(expression.trim(), &inner.variables).map_err(|message| failed(expression, &message))
    }
}

fn failed(expression: &str, message: &str) -> EvaluationError
{
    EvaluationError::Failed {
        expression: expression.to_string(),
        message: message.to_string(),
    }
}

const OPERATORS: [&str; 6] = ["==", "!=", "<=", ">=", "<", ">"];

fn evaluate_expression(expression: &str, variables: &HashMap<String, Value>) -> Result<Value, String>
{
    for operator in OPERATORS {
        if let Some((left, right)) = expression.split_once(operator) {
            let left = operand(left.trim(), variables)?;
            let right = operand(right.trim(), variables)?;
            return compare(&left, operator, &right).map(Value::Boolean);
        }
    }
    if let Some(inner) = expression.strip_prefix('!') {
        return match evaluate_expression(inner.trim(), variables)? {
            Value::Boolean(value) => Ok(Value::Boolean(!value)),
            other => Err(format!("cannot negate {other}")),
        };
    }
    operand(expression, variables)
}

fn operand(text: &str, variables: &HashMap<String, Value>) -> Result<Value, String>
{
    match text {
        "" => Err("missing operand".to_string()),
        "true" => Ok(Value::Boolean(true)),
        "false" => Ok(Value::Boolean(false)),
        "null" => Ok(Value::Null),
        _ => {
            if let Ok(number) = text.parse::<i64>() {
                return Ok(Value::Integer(number));
            }
            if let Some(quoted) = text.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
                return Ok(Value::Text(quoted.to_string()));
            }
            variables
                .get(text)
                .cloned()
                .ok_or_else(|| format!("cannot resolve symbol {text}"))
        }
    }
}

fn compare(left: &Value, operator: &str, right: &Value) -> Result<bool, String>
{
    match operator {
        "==" => Ok(left == right),
        "!=" => Ok(left != right),
        _ => {
            let (Value::Integer(left), Value::Integer(right)) = (left, right) else {
                return Err(format!("operator {operator} needs numeric operands"));
            };
            Ok(match operator {
                "<" => left < right,
                "<=" => left <= right,
                ">" => left > right,
                _ => left >= right,
            })
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::names::ClassPattern;

    #[test]
    fn test_evaluator_comparisons()
    {
        let target = MemoryTarget::new();
        target.set_variable("count", 6);
        target.set_variable("name", "worker");
        assert_eq!(target.evaluate("count > 5", MAIN_THREAD, 0), Ok(Value::Boolean(true)));
        assert_eq!(target.evaluate("count <= 5", MAIN_THREAD, 0), Ok(Value::Boolean(false)));
        assert_eq!(target.evaluate("name == \"worker\"", MAIN_THREAD, 0), Ok(Value::Boolean(true)));
        assert_eq!(target.evaluate("!true", MAIN_THREAD, 0), Ok(Value::Boolean(false)));
        assert_eq!(target.evaluate("count", MAIN_THREAD, 0), Ok(Value::Integer(6)));
        assert!(target.evaluate("missing > 1", MAIN_THREAD, 0).is_err());
        assert!(target.evaluate("name > 1", MAIN_THREAD, 0).is_err());
    }

    #[test]
    fn test_thread_filter_applied_by_source()
    {
        let target = MemoryTarget::new();
        target.add_thread(ThreadId(2), "worker");
        let mut request = SubscriptionRequest::new(MatchSpec::Location(Location::new("Foo", 10)), SuspendPolicy::All);
        request.thread_filter = Some("worker".to_string());
        target.subscribe(&request).unwrap();
        assert!(target.hit("Foo", 10, MAIN_THREAD).is_empty());
        assert_eq!(target.hit("Foo", 10, ThreadId(2)).len(), 1);
    }

    #[test]
    fn test_disconnect_invalidates_handles()
    {
        let target = MemoryTarget::new();
        let request = SubscriptionRequest::new(
            MatchSpec::ClassPrepare(ClassPattern::parse("*").unwrap()),
            SuspendPolicy::None,
        );
        let handle = target.subscribe(&request).unwrap();
        target.disconnect();
        assert_eq!(target.unsubscribe(handle), Err(SubscriptionError::Disconnected));
        assert_eq!(target.subscribe(&request), Err(SubscriptionError::Disconnected));
        assert!(target.load_class(ReferenceType::new("Foo")).is_empty());
    }
}
