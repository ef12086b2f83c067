//! # Breakpoint Manager
//!
//! Owns the breakpoint tree, keeps it subscribed with the attached target and
//! turns target notifications into stops, silent resumes and trace events.
//!
//! ## Locking
//!
//! All structural state (the store, the subscription routing table and the
//! attached target) sits behind one mutex. Event handling copies what the
//! gate needs out of the store, releases the lock while expressions are
//! evaluated, then re-acquires it for the hit-count bookkeeping. Listener
//! callbacks always run after the lock has been released, so a listener may
//! call straight back into the manager.
//!
//! ## Suspension
//!
//! The target suspends according to the policy a subscription was registered
//! with before it delivers a notification. [`BreakpointManager::handle_event`]
//! either leaves it suspended (a stop) or resumes it; every notification is
//! answered exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use crate::breakpoints::store::BreakpointStore;
use crate::breakpoints::{Breakpoint, BreakpointId, BreakpointState, Condition, GroupId, GroupNode, Monitor};
use crate::error::{BreakpointError, Result, SubscriptionError};
use crate::events::{BreakpointEvent, BreakpointListener};
use crate::gate::{run_gate, GateSnapshot};
use crate::names::ClassPattern;
use crate::resolve;
use crate::target::{EventDetail, EventSource, Evaluator, MatchSpec, SubscriptionHandle, SubscriptionRequest, TargetEvent};
use crate::types::{ReferenceType, SuspendPolicy};

/// Identifier returned by [`BreakpointManager::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What [`BreakpointManager::handle_event`] did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome
{
    /// The gate passed and the target was left suspended
    Stopped(BreakpointId),
    /// The gate passed but the target was resumed: the breakpoint does not
    /// suspend, or the hit fell inside its skip window
    Passed(BreakpointId),
    /// A trace breakpoint ran its monitors
    Traced(BreakpointId),
    /// A condition was false or failed to evaluate
    Filtered(BreakpointId),
    /// The breakpoint was disabled, expired or removed; nothing was evaluated
    /// or the result was discarded
    Ignored,
    /// A class prepare notification bound this many pending breakpoints
    Resolved(usize),
    /// The handle does not belong to this manager
    Unknown,
}

impl EventOutcome
{
    /// Whether the target was left suspended.
    #[must_use]
    pub const fn is_stop(self) -> bool
    {
        matches!(self, Self::Stopped(_))
    }
}

#[derive(Clone)]
struct Attached
{
    source: Arc<dyn EventSource>,
    evaluator: Arc<dyn Evaluator>,
}

#[derive(Debug, Clone, Copy)]
enum Route
{
    /// A subscription matching the breakpoint's own events
    Event(BreakpointId),
    /// A class prepare subscription waiting to resolve the breakpoint
    Prepare(BreakpointId),
}

pub(crate) struct ManagerState
{
    pub(crate) store: BreakpointStore,
    target: Option<Attached>,
    routes: HashMap<SubscriptionHandle, Route>,
}

/// Thread-safe owner of every breakpoint and group of one debugging session.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use haltpoint_core::factory::{BreakpointFactory, DebuggingContext};
/// use haltpoint_core::manager::BreakpointManager;
/// use haltpoint_core::target::memory::{MemoryTarget, MAIN_THREAD};
/// use haltpoint_core::types::ReferenceType;
///
/// let target = Arc::new(MemoryTarget::new());
/// target.define_class(ReferenceType::new("com.acme.Foo").with_lines([10, 11]));
///
/// let manager = BreakpointManager::new();
/// manager.attach(target.clone(), target.clone());
///
/// let factory = BreakpointFactory::new();
/// let bp = factory.create_breakpoint("com.acme.Foo:10", &DebuggingContext::default(), &manager.loaded_classes())?;
/// let id = manager.add_breakpoint(bp)?;
///
/// for event in target.hit("com.acme.Foo", 10, MAIN_THREAD) {
///     assert!(manager.handle_event(&event).is_stop());
/// }
/// assert_eq!(manager.breakpoint(id).unwrap().hit_count(), 1);
/// # Ok::<(), haltpoint_core::error::BreakpointError>(())
/// ```
pub struct BreakpointManager
{
    pub(crate) state: Mutex<ManagerState>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn BreakpointListener>)>>,
    next_listener: AtomicU64,
}

impl Default for BreakpointManager
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl std::fmt::Debug for BreakpointManager
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        let state = self.state.lock();
        f.debug_struct("BreakpointManager")
            .field("breakpoints", &state.store.breakpoint_count(GroupId::DEFAULT, true))
            .field("attached", &state.target.is_some())
            .field("subscriptions", &state.routes.len())
            .finish_non_exhaustive()
    }
}

impl BreakpointManager
{
    /// Create a manager with an empty default group and no target.
    #[must_use]
    pub fn new() -> Self
    {
        Self {
            state: Mutex::new(ManagerState {
                store: BreakpointStore::new(),
                target: None,
                routes: HashMap::new(),
            }),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    // ---------------------------------------------------------------------
    // Listeners
    // ---------------------------------------------------------------------

    /// Register a listener for every future event.
    pub fn add_listener(&self, listener: Arc<dyn BreakpointListener>) -> ListenerId
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool
    {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn publish(&self, events: Vec<BreakpointEvent>)
    {
        if events.is_empty() {
            return;
        }
        let listeners: Vec<Arc<dyn BreakpointListener>> =
            self.listeners.read().iter().map(|(_, listener)| Arc::clone(listener)).collect();
        for event in &events {
            trace!(event = %event.describe(), "publishing");
            for listener in &listeners {
                listener.on_event(event);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Target attachment
    // ---------------------------------------------------------------------

    /// Attach a target and subscribe every effectively enabled breakpoint.
    ///
    /// Runs under the structural lock, so the tree is subscribed as a whole.
    /// A breakpoint whose subscription fails stays unresolved and an
    /// [`BreakpointEvent::ErrorOccurred`] is published for it.
    pub fn attach(&self, source: Arc<dyn EventSource>, evaluator: Arc<dyn Evaluator>)
    {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            state.drop_subscriptions();
            state.target = Some(Attached { source, evaluator });
            for id in state.store.all_breakpoints() {
                if let Err(error) = state.subscribe(id, &mut events) {
                    events.push(subscription_failed(id, &error));
                }
            }
            info!(
                breakpoints = state.store.breakpoint_count(GroupId::DEFAULT, true),
                subscriptions = state.routes.len(),
                "target attached"
            );
        }
        self.publish(events);
    }

    /// Detach from the target.
    ///
    /// Subscriptions are released (best effort) and hit counts reset;
    /// definitions and enabled flags are kept for the next attach.
    pub fn detach(&self)
    {
        let mut state = self.state.lock();
        state.drop_subscriptions();
        state.target = None;
        info!("target detached");
    }

    /// Whether a target is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool
    {
        self.state.lock().target.is_some()
    }

    /// Classes currently loaded in the attached target.
    #[must_use]
    pub fn loaded_classes(&self) -> Vec<ReferenceType>
    {
        let source = self.state.lock().target.as_ref().map(|target| Arc::clone(&target.source));
        source.map(|source| source.classes()).unwrap_or_default()
    }

    // ---------------------------------------------------------------------
    // Breakpoints
    // ---------------------------------------------------------------------

    /// Add a breakpoint to the default group.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::add_breakpoint_to`].
    pub fn add_breakpoint(&self, breakpoint: Breakpoint) -> Result<BreakpointId>
    {
        self.add_breakpoint_to(breakpoint, GroupId::DEFAULT)
    }

    /// Add a breakpoint to `group`, assign its number and subscribe it if a
    /// target is attached.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::GroupNotFound`] when the group does not exist.
    /// [`BreakpointError::Subscription`] when the target rejected the
    /// subscription; the breakpoint has been added regardless and stays
    /// unresolved under the returned number.
    pub fn add_breakpoint_to(&self, breakpoint: Breakpoint, group: GroupId) -> Result<BreakpointId>
    {
        let mut resolution = Vec::new();
        let (id, description, result) = {
            let mut state = self.state.lock();
            let id = state.store.insert(breakpoint, group)?;
            let result = state.subscribe(id, &mut resolution);
            let description = state.store.get(id).map(Breakpoint::describe).unwrap_or_default();
            (id, description, result)
        };
        info!(breakpoint = %id, %description, "breakpoint added");

        let mut events = vec![BreakpointEvent::BreakpointAdded { id, description }];
        events.append(&mut resolution);
        if let Err(error) = &result {
            events.push(subscription_failed(id, error));
        }
        self.publish(events);
        result.map(|()| id).map_err(|source| BreakpointError::Subscription { id, source })
    }

    /// Remove a breakpoint, releasing its subscriptions.
    ///
    /// Removing an unknown breakpoint is a no-op, and so is a failed
    /// unsubscribe: the breakpoint is gone either way. Returns whether a
    /// breakpoint was removed.
    pub fn remove_breakpoint(&self, id: BreakpointId) -> bool
    {
        let mut events = Vec::new();
        let removed = self.state.lock().remove(id, &mut events);
        self.publish(events);
        removed
    }

    /// Remove several breakpoints. Returns how many existed.
    pub fn remove_breakpoints(&self, ids: &[BreakpointId]) -> usize
    {
        let mut events = Vec::new();
        let removed = {
            let mut state = self.state.lock();
            ids.iter().filter(|id| state.remove(**id, &mut events)).count()
        };
        self.publish(events);
        removed
    }

    /// Remove every breakpoint and group.
    pub fn clear(&self) -> usize
    {
        let mut events = Vec::new();
        let removed = {
            let mut state = self.state.lock();
            let ids = state.store.all_breakpoints();
            let count = ids.iter().filter(|id| state.remove(**id, &mut events)).count();
            for group in state.store.groups(GroupId::DEFAULT, true) {
                if let Some(node) = state.store.group(group) {
                    events.push(BreakpointEvent::GroupRemoved {
                        group,
                        name: node.name().to_string(),
                    });
                }
            }
            state.store.clear();
            count
        };
        self.publish(events);
        removed
    }

    /// Copy of a breakpoint.
    #[must_use]
    pub fn breakpoint(&self, id: BreakpointId) -> Option<Breakpoint>
    {
        self.state.lock().store.get(id).cloned()
    }

    /// Copy of the breakpoint with display number `number`.
    #[must_use]
    pub fn breakpoint_by_number(&self, number: u32) -> Option<Breakpoint>
    {
        self.state.lock().store.by_number(number).cloned()
    }

    /// Externally visible state of a breakpoint.
    #[must_use]
    pub fn state(&self, id: BreakpointId) -> Option<BreakpointState>
    {
        let state = self.state.lock();
        let breakpoint = state.store.get(id)?;
        Some(if !state.store.is_effectively_enabled(id) {
            BreakpointState::Disabled
        } else if breakpoint.is_resolved() {
            BreakpointState::Resolved
        } else {
            BreakpointState::Unresolved
        })
    }

    /// Whether the breakpoint and all enclosing groups are enabled and it
    /// has not expired.
    #[must_use]
    pub fn is_effectively_enabled(&self, id: BreakpointId) -> bool
    {
        self.state.lock().store.is_effectively_enabled(id)
    }

    /// Every breakpoint, ascending by number.
    #[must_use]
    pub fn all_breakpoints(&self) -> Vec<BreakpointId>
    {
        self.state.lock().store.all_breakpoints()
    }

    /// Breakpoints under `group`, depth first.
    #[must_use]
    pub fn breakpoints(&self, group: GroupId, recursive: bool) -> Vec<BreakpointId>
    {
        self.state.lock().store.breakpoints(group, recursive)
    }

    /// Number of breakpoints under `group`.
    #[must_use]
    pub fn breakpoint_count(&self, group: GroupId, recursive: bool) -> usize
    {
        self.state.lock().store.breakpoint_count(group, recursive)
    }

    /// Highest display number handed out so far.
    #[must_use]
    pub fn last_number(&self) -> u32
    {
        self.state.lock().store.last_number()
    }

    // ---------------------------------------------------------------------
    // Breakpoint settings
    // ---------------------------------------------------------------------

    /// Enable or disable a breakpoint.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::BreakpointNotFound`], or
    /// [`BreakpointError::Subscription`] when enabling could not subscribe.
    pub fn set_enabled(&self, id: BreakpointId, enabled: bool) -> Result<()>
    {
        self.update(id, |bp| {
            bp.enabled = enabled;
            Ok(())
        })
    }

    /// Change the suspend policy.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::set_enabled`].
    pub fn set_suspend_policy(&self, id: BreakpointId, policy: SuspendPolicy) -> Result<()>
    {
        self.update(id, |bp| {
            bp.suspend_policy = policy;
            Ok(())
        })
    }

    /// Replace the class filter.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::FilterNotSupported`] for kinds without class
    /// filtering, otherwise see [`BreakpointManager::set_enabled`].
    pub fn set_class_filter(&self, id: BreakpointId, filter: Option<ClassPattern>) -> Result<()>
    {
        self.update(id, |bp| bp.set_class_filter(filter))
    }

    /// Replace the thread filter.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::FilterNotSupported`] for kinds without thread
    /// filtering, otherwise see [`BreakpointManager::set_enabled`].
    pub fn set_thread_filter(&self, id: BreakpointId, filter: Option<String>) -> Result<()>
    {
        self.update(id, |bp| bp.set_thread_filter(filter))
    }

    /// Append a condition.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::set_enabled`].
    pub fn add_condition(&self, id: BreakpointId, condition: Condition) -> Result<()>
    {
        self.update(id, |bp| {
            bp.conditions.push(condition);
            Ok(())
        })
    }

    /// Remove the condition at `index`. Returns `None` if out of range.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::set_enabled`].
    pub fn remove_condition(&self, id: BreakpointId, index: usize) -> Result<Option<Condition>>
    {
        let mut removed = None;
        self.update(id, |bp| {
            if index < bp.conditions.len() {
                removed = Some(bp.conditions.remove(index));
            }
            Ok(())
        })?;
        Ok(removed)
    }

    /// Remove every condition.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::set_enabled`].
    pub fn clear_conditions(&self, id: BreakpointId) -> Result<()>
    {
        self.update(id, |bp| {
            bp.conditions.clear();
            Ok(())
        })
    }

    /// Append a monitor.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::set_enabled`].
    pub fn add_monitor(&self, id: BreakpointId, monitor: Monitor) -> Result<()>
    {
        self.update(id, |bp| {
            bp.monitors.push(monitor);
            Ok(())
        })
    }

    /// Remove the monitor at `index`. Returns `None` if out of range.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::set_enabled`].
    pub fn remove_monitor(&self, id: BreakpointId, index: usize) -> Result<Option<Monitor>>
    {
        let mut removed = None;
        self.update(id, |bp| {
            if index < bp.monitors.len() {
                removed = Some(bp.monitors.remove(index));
            }
            Ok(())
        })?;
        Ok(removed)
    }

    /// Remove every monitor.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::set_enabled`].
    pub fn clear_monitors(&self, id: BreakpointId) -> Result<()>
    {
        self.update(id, |bp| {
            bp.monitors.clear();
            Ok(())
        })
    }

    /// Set the number of gate passes to resume silently.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::set_enabled`].
    pub fn set_skip_count(&self, id: BreakpointId, count: u32) -> Result<()>
    {
        self.update(id, |bp| {
            bp.skip_count = count;
            Ok(())
        })
    }

    /// Set the number of gate passes after which the breakpoint expires.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::set_enabled`].
    pub fn set_expire_count(&self, id: BreakpointId, count: u32) -> Result<()>
    {
        self.update(id, |bp| {
            bp.expire_count = count;
            Ok(())
        })
    }

    /// Remove the breakpoint once it expires.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::set_enabled`].
    pub fn set_delete_on_expire(&self, id: BreakpointId, delete: bool) -> Result<()>
    {
        self.update(id, |bp| {
            bp.delete_on_expire = delete;
            Ok(())
        })
    }

    /// Reset the hit count, reviving an expired breakpoint.
    ///
    /// # Errors
    ///
    /// See [`BreakpointManager::set_enabled`].
    pub fn reset_hit_count(&self, id: BreakpointId) -> Result<()>
    {
        self.update(id, |bp| {
            bp.runtime.hit_count = 0;
            Ok(())
        })
    }

    /// Apply `change` and bring the subscriptions in line with the result.
    fn update(&self, id: BreakpointId, change: impl FnOnce(&mut Breakpoint) -> Result<()>) -> Result<()>
    {
        let mut events = Vec::new();
        let result = {
            let mut state = self.state.lock();
            let breakpoint = state
                .store
                .get_mut(id)
                .ok_or(BreakpointError::BreakpointNotFound(id.raw()))?;
            change(breakpoint)?;
            debug!(breakpoint = %id, description = %breakpoint.describe(), "breakpoint updated");
            state.resync(id, &mut events)
        };
        if let Err(error) = &result {
            events.push(subscription_failed(id, error));
        }
        self.publish(events);
        result.map_err(|source| BreakpointError::Subscription { id, source })
    }

    // ---------------------------------------------------------------------
    // Groups
    // ---------------------------------------------------------------------

    /// The root group.
    #[must_use]
    pub const fn default_group(&self) -> GroupId
    {
        GroupId::DEFAULT
    }

    /// Copy of a group node.
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<GroupNode>
    {
        self.state.lock().store.group(id).cloned()
    }

    /// Groups under `group`, depth first, not including it.
    #[must_use]
    pub fn groups(&self, group: GroupId, recursive: bool) -> Vec<GroupId>
    {
        self.state.lock().store.groups(group, recursive)
    }

    /// Number of groups under `group`.
    #[must_use]
    pub fn group_count(&self, group: GroupId, recursive: bool) -> usize
    {
        self.state.lock().store.group_count(group, recursive)
    }

    /// Whether a group and all of its ancestors are enabled.
    #[must_use]
    pub fn is_group_effectively_enabled(&self, group: GroupId) -> bool
    {
        self.state.lock().store.is_group_effectively_enabled(group)
    }

    /// Create a group under `parent`.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::GroupNotFound`] or
    /// [`BreakpointError::DuplicateGroupName`].
    pub fn add_group(&self, name: &str, parent: GroupId) -> Result<GroupId>
    {
        let group = self.state.lock().store.create_group(name, parent)?;
        info!(%group, name, "group added");
        self.publish(vec![BreakpointEvent::GroupAdded {
            group,
            name: name.to_string(),
        }]);
        Ok(group)
    }

    /// Remove a group together with every breakpoint and group below it.
    /// Returns the number of breakpoints removed.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::DefaultGroupImmovable`] for the root,
    /// [`BreakpointError::GroupNotFound`] for an unknown group.
    pub fn remove_group(&self, id: GroupId) -> Result<usize>
    {
        let mut events = Vec::new();
        let count = {
            let mut state = self.state.lock();
            if id == GroupId::DEFAULT {
                return Err(BreakpointError::DefaultGroupImmovable);
            }
            let mut groups = vec![id];
            groups.extend(state.store.groups(id, true));
            let names: Vec<(GroupId, String)> = groups
                .iter()
                .filter_map(|group| state.store.group(*group).map(|node| (*group, node.name().to_string())))
                .collect();
            if names.is_empty() {
                return Err(BreakpointError::GroupNotFound(id.raw()));
            }
            for bp in state.store.breakpoints(id, true) {
                state.release(bp);
            }
            let removed = state.store.remove_group(id)?;
            for breakpoint in &removed {
                if let Some(number) = breakpoint.number() {
                    events.push(BreakpointEvent::BreakpointRemoved {
                        id: number,
                        description: breakpoint.describe(),
                    });
                }
            }
            for (group, name) in names.into_iter().rev() {
                events.push(BreakpointEvent::GroupRemoved { group, name });
            }
            removed.len()
        };
        info!(group = %id, breakpoints = count, "group removed");
        self.publish(events);
        Ok(count)
    }

    /// Rename a group.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::GroupNotFound`] or
    /// [`BreakpointError::DuplicateGroupName`].
    pub fn rename_group(&self, id: GroupId, name: &str) -> Result<()>
    {
        self.state.lock().store.rename_group(id, name)
    }

    /// Enable or disable a group.
    ///
    /// Members keep their own enabled flag: re-enabling the group restores
    /// exactly the breakpoints that were enabled before. Subscription
    /// failures while re-enabling are published as
    /// [`BreakpointEvent::ErrorOccurred`] and leave the breakpoint unresolved.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::GroupNotFound`].
    pub fn set_group_enabled(&self, id: GroupId, enabled: bool) -> Result<()>
    {
        self.update_group(id, |node| {
            node.enabled = enabled;
        })
    }

    /// Append a condition every member of the group must also satisfy.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::GroupNotFound`].
    pub fn add_group_condition(&self, id: GroupId, condition: Condition) -> Result<()>
    {
        self.update_group(id, |node| node.conditions.push(condition))
    }

    /// Remove every condition of the group.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::GroupNotFound`].
    pub fn clear_group_conditions(&self, id: GroupId) -> Result<()>
    {
        self.update_group(id, |node| node.conditions.clear())
    }

    /// Append a monitor run for every member of the group.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::GroupNotFound`].
    pub fn add_group_monitor(&self, id: GroupId, monitor: Monitor) -> Result<()>
    {
        self.update_group(id, |node| node.monitors.push(monitor))
    }

    /// Remove every monitor of the group.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::GroupNotFound`].
    pub fn clear_group_monitors(&self, id: GroupId) -> Result<()>
    {
        self.update_group(id, |node| node.monitors.clear())
    }

    fn update_group(&self, id: GroupId, change: impl FnOnce(&mut GroupNode)) -> Result<()>
    {
        let events = {
            let mut state = self.state.lock();
            let node = state.store.group_mut(id).ok_or(BreakpointError::GroupNotFound(id.raw()))?;
            change(node);
            debug!(group = %id, enabled = node.enabled, "group updated");
            state.resync_group(id)
        };
        self.publish(events);
        Ok(())
    }

    /// Move a breakpoint to another group. Its number is unchanged.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::BreakpointNotFound`] or
    /// [`BreakpointError::GroupNotFound`].
    pub fn move_breakpoint(&self, id: BreakpointId, target: GroupId) -> Result<()>
    {
        let mut events = Vec::new();
        let result = {
            let mut state = self.state.lock();
            state.store.move_breakpoint(id, target)?;
            state.resync(id, &mut events)
        };
        if let Err(error) = &result {
            events.push(subscription_failed(id, error));
        }
        self.publish(events);
        Ok(())
    }

    /// Move a group under another group.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::DefaultGroupImmovable`],
    /// [`BreakpointError::GroupNotFound`],
    /// [`BreakpointError::InvalidGroupMove`] or
    /// [`BreakpointError::DuplicateGroupName`].
    pub fn move_group(&self, id: GroupId, target: GroupId) -> Result<()>
    {
        let events = {
            let mut state = self.state.lock();
            state.store.move_group(id, target)?;
            state.resync_group(id)
        };
        self.publish(events);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Event handling
    // ---------------------------------------------------------------------

    /// Process one notification from the target.
    ///
    /// 1. The handle is routed to its breakpoint; unknown handles are resumed.
    /// 2. Class prepare notifications for pending breakpoints resolve them.
    /// 3. Disabled or expired breakpoints resume without side effects.
    /// 4. Monitors and conditions run without the structural lock held.
    /// 5. A passing gate increments the hit count, then either stops (policy
    ///    suspends, outside the skip window) or resumes. Expiry releases the
    ///    subscriptions, or removes the breakpoint if asked to.
    pub fn handle_event(&self, event: &TargetEvent) -> EventOutcome
    {
        let mut events = Vec::new();

        let (snapshot, target) = {
            let mut state = self.state.lock();
            let Some(target) = state.target.clone() else {
                return EventOutcome::Unknown;
            };
            match state.routes.get(&event.handle).copied() {
                None => {
                    drop(state);
                    debug!(handle = %event.handle, "notification for unknown subscription");
                    resume(&target, event);
                    return EventOutcome::Unknown;
                }
                Some(Route::Prepare(id)) => {
                    let resolved = match &event.detail {
                        EventDetail::ClassPrepare(class) => state.resolve(id, class, &mut events),
                        _ => 0,
                    };
                    drop(state);
                    resume(&target, event);
                    self.publish(events);
                    return EventOutcome::Resolved(resolved);
                }
                Some(Route::Event(id)) => {
                    if !state.store.is_effectively_enabled(id) {
                        drop(state);
                        resume(&target, event);
                        return EventOutcome::Ignored;
                    }
                    match GateSnapshot::capture(&state.store, id) {
                        Some(snapshot) => (snapshot, target),
                        None => {
                            drop(state);
                            resume(&target, event);
                            return EventOutcome::Ignored;
                        }
                    }
                }
            }
        };

        let id = snapshot.id;
        let gate = run_gate(&snapshot, event, target.evaluator.as_ref());
        for error in &gate.errors {
            events.push(BreakpointEvent::ErrorOccurred {
                id: Some(id),
                message: error.to_string(),
            });
        }

        let outcome = {
            let mut state = self.state.lock();
            state.settle(id, &snapshot, gate.passed, event, &mut events)
        };

        self.publish(events);
        if !outcome.is_stop() {
            resume(&target, event);
        }
        outcome
    }
}

impl ManagerState
{
    /// Bookkeeping after the gate ran for `id`.
    fn settle(
        &mut self,
        id: BreakpointId,
        snapshot: &GateSnapshot,
        passed: bool,
        event: &TargetEvent,
        events: &mut Vec<BreakpointEvent>,
    ) -> EventOutcome
    {
        if !self.store.is_effectively_enabled(id) {
            debug!(breakpoint = %id, "breakpoint removed or disabled during evaluation");
            return EventOutcome::Ignored;
        }
        let Some(breakpoint) = self.store.get_mut(id) else {
            return EventOutcome::Ignored;
        };
        if !passed {
            return EventOutcome::Filtered(id);
        }

        breakpoint.runtime.hit_count = breakpoint.runtime.hit_count.saturating_add(1);
        let detail = event.detail.describe();

        let outcome = if snapshot.trace {
            info!(target: "haltpoint::trace", breakpoint = %id, thread = ?event.thread, "{detail}");
            events.push(BreakpointEvent::Traced {
                id,
                thread: event.thread,
                detail,
            });
            EventOutcome::Traced(id)
        } else if breakpoint.is_skipping() {
            trace!(breakpoint = %id, hits = breakpoint.runtime.hit_count, "skipping");
            EventOutcome::Passed(id)
        } else if breakpoint.suspend_policy.suspends() {
            info!(breakpoint = %id, thread = ?event.thread, %detail, "breakpoint hit");
            events.push(BreakpointEvent::Stopped {
                id,
                thread: event.thread,
                detail,
            });
            EventOutcome::Stopped(id)
        } else {
            EventOutcome::Passed(id)
        };

        if breakpoint.is_expired() {
            let delete = breakpoint.delete_on_expire;
            debug!(breakpoint = %id, delete, "breakpoint expired");
            if delete {
                self.remove(id, events);
            } else {
                self.release(id);
            }
        }
        outcome
    }

    fn source(&self) -> Option<Arc<dyn EventSource>>
    {
        self.target.as_ref().map(|target| Arc::clone(&target.source))
    }

    /// Whether the breakpoint or any enclosing group has conditions or
    /// monitors.
    fn has_gate_work(&self, breakpoint: &Breakpoint) -> bool
    {
        breakpoint.has_gate_work()
            || self.store.ancestry(breakpoint.group()).iter().any(|group| {
                self.store
                    .group(*group)
                    .is_some_and(|node| !node.conditions().is_empty() || !node.monitors().is_empty())
            })
    }

    /// Subscribe an effectively enabled breakpoint that holds no handles.
    ///
    /// Without a target this does nothing. On failure every handle obtained
    /// so far is released again. A loaded class that an exact pattern names
    /// but that cannot bind the breakpoint is reported into `events`.
    fn subscribe(
        &mut self,
        id: BreakpointId,
        events: &mut Vec<BreakpointEvent>,
    ) -> std::result::Result<(), SubscriptionError>
    {
        let Some(source) = self.source() else {
            return Ok(());
        };
        if !self.store.is_effectively_enabled(id) {
            return Ok(());
        }
        let Some(breakpoint) = self.store.get(id) else {
            return Ok(());
        };
        let policy = resolve::request_policy(breakpoint, self.has_gate_work(breakpoint));

        let mut handles = Vec::new();
        let mut prepare = None;
        let mut resolve_error = None;
        let mut outcome = Ok(());

        if breakpoint.kind().needs_resolution() {
            let pattern = breakpoint.kind().class_pattern().cloned().unwrap_or(ClassPattern::Any);
            'classes: for class in source.classes().iter().filter(|class| pattern.matches(&class.name)) {
                match resolve::class_specs(breakpoint.kind(), class) {
                    Ok(specs) => {
                        for spec in specs {
                            match source.subscribe(&resolve::request(breakpoint, spec, policy)) {
                                Ok(handle) => handles.push(handle),
                                Err(error) => {
                                    outcome = Err(error);
                                    break 'classes;
                                }
                            }
                        }
                    }
                    Err(error) if pattern.is_wildcard() => {
                        debug!(breakpoint = %id, class = %class.name, %error, "class does not match breakpoint");
                        resolve_error = Some(error.to_string());
                    }
                    Err(error) => {
                        warn!(breakpoint = %id, class = %class.name, %error, "cannot resolve breakpoint");
                        events.push(BreakpointEvent::ErrorOccurred {
                            id: Some(id),
                            message: error.to_string(),
                        });
                        resolve_error = Some(error.to_string());
                    }
                }
            }
            if outcome.is_ok() && (handles.is_empty() || pattern.is_wildcard()) {
                let request = SubscriptionRequest::new(MatchSpec::ClassPrepare(pattern), SuspendPolicy::EventThread);
                match source.subscribe(&request) {
                    Ok(handle) => prepare = Some(handle),
                    Err(error) => outcome = Err(error),
                }
            }
        } else {
            for spec in resolve::direct_specs(breakpoint.kind()) {
                match source.subscribe(&resolve::request(breakpoint, spec, policy)) {
                    Ok(handle) => handles.push(handle),
                    Err(error) => {
                        outcome = Err(error);
                        break;
                    }
                }
            }
        }

        if let Err(error) = outcome {
            warn!(breakpoint = %id, %error, "subscription failed");
            for handle in handles.into_iter().chain(prepare) {
                let _ = source.unsubscribe(handle);
            }
            if let Some(breakpoint) = self.store.get_mut(id) {
                breakpoint.runtime.resolve_error = Some(error.to_string());
            }
            return Err(error);
        }

        for handle in &handles {
            self.routes.insert(*handle, Route::Event(id));
        }
        if let Some(handle) = prepare {
            self.routes.insert(handle, Route::Prepare(id));
        }
        if let Some(breakpoint) = self.store.get_mut(id) {
            trace!(breakpoint = %id, handles = handles.len(), pending = prepare.is_some(), "subscribed");
            breakpoint.runtime.handles.extend(handles);
            breakpoint.runtime.prepare_handle = prepare;
            breakpoint.runtime.resolve_error = resolve_error;
        }
        Ok(())
    }

    /// Release every subscription of a breakpoint. Errors are ignored.
    fn release(&mut self, id: BreakpointId)
    {
        let source = self.source();
        let Some(breakpoint) = self.store.get_mut(id) else {
            return;
        };
        let handles: Vec<SubscriptionHandle> = breakpoint
            .runtime
            .handles
            .drain(..)
            .chain(breakpoint.runtime.prepare_handle.take())
            .collect();
        for handle in handles {
            self.routes.remove(&handle);
            if let Some(source) = &source {
                if let Err(error) = source.unsubscribe(handle) {
                    debug!(breakpoint = %id, %handle, %error, "unsubscribe failed");
                }
            }
        }
    }

    fn resync(&mut self, id: BreakpointId, events: &mut Vec<BreakpointEvent>) -> std::result::Result<(), SubscriptionError>
    {
        self.release(id);
        self.subscribe(id, events)
    }

    fn resync_group(&mut self, group: GroupId) -> Vec<BreakpointEvent>
    {
        let mut events = Vec::new();
        for id in self.store.breakpoints(group, true) {
            if let Err(error) = self.resync(id, &mut events) {
                events.push(subscription_failed(id, &error));
            }
        }
        events
    }

    fn remove(&mut self, id: BreakpointId, events: &mut Vec<BreakpointEvent>) -> bool
    {
        self.release(id);
        match self.store.remove(id) {
            Some(breakpoint) => {
                let description = breakpoint.describe();
                info!(breakpoint = %id, %description, "breakpoint removed");
                events.push(BreakpointEvent::BreakpointRemoved { id, description });
                true
            }
            None => false,
        }
    }

    /// Bind a pending breakpoint to a freshly prepared class.
    fn resolve(&mut self, id: BreakpointId, class: &ReferenceType, events: &mut Vec<BreakpointEvent>) -> usize
    {
        let Some(source) = self.source() else {
            return 0;
        };
        if !self.store.is_effectively_enabled(id) {
            return 0;
        }
        let Some(breakpoint) = self.store.get(id) else {
            return 0;
        };
        let pattern = breakpoint.kind().class_pattern().cloned().unwrap_or(ClassPattern::Any);
        if !pattern.matches(&class.name) {
            return 0;
        }
        let policy = resolve::request_policy(breakpoint, self.has_gate_work(breakpoint));

        let specs = match resolve::class_specs(breakpoint.kind(), class) {
            Ok(specs) => specs,
            Err(error) if pattern.is_wildcard() => {
                debug!(breakpoint = %id, class = %class.name, %error, "class does not match breakpoint");
                return 0;
            }
            Err(error) => {
                warn!(breakpoint = %id, class = %class.name, %error, "cannot resolve breakpoint");
                events.push(BreakpointEvent::ErrorOccurred {
                    id: Some(id),
                    message: error.to_string(),
                });
                if let Some(breakpoint) = self.store.get_mut(id) {
                    breakpoint.runtime.resolve_error = Some(error.to_string());
                }
                return 0;
            }
        };

        let mut handles = Vec::new();
        for spec in specs {
            match source.subscribe(&resolve::request(breakpoint, spec, policy)) {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    events.push(subscription_failed(id, &error));
                    break;
                }
            }
        }
        if handles.is_empty() {
            return 0;
        }

        info!(breakpoint = %id, class = %class.name, "breakpoint resolved");
        let resolved = handles.len();
        for handle in &handles {
            self.routes.insert(*handle, Route::Event(id));
        }
        let mut stale = None;
        if let Some(breakpoint) = self.store.get_mut(id) {
            breakpoint.runtime.handles.extend(handles);
            breakpoint.runtime.resolve_error = None;
            if !pattern.is_wildcard() {
                stale = breakpoint.runtime.prepare_handle.take();
            }
        }
        if let Some(handle) = stale {
            self.routes.remove(&handle);
            let _ = source.unsubscribe(handle);
        }
        resolved
    }

    /// Release everything and forget hit counts.
    fn drop_subscriptions(&mut self)
    {
        for id in self.store.all_breakpoints() {
            self.release(id);
        }
        self.routes.clear();
        for breakpoint in self.store.breakpoints_mut() {
            breakpoint.reset_runtime();
        }
    }

    /// Re-subscribe after the store was replaced wholesale.
    pub(crate) fn subscribe_all(&mut self) -> Vec<BreakpointEvent>
    {
        let mut events = Vec::new();
        for id in self.store.all_breakpoints() {
            if let Err(error) = self.subscribe(id, &mut events) {
                events.push(subscription_failed(id, &error));
            }
        }
        events
    }

    pub(crate) fn release_all(&mut self)
    {
        for id in self.store.all_breakpoints() {
            self.release(id);
        }
    }
}

fn subscription_failed(id: BreakpointId, error: &SubscriptionError) -> BreakpointEvent
{
    BreakpointEvent::ErrorOccurred {
        id: Some(id),
        message: format!("subscription failed: {error}"),
    }
}

fn resume(target: &Attached, event: &TargetEvent)
{
    if !event.suspended.suspends() {
        return;
    }
    if let Err(error) = target.source.resume(event) {
        warn!(handle = %event.handle, %error, "failed to resume target");
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::breakpoints::BreakpointKind;
    use crate::target::memory::{MemoryTarget, MAIN_THREAD};

    fn line(class: &str, line: u32) -> Breakpoint
    {
        Breakpoint::new(BreakpointKind::Line {
            class: ClassPattern::parse(class).unwrap(),
            line,
        })
    }

    fn attached() -> (BreakpointManager, Arc<MemoryTarget>)
    {
        let target = Arc::new(MemoryTarget::new());
        target.define_class(ReferenceType::new("Foo").with_lines([10, 11, 12]));
        let manager = BreakpointManager::new();
        manager.attach(target.clone(), target.clone());
        (manager, target)
    }

    #[test]
    fn test_add_resolves_against_loaded_class()
    {
        let (manager, target) = attached();
        let id = manager.add_breakpoint(line("Foo", 10)).unwrap();
        assert_eq!(id.raw(), 1);
        assert_eq!(manager.state(id), Some(BreakpointState::Resolved));
        assert_eq!(target.subscription_count(), 1);
    }

    #[test]
    fn test_disable_releases_and_enable_resubscribes()
    {
        let (manager, target) = attached();
        let id = manager.add_breakpoint(line("Foo", 10)).unwrap();
        manager.set_enabled(id, false).unwrap();
        assert_eq!(target.subscription_count(), 0);
        assert_eq!(manager.state(id), Some(BreakpointState::Disabled));
        manager.set_enabled(id, true).unwrap();
        assert_eq!(manager.state(id), Some(BreakpointState::Resolved));
    }

    #[test]
    fn test_expired_breakpoint_is_deleted_after_stop()
    {
        let (manager, target) = attached();
        let id = manager.add_breakpoint(line("Foo", 11)).unwrap();
        manager.set_expire_count(id, 1).unwrap();
        manager.set_delete_on_expire(id, true).unwrap();
        let events = target.hit("Foo", 11, MAIN_THREAD);
        assert_eq!(manager.handle_event(&events[0]), EventOutcome::Stopped(id));
        assert!(manager.breakpoint(id).is_none());
        assert_eq!(target.subscription_count(), 0);
    }

    #[test]
    fn test_unknown_handle_is_resumed()
    {
        let (manager, target) = attached();
        let event = TargetEvent {
            handle: SubscriptionHandle::from_raw(99),
            thread: Some(MAIN_THREAD),
            suspended: SuspendPolicy::All,
            detail: EventDetail::Location(crate::types::Location::new("Foo", 10)),
        };
        assert_eq!(manager.handle_event(&event), EventOutcome::Unknown);
        assert_eq!(target.resume_count(), 1);
    }

    #[test]
    fn test_listener_removal()
    {
        struct Nop;
        impl BreakpointListener for Nop {}

        let manager = BreakpointManager::new();
        let id = manager.add_listener(Arc::new(Nop));
        assert!(manager.remove_listener(id));
        assert!(!manager.remove_listener(id));
    }
}
