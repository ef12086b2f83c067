//! # Persistence
//!
//! Saving and restoring the breakpoint tree as JSON.
//!
//! Only definitions are written: kinds, filters, conditions, monitors,
//! counts, enabled flags and the group structure. Hit counts and
//! subscriptions belong to a connection and are rebuilt on attach.
//! Breakpoint numbers are kept, and the manager's counter is moved past the
//! highest saved number so restored and new breakpoints never collide.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::breakpoints::store::{BreakpointStore, DEFAULT_GROUP_NAME};
use crate::breakpoints::{Breakpoint, Condition, GroupId, GroupMember, Monitor};
use crate::error::{BreakpointError, Result};
use crate::events::BreakpointEvent;
use crate::manager::BreakpointManager;

/// Format version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized breakpoint tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot
{
    /// Format version
    pub version: u32,
    /// Highest breakpoint number handed out when the snapshot was taken
    pub last_number: u32,
    /// The default group and everything below it
    pub root: GroupRecord,
}

/// One group of a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord
{
    /// Group name
    pub name: String,
    /// The group's own enabled flag
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Conditions applied to every member
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Monitors run for every member
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monitors: Vec<Monitor>,
    /// Children in order
    #[serde(default)]
    pub members: Vec<MemberRecord>,
}

const fn enabled() -> bool
{
    true
}

/// Child entry of a [`GroupRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemberRecord
{
    /// A breakpoint definition
    Breakpoint(Breakpoint),
    /// A nested group
    Group(GroupRecord),
}

impl PartialEq for MemberRecord
{
    fn eq(&self, other: &Self) -> bool
    {
        match (self, other) {
            (Self::Breakpoint(a), Self::Breakpoint(b)) => {
                a.number() == b.number() && a.describe() == b.describe() && a.is_enabled() == b.is_enabled()
            }
            (Self::Group(a), Self::Group(b)) => a == b,
            _ => false,
        }
    }
}

impl Snapshot
{
    /// Render as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::Persistence`] if serialization fails.
    pub fn to_json(&self) -> Result<String>
    {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse JSON produced by [`Snapshot::to_json`].
    ///
    /// # Errors
    ///
    /// [`BreakpointError::Persistence`] for malformed input,
    /// [`BreakpointError::UnsupportedVersion`] for files from a newer format.
    pub fn from_json(text: &str) -> Result<Self>
    {
        let snapshot: Self = serde_json::from_str(text)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(BreakpointError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Number of breakpoints in the snapshot.
    #[must_use]
    pub fn breakpoint_count(&self) -> usize
    {
        fn count(group: &GroupRecord) -> usize
        {
            group
                .members
                .iter()
                .map(|member| match member {
                    MemberRecord::Breakpoint(_) => 1,
                    MemberRecord::Group(group) => count(group),
                })
                .sum()
        }
        count(&self.root)
    }
}

fn record(store: &BreakpointStore, group: GroupId) -> GroupRecord
{
    let Some(node) = store.group(group) else {
        return GroupRecord {
            name: DEFAULT_GROUP_NAME.to_string(),
            enabled: true,
            conditions: Vec::new(),
            monitors: Vec::new(),
            members: Vec::new(),
        };
    };
    let members = node
        .children()
        .iter()
        .filter_map(|member| match member {
            GroupMember::Breakpoint(id) => store.get(*id).cloned().map(MemberRecord::Breakpoint),
            GroupMember::Group(child) => Some(MemberRecord::Group(record(store, *child))),
        })
        .collect();
    GroupRecord {
        name: node.name().to_string(),
        enabled: node.is_enabled(),
        conditions: node.conditions().to_vec(),
        monitors: node.monitors().to_vec(),
        members,
    }
}

fn rebuild(store: &mut BreakpointStore, group: GroupId, record: &GroupRecord) -> Result<()>
{
    if let Some(node) = store.group_mut(group) {
        node.enabled = record.enabled;
        node.conditions.clone_from(&record.conditions);
        node.monitors.clone_from(&record.monitors);
    }
    for member in &record.members {
        match member {
            MemberRecord::Breakpoint(breakpoint) => {
                let mut breakpoint = breakpoint.clone();
                breakpoint.reset_runtime();
                // Filters bypass validation when deserialized.
                let class_filter = breakpoint.class_filter.take();
                let thread_filter = breakpoint.thread_filter.take();
                breakpoint.set_class_filter(class_filter)?;
                breakpoint.set_thread_filter(thread_filter)?;
                store.insert(breakpoint, group)?;
            }
            MemberRecord::Group(child) => {
                let id = store.create_group(&child.name, group)?;
                rebuild(store, id, child)?;
            }
        }
    }
    Ok(())
}

impl BreakpointManager
{
    /// Capture the breakpoint tree.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot
    {
        let state = self.state.lock();
        Snapshot {
            version: SNAPSHOT_VERSION,
            last_number: state.store.last_number(),
            root: record(&state.store, GroupId::DEFAULT),
        }
    }

    /// Replace the breakpoint tree with `snapshot`.
    ///
    /// The new tree is built aside first; on error the current tree is left
    /// untouched. Existing breakpoints are released and reported as removed,
    /// restored ones are subscribed if a target is attached.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::UnsupportedVersion`], or any validation error of
    /// the restored definitions (filters, duplicate group names).
    pub fn restore(&self, snapshot: &Snapshot) -> Result<()>
    {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(BreakpointError::UnsupportedVersion(snapshot.version));
        }
        let mut store = BreakpointStore::new();
        store.reserve_numbers(snapshot.last_number);
        rebuild(&mut store, GroupId::DEFAULT, &snapshot.root)?;

        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            state.release_all();
            store.reserve_numbers(state.store.last_number());
            let previous = std::mem::replace(&mut state.store, store);
            for id in previous.all_breakpoints() {
                if let Some(breakpoint) = previous.get(id) {
                    events.push(BreakpointEvent::BreakpointRemoved {
                        id,
                        description: breakpoint.describe(),
                    });
                }
            }
            for group in previous.groups(GroupId::DEFAULT, true) {
                if let Some(node) = previous.group(group) {
                    events.push(BreakpointEvent::GroupRemoved {
                        group,
                        name: node.name().to_string(),
                    });
                }
            }
            for group in state.store.groups(GroupId::DEFAULT, true) {
                if let Some(node) = state.store.group(group) {
                    events.push(BreakpointEvent::GroupAdded {
                        group,
                        name: node.name().to_string(),
                    });
                }
            }
            for id in state.store.all_breakpoints() {
                if let Some(breakpoint) = state.store.get(id) {
                    events.push(BreakpointEvent::BreakpointAdded {
                        id,
                        description: breakpoint.describe(),
                    });
                }
            }
            events.extend(state.subscribe_all());
            info!(breakpoints = state.store.breakpoint_count(GroupId::DEFAULT, true), "breakpoints restored");
        }
        self.publish(events);
        Ok(())
    }

    /// Write the breakpoint tree to `path` as JSON.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::Persistence`] or [`BreakpointError::Io`].
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()>
    {
        let json = self.snapshot().to_json()?;
        fs::write(path.as_ref(), json)?;
        info!(path = %path.as_ref().display(), "breakpoints saved");
        Ok(())
    }

    /// Replace the breakpoint tree with the one stored at `path`.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::Io`], [`BreakpointError::Persistence`], or any
    /// error of [`BreakpointManager::restore`].
    pub fn load_from(&self, path: impl AsRef<Path>) -> Result<()>
    {
        let text = fs::read_to_string(path.as_ref())?;
        self.restore(&Snapshot::from_json(&text)?)
    }
}
