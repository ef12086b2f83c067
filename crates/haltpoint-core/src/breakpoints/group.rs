//! Breakpoint groups.
//!
//! Groups form a tree rooted at the default group. Nodes live in the store's
//! arena and refer to each other by [`GroupId`], so a child never owns its
//! parent.

use std::fmt;

use crate::breakpoints::condition::Condition;
use crate::breakpoints::monitor::Monitor;
use crate::breakpoints::BreakpointId;

/// Stable identifier of a group within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GroupId(u32);

impl GroupId
{
    /// The default (root) group.
    pub const DEFAULT: Self = Self(0);

    /// Create a new identifier from a raw value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self
    {
        Self(value)
    }

    /// Get the raw numeric representation.
    #[must_use]
    pub const fn raw(self) -> u32
    {
        self.0
    }

    pub(crate) const fn index(self) -> usize
    {
        self.0 as usize
    }
}

impl fmt::Display for GroupId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Entry in a group's ordered child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupMember
{
    /// A breakpoint owned by the group
    Breakpoint(BreakpointId),
    /// A nested group
    Group(GroupId),
}

/// A named, nestable container of breakpoints and groups.
#[derive(Debug, Clone)]
pub struct GroupNode
{
    pub(crate) name: String,
    pub(crate) parent: Option<GroupId>,
    pub(crate) children: Vec<GroupMember>,
    pub(crate) enabled: bool,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) monitors: Vec<Monitor>,
}

impl GroupNode
{
    pub(crate) fn new(name: impl Into<String>, parent: Option<GroupId>) -> Self
    {
        Self {
            name: name.into(),
            parent,
            children: Vec::new(),
            enabled: true,
            conditions: Vec::new(),
            monitors: Vec::new(),
        }
    }

    /// Group name, unique among its siblings.
    #[must_use]
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Parent group, `None` only for the default group.
    #[must_use]
    pub const fn parent(&self) -> Option<GroupId>
    {
        self.parent
    }

    /// Ordered children.
    #[must_use]
    pub fn children(&self) -> &[GroupMember]
    {
        &self.children
    }

    /// The group's own enabled flag. Ancestors may still disable it.
    #[must_use]
    pub const fn is_enabled(&self) -> bool
    {
        self.enabled
    }

    /// Conditions every member breakpoint must also satisfy.
    #[must_use]
    pub fn conditions(&self) -> &[Condition]
    {
        &self.conditions
    }

    /// Monitors run whenever a member breakpoint is hit.
    #[must_use]
    pub fn monitors(&self) -> &[Monitor]
    {
        &self.monitors
    }

    pub(crate) fn detach(&mut self, member: GroupMember)
    {
        self.children.retain(|child| *child != member);
    }
}
