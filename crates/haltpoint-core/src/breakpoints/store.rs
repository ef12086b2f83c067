//! Arena holding the group tree and every breakpoint of one manager.
//!
//! The store is plain data: it knows nothing about the target and never
//! blocks. The manager wraps it in its structural mutex.

use std::collections::HashMap;

use crate::breakpoints::group::{GroupId, GroupMember, GroupNode};
use crate::breakpoints::{Breakpoint, BreakpointId};
use crate::error::{BreakpointError, Result};

/// Name of the root group.
pub const DEFAULT_GROUP_NAME: &str = "Default";

/// Breakpoints and groups addressed by stable integer ids.
#[derive(Debug)]
pub struct BreakpointStore
{
    next_number: u32,
    breakpoints: HashMap<BreakpointId, Breakpoint>,
    groups: Vec<Option<GroupNode>>,
}

impl Default for BreakpointStore
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl BreakpointStore
{
    /// Create a store holding only the default group.
    #[must_use]
    pub fn new() -> Self
    {
        Self {
            next_number: 0,
            breakpoints: HashMap::new(),
            groups: vec![Some(GroupNode::new(DEFAULT_GROUP_NAME, None))],
        }
    }

    fn allocate_number(&mut self) -> BreakpointId
    {
        self.next_number = self.next_number.saturating_add(1);
        BreakpointId::from_raw(self.next_number)
    }

    /// Highest number handed out so far.
    #[must_use]
    pub const fn last_number(&self) -> u32
    {
        self.next_number
    }

    /// Make sure no number up to `last` is handed out again.
    pub(crate) fn reserve_numbers(&mut self, last: u32)
    {
        self.next_number = self.next_number.max(last);
    }

    /// Insert a breakpoint into `group` and return its number.
    ///
    /// A breakpoint that already carries a number (restored from disk) keeps
    /// it, and the counter moves past it so it is never handed out again.
    ///
    /// # Errors
    ///
    /// Fails when the group does not exist.
    pub fn insert(&mut self, mut breakpoint: Breakpoint, group: GroupId) -> Result<BreakpointId>
    {
        if self.group(group).is_none() {
            return Err(BreakpointError::GroupNotFound(group.raw()));
        }
        let id = match breakpoint.number {
            Some(id) if !self.breakpoints.contains_key(&id) => {
                self.next_number = self.next_number.max(id.raw());
                id
            }
            _ => self.allocate_number(),
        };
        breakpoint.number = Some(id);
        breakpoint.group = group;
        self.group_mut(group)
            .ok_or(BreakpointError::GroupNotFound(group.raw()))?
            .children
            .push(GroupMember::Breakpoint(id));
        self.breakpoints.insert(id, breakpoint);
        Ok(id)
    }

    /// Remove a breakpoint and detach it from its group.
    pub fn remove(&mut self, id: BreakpointId) -> Option<Breakpoint>
    {
        let breakpoint = self.breakpoints.remove(&id)?;
        if let Some(group) = self.group_mut(breakpoint.group) {
            group.detach(GroupMember::Breakpoint(id));
        }
        Some(breakpoint)
    }

    /// Retrieve a breakpoint by id.
    pub fn get(&self, id: BreakpointId) -> Option<&Breakpoint>
    {
        self.breakpoints.get(&id)
    }

    /// Retrieve a mutable reference to a breakpoint by id.
    pub fn get_mut(&mut self, id: BreakpointId) -> Option<&mut Breakpoint>
    {
        self.breakpoints.get_mut(&id)
    }

    /// Look up a breakpoint by its display number.
    pub fn by_number(&self, number: u32) -> Option<&Breakpoint>
    {
        self.breakpoints.get(&BreakpointId::from_raw(number))
    }

    /// The root group.
    #[must_use]
    pub const fn default_group(&self) -> GroupId
    {
        GroupId::DEFAULT
    }

    /// Retrieve a group by id.
    pub fn group(&self, id: GroupId) -> Option<&GroupNode>
    {
        self.groups.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn group_mut(&mut self, id: GroupId) -> Option<&mut GroupNode>
    {
        self.groups.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn name_taken(&self, parent: GroupId, name: &str, except: Option<GroupId>) -> bool
    {
        self.group(parent).is_some_and(|node| {
            node.children.iter().any(|member| match member {
                GroupMember::Group(child) if Some(*child) != except => {
                    self.group(*child).is_some_and(|group| group.name == name)
                }
                _ => false,
            })
        })
    }

    /// Create an empty group under `parent`.
    ///
    /// # Errors
    ///
    /// Fails when the parent does not exist or a sibling already has the name.
    pub fn create_group(&mut self, name: &str, parent: GroupId) -> Result<GroupId>
    {
        if self.group(parent).is_none() {
            return Err(BreakpointError::GroupNotFound(parent.raw()));
        }
        if self.name_taken(parent, name, None) {
            return Err(BreakpointError::DuplicateGroupName(name.to_string()));
        }
        let raw = u32::try_from(self.groups.len()).map_err(|_| BreakpointError::GroupNotFound(u32::MAX))?;
        let id = GroupId::from_raw(raw);
        self.groups.push(Some(GroupNode::new(name, Some(parent))));
        if let Some(parent) = self.group_mut(parent) {
            parent.children.push(GroupMember::Group(id));
        }
        Ok(id)
    }

    /// Rename a group.
    ///
    /// # Errors
    ///
    /// Fails when the group does not exist or a sibling already has the name.
    pub fn rename_group(&mut self, id: GroupId, name: &str) -> Result<()>
    {
        let parent = self.group(id).ok_or(BreakpointError::GroupNotFound(id.raw()))?.parent;
        if let Some(parent) = parent {
            if self.name_taken(parent, name, Some(id)) {
                return Err(BreakpointError::DuplicateGroupName(name.to_string()));
            }
        }
        if let Some(group) = self.group_mut(id) {
            group.name = name.to_string();
        }
        Ok(())
    }

    /// Remove a group with all of its descendants.
    ///
    /// Returns the breakpoints that were removed along with it; callers that
    /// hold live subscriptions should release them before calling this.
    ///
    /// # Errors
    ///
    /// Fails for the default group or an unknown group.
    pub fn remove_group(&mut self, id: GroupId) -> Result<Vec<Breakpoint>>
    {
        if id == GroupId::DEFAULT {
            return Err(BreakpointError::DefaultGroupImmovable);
        }
        let parent = self.group(id).ok_or(BreakpointError::GroupNotFound(id.raw()))?.parent;
        let mut removed = Vec::new();
        for bp in self.breakpoints(id, true) {
            if let Some(breakpoint) = self.breakpoints.remove(&bp) {
                removed.push(breakpoint);
            }
        }
        for group in self.groups(id, true) {
            self.groups[group.index()] = None;
        }
        self.groups[id.index()] = None;
        if let Some(parent) = parent.and_then(|parent| self.group_mut(parent)) {
            parent.detach(GroupMember::Group(id));
        }
        Ok(removed)
    }

    /// Breakpoints under `group` in depth-first child order.
    ///
    /// With `recursive` false only direct children are returned.
    #[must_use]
    pub fn breakpoints(&self, group: GroupId, recursive: bool) -> Vec<BreakpointId>
    {
        let mut out = Vec::new();
        self.walk(group, recursive, &mut |member| {
            if let GroupMember::Breakpoint(id) = member {
                out.push(id);
            }
        });
        out
    }

    /// Groups under `group` (not including it) in depth-first child order.
    #[must_use]
    pub fn groups(&self, group: GroupId, recursive: bool) -> Vec<GroupId>
    {
        let mut out = Vec::new();
        self.walk(group, recursive, &mut |member| {
            if let GroupMember::Group(id) = member {
                out.push(id);
            }
        });
        out
    }

    fn walk(&self, group: GroupId, recursive: bool, visit: &mut dyn FnMut(GroupMember))
    {
        let Some(node) = self.group(group) else {
            return;
        };
        for member in &node.children {
            visit(*member);
            if let GroupMember::Group(child) = member {
                if recursive {
                    self.walk(*child, true, visit);
                }
            }
        }
    }

    /// Every breakpoint in the store, ascending by number.
    #[must_use]
    pub fn all_breakpoints(&self) -> Vec<BreakpointId>
    {
        let mut ids: Vec<BreakpointId> = self.breakpoints.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// `group` followed by its ancestors up to the root.
    #[must_use]
    pub fn ancestry(&self, group: GroupId) -> Vec<GroupId>
    {
        let mut chain = Vec::new();
        let mut current = Some(group);
        while let Some(id) = current {
            let Some(node) = self.group(id) else {
                break;
            };
            chain.push(id);
            current = node.parent;
        }
        chain
    }

    /// Whether a group and all of its ancestors are enabled.
    #[must_use]
    pub fn is_group_effectively_enabled(&self, group: GroupId) -> bool
    {
        self.ancestry(group)
            .iter()
            .all(|id| self.group(*id).is_some_and(GroupNode::is_enabled))
    }

    /// Whether a breakpoint would currently react to events: its own flag,
    /// every enclosing group, and its expire count all permit it.
    #[must_use]
    pub fn is_effectively_enabled(&self, id: BreakpointId) -> bool
    {
        self.get(id).is_some_and(|bp| {
            bp.enabled && !bp.is_expired() && self.is_group_effectively_enabled(bp.group)
        })
    }

    /// Number of breakpoints under `group`.
    #[must_use]
    pub fn breakpoint_count(&self, group: GroupId, recursive: bool) -> usize
    {
        self.breakpoints(group, recursive).len()
    }

    /// Number of groups under `group`.
    #[must_use]
    pub fn group_count(&self, group: GroupId, recursive: bool) -> usize
    {
        self.groups(group, recursive).len()
    }

    /// Move a breakpoint into another group. The number is unaffected.
    ///
    /// # Errors
    ///
    /// Fails when either the breakpoint or the group does not exist.
    pub fn move_breakpoint(&mut self, id: BreakpointId, target: GroupId) -> Result<()>
    {
        if self.group(target).is_none() {
            return Err(BreakpointError::GroupNotFound(target.raw()));
        }
        let breakpoint = self.breakpoints.get_mut(&id).ok_or(BreakpointError::BreakpointNotFound(id.raw()))?;
        let previous = std::mem::replace(&mut breakpoint.group, target);
        if let Some(group) = self.group_mut(previous) {
            group.detach(GroupMember::Breakpoint(id));
        }
        if let Some(group) = self.group_mut(target) {
            group.children.push(GroupMember::Breakpoint(id));
        }
        Ok(())
    }

    /// Move a group (with its contents) under another group.
    ///
    /// # Errors
    ///
    /// Fails for the default group, unknown groups, a target inside the moved
    /// group, or a name clash at the target.
    pub fn move_group(&mut self, id: GroupId, target: GroupId) -> Result<()>
    {
        if id == GroupId::DEFAULT {
            return Err(BreakpointError::DefaultGroupImmovable);
        }
        let node = self.group(id).ok_or(BreakpointError::GroupNotFound(id.raw()))?;
        let (name, previous) = (node.name.clone(), node.parent);
        if self.group(target).is_none() {
            return Err(BreakpointError::GroupNotFound(target.raw()));
        }
        if self.ancestry(target).contains(&id) {
            return Err(BreakpointError::InvalidGroupMove { group: id, target });
        }
        if previous == Some(target) {
            return Ok(());
        }
        if self.name_taken(target, &name, Some(id)) {
            return Err(BreakpointError::DuplicateGroupName(name));
        }
        if let Some(parent) = previous.and_then(|parent| self.group_mut(parent)) {
            parent.detach(GroupMember::Group(id));
        }
        if let Some(parent) = self.group_mut(target) {
            parent.children.push(GroupMember::Group(id));
        }
        if let Some(node) = self.group_mut(id) {
            node.parent = Some(target);
        }
        Ok(())
    }

    /// Drop every breakpoint and group, keeping the number counter.
    pub(crate) fn clear(&mut self)
    {
        self.breakpoints.clear();
        self.groups.clear();
        self.groups.push(Some(GroupNode::new(DEFAULT_GROUP_NAME, None)));
    }

    pub(crate) fn breakpoints_mut(&mut self) -> impl Iterator<Item = &mut Breakpoint>
    {
        self.breakpoints.values_mut()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::breakpoints::BreakpointKind;
    use crate::names::ClassPattern;

    fn line(line: u32) -> Breakpoint
    {
        Breakpoint::new(BreakpointKind::Line {
            class: ClassPattern::parse("Foo").unwrap(),
            line,
        })
    }

    #[test]
    fn test_numbers_are_never_reused()
    {
        let mut store = BreakpointStore::new();
        let root = store.default_group();
        let first = store.insert(line(1), root).unwrap();
        store.remove(first);
        let second = store.insert(line(2), root).unwrap();
        assert_eq!(first.raw(), 1);
        assert_eq!(second.raw(), 2);
        assert!(store.by_number(1).is_none());
    }

    #[test]
    fn test_restored_number_advances_counter()
    {
        let mut store = BreakpointStore::new();
        let mut restored = line(1);
        restored.number = Some(BreakpointId::from_raw(7));
        store.insert(restored, GroupId::DEFAULT).unwrap();
        let fresh = store.insert(line(2), GroupId::DEFAULT).unwrap();
        assert_eq!(fresh.raw(), 8);
    }

    #[test]
    fn test_traversal_order()
    {
        let mut store = BreakpointStore::new();
        let root = store.default_group();
        let a = store.insert(line(1), root).unwrap();
        let sub = store.create_group("sub", root).unwrap();
        let b = store.insert(line(2), sub).unwrap();
        let c = store.insert(line(3), root).unwrap();
        assert_eq!(store.breakpoints(root, false), vec![a, c]);
        assert_eq!(store.breakpoints(root, true), vec![a, b, c]);
        assert_eq!(store.breakpoint_count(root, true), 3);
        assert_eq!(store.group_count(root, true), 1);
    }

    #[test]
    fn test_sibling_names_are_unique()
    {
        let mut store = BreakpointStore::new();
        let root = store.default_group();
        let one = store.create_group("io", root).unwrap();
        assert!(matches!(store.create_group("io", root), Err(BreakpointError::DuplicateGroupName(_))));
        // The same name is fine under a different parent.
        assert!(store.create_group("io", one).is_ok());
    }

    #[test]
    fn test_move_group_rejects_cycles()
    {
        let mut store = BreakpointStore::new();
        let root = store.default_group();
        let outer = store.create_group("outer", root).unwrap();
        let inner = store.create_group("inner", outer).unwrap();
        assert!(matches!(
            store.move_group(outer, inner),
            Err(BreakpointError::InvalidGroupMove { .. })
        ));
        assert!(matches!(store.move_group(root, outer), Err(BreakpointError::DefaultGroupImmovable)));
        store.move_group(inner, root).unwrap();
        assert_eq!(store.group(inner).unwrap().parent(), Some(root));
    }

    #[test]
    fn test_group_disable_masks_members()
    {
        let mut store = BreakpointStore::new();
        let group = store.create_group("g", GroupId::DEFAULT).unwrap();
        let id = store.insert(line(4), group).unwrap();
        assert!(store.is_effectively_enabled(id));
        store.group_mut(group).unwrap().enabled = false;
        assert!(!store.is_effectively_enabled(id));
        assert!(store.get(id).unwrap().is_enabled());
    }

    #[test]
    fn test_remove_group_returns_members()
    {
        let mut store = BreakpointStore::new();
        let group = store.create_group("g", GroupId::DEFAULT).unwrap();
        let nested = store.create_group("n", group).unwrap();
        store.insert(line(1), group).unwrap();
        store.insert(line(2), nested).unwrap();
        let removed = store.remove_group(group).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(store.group(nested).is_none());
        assert_eq!(store.group_count(GroupId::DEFAULT, true), 0);
    }
}
