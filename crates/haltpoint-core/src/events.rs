//! Breakpoint event types and listener fan-out.
//!
//! Higher layers (CLI, UI, logging) consume these events to react to changes
//! in the breakpoint tree and to stops in the target without polling the
//! manager. The manager publishes them after releasing its structural lock,
//! so listeners may call back into it.

use std::sync::mpsc;

use crate::breakpoints::{BreakpointId, GroupId};
use crate::types::ThreadId;

/// Event emitted by the breakpoint manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointEvent
{
    /// A breakpoint was added to the tree.
    BreakpointAdded
    {
        /// Number of the new breakpoint.
        id: BreakpointId,
        /// Command-grammar description.
        description: String,
    },
    /// A breakpoint was removed from the tree.
    BreakpointRemoved
    {
        /// Number of the removed breakpoint.
        id: BreakpointId,
        /// Command-grammar description.
        description: String,
    },
    /// A group was created.
    GroupAdded
    {
        /// The new group.
        group: GroupId,
        /// Its name.
        name: String,
    },
    /// A group was removed.
    GroupRemoved
    {
        /// The removed group.
        group: GroupId,
        /// Its name.
        name: String,
    },
    /// Something went wrong that does not fail any caller: a broken
    /// condition, a failed resolution, a rejected subscription.
    ErrorOccurred
    {
        /// Breakpoint concerned, if any.
        id: Option<BreakpointId>,
        /// What went wrong.
        message: String,
    },
    /// A breakpoint's gate passed and the target was left suspended.
    Stopped
    {
        /// Breakpoint that stopped the target.
        id: BreakpointId,
        /// Thread that hit it.
        thread: Option<ThreadId>,
        /// What happened in the target.
        detail: String,
    },
    /// A trace breakpoint observed a method entry or exit.
    Traced
    {
        /// Trace breakpoint.
        id: BreakpointId,
        /// Thread that entered or left the method.
        thread: Option<ThreadId>,
        /// What happened in the target.
        detail: String,
    },
}

impl BreakpointEvent
{
    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::BreakpointAdded { id, description } => format!("Breakpoint {id} added: {description}"),
            Self::BreakpointRemoved { id, description } => format!("Breakpoint {id} removed: {description}"),
            Self::GroupAdded { name, .. } => format!("Group '{name}' added"),
            Self::GroupRemoved { name, .. } => format!("Group '{name}' removed"),
            Self::ErrorOccurred { id: Some(id), message } => format!("Breakpoint {id}: {message}"),
            Self::ErrorOccurred { id: None, message } => message.clone(),
            Self::Stopped { id, thread, detail } => with_thread(format!("Breakpoint {id} hit, {detail}"), *thread),
            Self::Traced { id, thread, detail } => with_thread(format!("Trace {id}: {detail}"), *thread),
        }
    }
}

fn with_thread(mut description: String, thread: Option<ThreadId>) -> String
{
    if let Some(thread_id) = thread {
        description.push_str(&format!(" (thread {})", thread_id.raw()));
    }
    description
}

/// Observer of breakpoint events.
///
/// Every callback defaults to doing nothing; implement the ones you need, or
/// override [`BreakpointListener::on_event`] to see everything.
pub trait BreakpointListener: Send + Sync
{
    /// A breakpoint was added.
    fn breakpoint_added(&self, _id: BreakpointId, _description: &str) {}

    /// A breakpoint was removed.
    fn breakpoint_removed(&self, _id: BreakpointId, _description: &str) {}

    /// A group was created.
    fn group_added(&self, _group: GroupId, _name: &str) {}

    /// A group was removed.
    fn group_removed(&self, _group: GroupId, _name: &str) {}

    /// A recoverable error was reported.
    fn error_occurred(&self, _id: Option<BreakpointId>, _message: &str) {}

    /// The target stopped at a breakpoint.
    fn stopped(&self, _id: BreakpointId, _thread: Option<ThreadId>, _detail: &str) {}

    /// A trace breakpoint fired.
    fn traced(&self, _id: BreakpointId, _thread: Option<ThreadId>, _detail: &str) {}

    /// Route an event to the matching callback.
    fn on_event(&self, event: &BreakpointEvent)
    {
        match event {
            BreakpointEvent::BreakpointAdded { id, description } => self.breakpoint_added(*id, description),
            BreakpointEvent::BreakpointRemoved { id, description } => self.breakpoint_removed(*id, description),
            BreakpointEvent::GroupAdded { group, name } => self.group_added(*group, name),
            BreakpointEvent::GroupRemoved { group, name } => self.group_removed(*group, name),
            BreakpointEvent::ErrorOccurred { id, message } => self.error_occurred(*id, message),
            BreakpointEvent::Stopped { id, thread, detail } => self.stopped(*id, *thread, detail),
            BreakpointEvent::Traced { id, thread, detail } => self.traced(*id, *thread, detail),
        }
    }
}

/// Sender side of the breakpoint event channel.
pub type BreakpointEventSender = mpsc::Sender<BreakpointEvent>;
/// Receiver side of the breakpoint event channel.
pub type BreakpointEventReceiver = mpsc::Receiver<BreakpointEvent>;

/// Create a new breakpoint event channel.
#[must_use]
pub fn event_channel() -> (BreakpointEventSender, BreakpointEventReceiver)
{
    mpsc::channel()
}

/// Listener forwarding every event into a channel.
#[derive(Debug)]
pub struct ChannelListener
{
    sender: BreakpointEventSender,
}

impl ChannelListener
{
    /// Wrap the sender half of [`event_channel`].
    #[must_use]
    pub const fn new(sender: BreakpointEventSender) -> Self
    {
        Self { sender }
    }
}

impl BreakpointListener for ChannelListener
{
    fn on_event(&self, event: &BreakpointEvent)
    {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_channel_listener_forwards_events()
    {
        let (sender, receiver) = event_channel();
        let listener = ChannelListener::new(sender);
        let event = BreakpointEvent::Stopped {
            id: BreakpointId::from_raw(1),
            thread: Some(ThreadId(7)),
            detail: "reached Foo:10".to_string(),
        };
        listener.on_event(&event);
        assert_eq!(receiver.try_recv().unwrap(), event);
        assert_eq!(event.describe(), "Breakpoint 1 hit, reached Foo:10 (thread 7)");
    }
}
