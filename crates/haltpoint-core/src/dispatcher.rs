//! # Event Dispatcher
//!
//! Moves target notifications off the event source's thread and gates them
//! on a bounded pool of blocking workers.
//!
//! The event source pushes [`TargetEvent`]s into an [`EventSink`]. A single
//! task drains the bounded inbox and hands each notification to
//! [`BreakpointManager::handle_event`] on a blocking thread, never running
//! more than the configured number at once. Expression evaluation can block
//! on the target for a long time; the pool keeps one slow condition from
//! delaying notifications on other threads.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{BreakpointError, Result};
use crate::manager::{BreakpointManager, EventOutcome};
use crate::target::TargetEvent;

enum Message
{
    Event
    {
        event: TargetEvent,
        reply: Option<oneshot::Sender<EventOutcome>>,
    },
    Shutdown,
}

/// Cloneable handle for delivering notifications to a dispatcher.
#[derive(Debug, Clone)]
pub struct EventSink
{
    sender: mpsc::Sender<Message>,
}

impl std::fmt::Debug for Message
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        match self {
            Self::Event { event, .. } => f.debug_tuple("Event").field(&event.handle).finish(),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl EventSink
{
    /// Queue a notification, waiting while the inbox is full.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::DispatcherClosed`] after shutdown.
    pub async fn deliver(&self, event: TargetEvent) -> Result<()>
    {
        self.sender
            .send(Message::Event { event, reply: None })
            .await
            .map_err(|_| BreakpointError::DispatcherClosed)
    }

    /// Queue a notification and wait until it has been handled.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::DispatcherClosed`] after shutdown, or if the
    /// dispatcher stopped before answering.
    pub async fn deliver_and_wait(&self, event: TargetEvent) -> Result<EventOutcome>
    {
        let (reply, outcome) = oneshot::channel();
        self.sender
            .send(Message::Event {
                event,
                reply: Some(reply),
            })
            .await
            .map_err(|_| BreakpointError::DispatcherClosed)?;
        outcome.await.map_err(|_| BreakpointError::DispatcherClosed)
    }

    /// Queue a notification from a thread outside the runtime, such as an
    /// event source's reader thread.
    ///
    /// # Panics
    ///
    /// When called from within an asynchronous execution context.
    ///
    /// # Errors
    ///
    /// [`BreakpointError::DispatcherClosed`] after shutdown.
    pub fn blocking_deliver(&self, event: TargetEvent) -> Result<()>
    {
        self.sender
            .blocking_send(Message::Event { event, reply: None })
            .map_err(|_| BreakpointError::DispatcherClosed)
    }

    /// Whether the dispatcher still accepts notifications.
    #[must_use]
    pub fn is_open(&self) -> bool
    {
        !self.sender.is_closed()
    }
}

/// Background task routing notifications to a [`BreakpointManager`].
#[derive(Debug)]
pub struct EventDispatcher
{
    sink: EventSink,
    handle: JoinHandle<()>,
}

impl EventDispatcher
{
    /// Start the dispatcher on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// When called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(manager: Arc<BreakpointManager>, config: &EngineConfig) -> Self
    {
        let capacity = config.inbox_capacity.max(1);
        let workers = config.workers.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let handle = tokio::spawn(run(manager, receiver, workers));
        info!(capacity, workers, "event dispatcher started");
        Self {
            sink: EventSink { sender },
            handle,
        }
    }

    /// A handle for delivering notifications.
    #[must_use]
    pub fn sink(&self) -> EventSink
    {
        self.sink.clone()
    }

    /// Stop accepting notifications, finish those already queued and wait
    /// for every worker to return.
    pub async fn shutdown(self)
    {
        if self.sink.sender.send(Message::Shutdown).await.is_err() {
            debug!("dispatcher already stopped");
        }
        if let Err(error) = self.handle.await {
            warn!(%error, "event dispatcher task failed");
        }
        info!("event dispatcher stopped");
    }
}

async fn run(manager: Arc<BreakpointManager>, mut inbox: mpsc::Receiver<Message>, workers: usize)
{
    let pool = Arc::new(Semaphore::new(workers));
    while let Some(message) = inbox.recv().await {
        match message {
            Message::Event { event, reply } => {
                if !dispatch(&pool, &manager, event, reply).await {
                    break;
                }
            }
            Message::Shutdown => break,
        }
    }
    inbox.close();

    // Drain notifications accepted before the shutdown request on the same
    // pool, then wait for the workers to hand their permits back.
    while let Some(message) = inbox.recv().await {
        if let Message::Event { event, reply } = message {
            if !dispatch(&pool, &manager, event, reply).await {
                break;
            }
        }
    }
    let permits = u32::try_from(workers).unwrap_or(u32::MAX);
    if pool.acquire_many(permits).await.is_err() {
        warn!("worker pool closed before draining");
    }
}

/// Gate one notification on a blocking worker once a permit is free.
/// Returns `false` if the pool was closed.
async fn dispatch(
    pool: &Arc<Semaphore>,
    manager: &Arc<BreakpointManager>,
    event: TargetEvent,
    reply: Option<oneshot::Sender<EventOutcome>>,
) -> bool
{
    let Ok(permit) = Arc::clone(pool).acquire_owned().await else {
        return false;
    };
    let manager = Arc::clone(manager);
    tokio::task::spawn_blocking(move || {
        let outcome = manager.handle_event(&event);
        if let Some(reply) = reply {
            // The sender may have given up waiting.
            let _ = reply.send(outcome);
        }
        drop(permit);
    });
    true
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::breakpoints::{Breakpoint, BreakpointKind};
    use crate::names::ClassPattern;
    use crate::target::memory::{MemoryTarget, MAIN_THREAD};
    use crate::types::ReferenceType;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deliver_and_wait_reports_outcome()
    {
        let target = Arc::new(MemoryTarget::new());
        target.define_class(ReferenceType::new("Foo").with_lines([10]));
        let manager = Arc::new(BreakpointManager::new());
        manager.attach(target.clone(), target.clone());
        let id = manager
            .add_breakpoint(Breakpoint::new(BreakpointKind::Line {
                class: ClassPattern::parse("Foo").unwrap(),
                line: 10,
            }))
            .unwrap();

        let dispatcher = EventDispatcher::spawn(Arc::clone(&manager), &EngineConfig::default());
        let sink = dispatcher.sink();
        let event = target.hit("Foo", 10, MAIN_THREAD).remove(0);
        assert_eq!(sink.deliver_and_wait(event).await.unwrap(), EventOutcome::Stopped(id));

        dispatcher.shutdown().await;
        assert!(!sink.is_open());
        let late = target.hit("Foo", 10, MAIN_THREAD).remove(0);
        assert!(matches!(sink.deliver(late).await, Err(BreakpointError::DispatcherClosed)));
    }
}
