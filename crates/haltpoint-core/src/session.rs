//! # Session
//!
//! One debugging session: a [`BreakpointManager`], the factory that turns
//! user input into breakpoints, the current debugging context used to fill
//! in omitted class names, and (once started) the event dispatcher.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::breakpoints::{BreakpointId, GroupId};
use crate::config::EngineConfig;
use crate::dispatcher::{EventDispatcher, EventSink};
use crate::error::Result;
use crate::factory::{BreakpointFactory, DebuggingContext};
use crate::manager::BreakpointManager;
use crate::target::{EventSource, Evaluator};

/// A debugging session.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use haltpoint_core::config::EngineConfig;
/// use haltpoint_core::session::Session;
/// use haltpoint_core::target::memory::MemoryTarget;
/// use haltpoint_core::types::ReferenceType;
///
/// let session = Session::open(EngineConfig::default().with_uncaught_breakpoint(false));
/// let target = Arc::new(MemoryTarget::new());
/// target.define_class(ReferenceType::new("com.acme.Foo").with_lines([10]));
/// session.connect(target.clone(), target);
///
/// let id = session.create_breakpoint("Foo:10")?;
/// assert!(session.manager().breakpoint(id).unwrap().is_resolved());
/// # Ok::<(), haltpoint_core::error::BreakpointError>(())
/// ```
#[derive(Debug)]
pub struct Session
{
    manager: Arc<BreakpointManager>,
    factory: BreakpointFactory,
    context: RwLock<DebuggingContext>,
    config: EngineConfig,
    dispatcher: Option<EventDispatcher>,
}

impl Session
{
    /// Open a session.
    ///
    /// With [`EngineConfig::uncaught_breakpoint`] set, the session starts with
    /// a breakpoint on every uncaught exception.
    #[must_use]
    pub fn open(config: EngineConfig) -> Self
    {
        let manager = Arc::new(BreakpointManager::new());
        let factory = BreakpointFactory::new();
        if config.uncaught_breakpoint {
            // No target is attached yet, so adding cannot fail to subscribe.
            if let Ok(id) = manager.add_breakpoint(factory.create_uncaught_exception_breakpoint()) {
                info!(breakpoint = %id, "uncaught exception breakpoint added");
            }
        }
        Self {
            manager,
            factory,
            context: RwLock::new(DebuggingContext::default()),
            config,
            dispatcher: None,
        }
    }

    /// The session's breakpoint manager.
    #[must_use]
    pub const fn manager(&self) -> &Arc<BreakpointManager>
    {
        &self.manager
    }

    /// The breakpoint factory.
    #[must_use]
    pub const fn factory(&self) -> &BreakpointFactory
    {
        &self.factory
    }

    /// Configuration the session was opened with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig
    {
        &self.config
    }

    /// Current debugging context.
    #[must_use]
    pub fn context(&self) -> DebuggingContext
    {
        self.context.read().clone()
    }

    /// Replace the debugging context, typically when the target stops.
    pub fn set_context(&self, context: DebuggingContext)
    {
        *self.context.write() = context;
    }

    /// Attach a target; every enabled breakpoint is subscribed.
    pub fn connect(&self, source: Arc<dyn EventSource>, evaluator: Arc<dyn Evaluator>)
    {
        self.manager.attach(source, evaluator);
    }

    /// Detach from the target. Breakpoints stay defined.
    pub fn disconnect(&self)
    {
        self.manager.detach();
        *self.context.write() = DebuggingContext::default();
    }

    /// Start the event dispatcher, or return the sink of the running one.
    ///
    /// # Panics
    ///
    /// When called outside a Tokio runtime.
    pub fn start_dispatcher(&mut self) -> EventSink
    {
        let manager = Arc::clone(&self.manager);
        let config = &self.config;
        self.dispatcher
            .get_or_insert_with(|| EventDispatcher::spawn(manager, config))
            .sink()
    }

    /// Create a breakpoint from a location spec (`Class:line`,
    /// `Class.method(args)`, or a bare line in the current class) and add it
    /// to the default group.
    ///
    /// # Errors
    ///
    /// Any parse or resolution error of the factory, and every error of
    /// [`BreakpointManager::add_breakpoint`].
    pub fn create_breakpoint(&self, spec: &str) -> Result<BreakpointId>
    {
        self.create_breakpoint_in(spec, GroupId::DEFAULT)
    }

    /// Like [`Session::create_breakpoint`], adding to `group`.
    ///
    /// # Errors
    ///
    /// See [`Session::create_breakpoint`].
    pub fn create_breakpoint_in(&self, spec: &str, group: GroupId) -> Result<BreakpointId>
    {
        let classes = self.manager.loaded_classes();
        let breakpoint = self.factory.create_breakpoint(spec, &self.context.read(), &classes)?;
        self.manager.add_breakpoint_to(breakpoint, group)
    }

    /// Create a breakpoint from a full command (`go Foo:10 t:main`,
    /// `java.io.IOException caught`, `enter exit c:com.acme.*`, ...).
    ///
    /// # Errors
    ///
    /// See [`Session::create_breakpoint`].
    pub fn run_command(&self, command: &str) -> Result<BreakpointId>
    {
        let classes = self.manager.loaded_classes();
        let breakpoint = self.factory.create_from_command(command, &self.context.read(), &classes)?;
        self.manager.add_breakpoint(breakpoint)
    }

    /// Shut the dispatcher down and detach from the target.
    pub async fn close(mut self)
    {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown().await;
        }
        self.manager.detach();
        info!("session closed");
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::breakpoints::BreakpointKind;
    use crate::names::ClassPattern;

    #[test]
    fn test_open_adds_uncaught_breakpoint()
    {
        let session = Session::open(EngineConfig::default());
        let ids = session.manager().all_breakpoints();
        assert_eq!(ids.len(), 1);
        let breakpoint = session.manager().breakpoint(ids[0]).unwrap();
        assert_eq!(
            breakpoint.kind(),
            &BreakpointKind::Exception {
                class: ClassPattern::Any,
                caught: false,
                uncaught: true,
            }
        );

        let bare = Session::open(EngineConfig::default().with_uncaught_breakpoint(false));
        assert!(bare.manager().all_breakpoints().is_empty());
    }

    #[test]
    fn test_bare_line_uses_context()
    {
        let session = Session::open(EngineConfig::default().with_uncaught_breakpoint(false));
        session.set_context(DebuggingContext::at("com.acme.Foo", 3));
        let id = session.create_breakpoint("12").unwrap();
        assert_eq!(session.manager().breakpoint(id).unwrap().describe(), "com.acme.Foo:12");
    }
}
