//! Runs a parsed script against an in-memory target through a live session.

use std::error::Error;
use std::sync::Arc;

use haltpoint_core::config::EngineConfig;
use haltpoint_core::dispatcher::EventSink;
use haltpoint_core::events::{BreakpointEvent, BreakpointListener};
use haltpoint_core::session::Session;
use haltpoint_core::target::memory::{MemoryTarget, MAIN_THREAD};
use haltpoint_core::target::TargetEvent;
use haltpoint_core::types::{Location, ReferenceType};
use haltpoint_core::{BreakpointError, BreakpointId};
use haltpoint_utils::{debug, info};

use crate::script::Step;

/// Prints every breakpoint event as it is published.
struct PrintListener;

impl BreakpointListener for PrintListener
{
    fn on_event(&self, event: &BreakpointEvent)
    {
        println!("  {}", event.describe());
    }
}

pub struct Replay
{
    session: Session,
    target: Arc<MemoryTarget>,
    sink: EventSink,
}

impl Replay
{
    /// Open a session, connect it to a fresh target and start dispatching.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(config: EngineConfig) -> Self
    {
        let mut session = Session::open(config);
        session.manager().add_listener(Arc::new(PrintListener));
        let target = Arc::new(MemoryTarget::new());
        session.connect(target.clone(), target.clone());
        let sink = session.start_dispatcher();
        Self { session, target, sink }
    }

    pub const fn session(&self) -> &Session
    {
        &self.session
    }

    pub async fn run(&self, steps: Vec<Step>) -> Result<(), Box<dyn Error>>
    {
        for step in steps {
            debug!(?step, "replaying");
            self.step(step).await?;
        }
        Ok(())
    }

    async fn step(&self, step: Step) -> Result<(), Box<dyn Error>>
    {
        let manager = self.session.manager();
        match step {
            Step::Define { class, lines } => self.target.define_class(ReferenceType::new(class).with_lines(lines)),
            Step::Load { class, lines } => {
                let events = self.target.load_class(ReferenceType::new(class).with_lines(lines));
                self.deliver(events).await?;
            }
            Step::Thread { thread, name } => self.target.add_thread(thread, name),
            Step::Set { name, value } => self.target.set_variable(name, value),
            Step::Fail { expression, message } => self.target.fail_expression(expression, message),
            Step::Break(command) => {
                // Subscription failures are reported as events and keep the breakpoint.
                match self.session.run_command(&command) {
                    Ok(_) | Err(BreakpointError::Subscription { .. }) => {}
                    Err(error) => println!("  error: {error}"),
                }
            }
            Step::Condition { number, expression } => {
                let condition = self.session.factory().create_condition(&expression)?;
                manager.add_condition(lookup(&self.session, number)?, condition)?;
            }
            Step::Monitor { number, expression } => {
                let monitor = self.session.factory().create_monitor(&expression)?;
                manager.add_monitor(lookup(&self.session, number)?, monitor)?;
            }
            Step::Enable(number) => manager.set_enabled(lookup(&self.session, number)?, true)?,
            Step::Disable(number) => manager.set_enabled(lookup(&self.session, number)?, false)?,
            Step::Delete(number) => {
                manager.remove_breakpoint(lookup(&self.session, number)?);
            }
            Step::Hit { class, line, thread } => {
                let events = self.target.hit(&class, line, thread.unwrap_or(MAIN_THREAD));
                self.deliver(events).await?;
            }
            Step::Throw { class, caught, thread } => {
                let events = self.target.throw(&class, caught, thread.unwrap_or(MAIN_THREAD));
                self.deliver(events).await?;
            }
            Step::Enter { class, line, thread } => {
                let events = self.target.enter_method(Location::new(class, line), thread.unwrap_or(MAIN_THREAD));
                self.deliver(events).await?;
            }
            Step::Exit { class, line, thread } => {
                let events = self.target.exit_method(Location::new(class, line), thread.unwrap_or(MAIN_THREAD));
                self.deliver(events).await?;
            }
            Step::List => list(&self.session),
        }
        Ok(())
    }

    async fn deliver(&self, events: Vec<TargetEvent>) -> Result<(), Box<dyn Error>>
    {
        for event in events {
            let outcome = self.sink.deliver_and_wait(event).await?;
            debug!(?outcome, "event handled");
        }
        Ok(())
    }

    /// Print the hit counts, shut the dispatcher down and detach.
    pub async fn finish(self)
    {
        list(&self.session);
        info!(resumes = self.target.resume_count(), "replay finished");
        self.session.close().await;
    }
}

fn lookup(session: &Session, number: u32) -> Result<BreakpointId, BreakpointError>
{
    session
        .manager()
        .breakpoint_by_number(number)
        .and_then(|breakpoint| breakpoint.number())
        .ok_or(BreakpointError::BreakpointNotFound(number))
}

fn list(session: &Session)
{
    let manager = session.manager();
    for id in manager.all_breakpoints() {
        let (Some(breakpoint), Some(state)) = (manager.breakpoint(id), manager.state(id)) else {
            continue;
        };
        println!("  {breakpoint} ({state}, hits: {})", breakpoint.hit_count());
    }
}
