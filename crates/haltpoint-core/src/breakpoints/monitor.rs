//! Monitors observe a breakpoint hit without influencing the stop decision.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::breakpoints::BreakpointId;
use crate::error::EvaluationError;
use crate::target::Evaluator;
use crate::types::{ThreadId, Value};

/// A side effect run each time a breakpoint's event fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Monitor
{
    /// Evaluate an expression and log its value
    Expression
    {
        /// Expression text
        expression: String,
    },
}

impl Monitor
{
    /// An expression monitor.
    #[must_use]
    pub fn expression(expression: impl Into<String>) -> Self
    {
        Self::Expression {
            expression: expression.into(),
        }
    }

    /// Display form.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::Expression { expression } => expression.clone(),
        }
    }

    /// Run the monitor for a hit of breakpoint `id`.
    ///
    /// # Errors
    ///
    /// Fails when there is no thread or when the evaluator fails.
    pub fn fire(&self, id: BreakpointId, evaluator: &dyn Evaluator, thread: Option<ThreadId>) -> Result<Value, EvaluationError>
    {
        match self {
            Self::Expression { expression } => {
                let thread = thread.ok_or_else(|| EvaluationError::NoThread(expression.clone()))?;
                let value = evaluator.evaluate(expression, thread, 0)?;
                info!(target: "haltpoint::monitor", breakpoint = %id, thread = %thread, "{expression} = {value}");
                Ok(value)
            }
        }
    }
}
