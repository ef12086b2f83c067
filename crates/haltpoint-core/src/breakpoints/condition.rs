//! Conditions gate a breakpoint: every one must hold for the target to stop.

use serde::{Deserialize, Serialize};

use crate::error::EvaluationError;
use crate::target::Evaluator;
use crate::types::ThreadId;

/// A predicate evaluated each time a breakpoint's event fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition
{
    /// A boolean expression evaluated in the top frame of the event thread
    Expression
    {
        /// Expression text
        expression: String,
        /// `false` for conditions synthesized by the engine rather than the user
        #[serde(default = "visible_default")]
        visible: bool,
    },
}

const fn visible_default() -> bool
{
    true
}

impl Condition
{
    /// A user visible expression condition.
    #[must_use]
    pub fn expression(expression: impl Into<String>) -> Self
    {
        Self::Expression {
            expression: expression.into(),
            visible: true,
        }
    }

    /// An expression condition hidden from listings.
    #[must_use]
    pub fn hidden(expression: impl Into<String>) -> Self
    {
        Self::Expression {
            expression: expression.into(),
            visible: false,
        }
    }

    /// Whether the user added this condition.
    #[must_use]
    pub const fn is_visible(&self) -> bool
    {
        match self {
            Self::Expression { visible, .. } => *visible,
        }
    }

    /// Display form.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::Expression { expression, .. } => expression.clone(),
        }
    }

    /// Evaluate against the top frame of `thread`.
    ///
    /// # Errors
    ///
    /// Fails when there is no thread, when the evaluator fails, or when the
    /// expression does not produce a boolean.
    pub fn evaluate(&self, evaluator: &dyn Evaluator, thread: Option<ThreadId>) -> Result<bool, EvaluationError>
    {
        match self {
            Self::Expression { expression, .. } => {
                let thread = thread.ok_or_else(|| EvaluationError::NoThread(expression.clone()))?;
                let value = evaluator.evaluate(expression, thread, 0)?;
                value.as_bool().ok_or_else(|| EvaluationError::NotBoolean {
                    expression: expression.clone(),
                    value: value.to_string(),
                })
            }
        }
    }
}
