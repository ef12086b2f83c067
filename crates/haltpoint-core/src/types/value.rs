//! Values produced by the predicate evaluator.

use std::fmt;

/// Result of evaluating an expression in a suspended frame
#[derive(Debug, Clone, PartialEq)]
pub enum Value
{
    /// `null`
    Null,
    /// The result of a `void` method call
    Void,
    /// Any boolean
    Boolean(bool),
    /// Any integral primitive, widened
    Integer(i64),
    /// Any floating point primitive, widened
    Float(f64),
    /// A `java.lang.String` instance
    Text(String),
    /// Any other object, identified by its runtime type
    Object
    {
        /// Runtime type name
        type_name: String,
        /// Object id in the target
        id: u64,
    },
}

impl Value
{
    /// The boolean payload, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool>
    {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Value
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Null => write!(f, "null"),
            Self::Void => write!(f, "<void>"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "\"{value}\""),
            Self::Object { type_name, id } => write!(f, "{type_name} (id={id})"),
        }
    }
}

impl From<bool> for Value
{
    fn from(value: bool) -> Self
    {
        Self::Boolean(value)
    }
}

impl From<i64> for Value
{
    fn from(value: i64) -> Self
    {
        Self::Integer(value)
    }
}

impl From<i32> for Value
{
    fn from(value: i32) -> Self
    {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for Value
{
    fn from(value: &str) -> Self
    {
        Self::Text(value.to_string())
    }
}
