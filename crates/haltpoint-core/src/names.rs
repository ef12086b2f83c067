//! # Names
//!
//! Validation of Java class, method and type names, and the wildcard class
//! patterns accepted by class filters and exception breakpoints.
//!
//! Validation is purely syntactic and never consults the target, so a
//! specification can be rejected before anything is resolved.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether `id` is a Java identifier.
///
/// `$` and `_` count as letters, so synthetic and inner-class segments
/// (`Foo$1`, `access$000`) are accepted.
#[must_use]
pub fn is_java_identifier(id: &str) -> bool
{
    let mut chars = id.chars();
    match chars.next() {
        Some(first) if is_identifier_start(first) => chars.all(is_identifier_part),
        _ => false,
    }
}

/// Whether `name` can name a method, including constructors and static
/// initializers.
#[must_use]
pub fn is_method_identifier(name: &str) -> bool
{
    is_java_identifier(name) || name == "<init>" || name == "<clinit>"
}

/// Whether `name` is a dot separated class name.
///
/// With `allow_wildcard`, a `*` segment is accepted as the first or the last
/// segment (never both, never in the middle).
#[must_use]
pub fn is_valid_class_name(name: &str, allow_wildcard: bool) -> bool
{
    if name.is_empty() {
        return false;
    }
    if allow_wildcard && name == "*" {
        return true;
    }
    let segments: Vec<&str> = name.split('.').collect();
    let last = segments.len() - 1;
    let leading_wildcard = allow_wildcard && segments[0] == "*";
    segments.iter().enumerate().all(|(index, segment)| {
        let wildcard_here = allow_wildcard && *segment == "*";
        if wildcard_here {
            (index == 0) || (index == last && !leading_wildcard)
        } else {
            is_java_identifier(segment)
        }
    })
}

/// Whether `name` is a type usable in a method argument list: a primitive or
/// class name followed by any number of `[]` pairs.
#[must_use]
pub fn is_valid_type_name(name: &str) -> bool
{
    let mut base = name.trim();
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped.trim_end();
    }
    is_valid_class_name(base, false)
}

fn is_identifier_start(c: char) -> bool
{
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool
{
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// A class name with at most one wildcard
///
/// ## Forms
///
/// - `com.acme.Foo`: exact match
/// - `com.acme.*`: any class whose name starts with `com.acme.`
/// - `*.Foo`: any class whose name ends with `.Foo`
/// - `*`: any class
///
/// ## Example
///
/// ```rust
/// use haltpoint_core::names::ClassPattern;
///
/// let pattern = ClassPattern::parse("java.io.*").unwrap();
/// assert!(pattern.matches("java.io.File"));
/// assert!(!pattern.matches("java.nio.file.Path"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ClassPattern
{
    /// Matches one class name exactly
    Exact(String),
    /// Matches names starting with the stored prefix (which keeps its trailing dot)
    Prefix(String),
    /// Matches names ending with the stored suffix (which keeps its leading dot)
    Suffix(String),
    /// Matches every class
    Any,
}

impl ClassPattern
{
    /// Parse a pattern, returning `None` when it is not a valid wildcard class name.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self>
    {
        let text = text.trim();
        if !is_valid_class_name(text, true) {
            return None;
        }
        if text == "*" {
            Some(Self::Any)
        } else if let Some(prefix) = text.strip_suffix('*') {
            Some(Self::Prefix(prefix.to_string()))
        } else if let Some(suffix) = text.strip_prefix('*') {
            Some(Self::Suffix(suffix.to_string()))
        } else {
            Some(Self::Exact(text.to_string()))
        }
    }

    /// Whether a fully qualified class name matches.
    #[must_use]
    pub fn matches(&self, class_name: &str) -> bool
    {
        match self {
            Self::Exact(name) => name == class_name,
            Self::Prefix(prefix) => class_name.starts_with(prefix.as_str()),
            Self::Suffix(suffix) => class_name.ends_with(suffix.as_str()),
            Self::Any => true,
        }
    }

    /// Whether the pattern contains a wildcard.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool
    {
        !matches!(self, Self::Exact(_))
    }
}

impl fmt::Display for ClassPattern
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Exact(name) => write!(f, "{name}"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Suffix(suffix) => write!(f, "*{suffix}"),
            Self::Any => write!(f, "*"),
        }
    }
}

impl TryFrom<String> for ClassPattern
{
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error>
    {
        Self::parse(&value).ok_or_else(|| format!("invalid class pattern: {value}"))
    }
}

impl From<ClassPattern> for String
{
    fn from(pattern: ClassPattern) -> Self
    {
        pattern.to_string()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_java_identifiers()
    {
        assert!(is_java_identifier("count"));
        assert!(is_java_identifier("_x$1"));
        assert!(is_java_identifier("Foo$Inner"));
        assert!(!is_java_identifier("1abc"));
        assert!(!is_java_identifier("123abc"));
        assert!(!is_java_identifier(""));
        assert!(!is_java_identifier("a-b"));
    }

    #[test]
    fn test_method_identifiers()
    {
        assert!(is_method_identifier("<init>"));
        assert!(is_method_identifier("<clinit>"));
        assert!(is_method_identifier("run"));
        assert!(!is_method_identifier("<main>"));
    }

    #[test]
    fn test_class_names()
    {
        assert!(is_valid_class_name("java.lang.String", false));
        assert!(is_valid_class_name("Foo", false));
        assert!(!is_valid_class_name("123.pkg.Malformed?$1", false));
        assert!(!is_valid_class_name("a..b", false));
        assert!(!is_valid_class_name("java.*", false));
        assert!(is_valid_class_name("java.*", true));
        assert!(is_valid_class_name("*.Foo", true));
        assert!(is_valid_class_name("*", true));
        assert!(!is_valid_class_name("java.*.Foo", true));
        assert!(!is_valid_class_name("*.Foo.*", true));
    }

    #[test]
    fn test_type_names()
    {
        assert!(is_valid_type_name("int"));
        assert!(is_valid_type_name("java.lang.String[]"));
        assert!(is_valid_type_name("byte[][]"));
        assert!(!is_valid_type_name("[]"));
        assert!(!is_valid_type_name("java.*"));
    }

    #[test]
    fn test_class_pattern_matching()
    {
        let prefix = ClassPattern::parse("com.acme.*").unwrap();
        assert!(prefix.matches("com.acme.Foo"));
        assert!(prefix.matches("com.acme.sub.Bar"));
        assert!(!prefix.matches("com.acmeco.Foo"));

        let suffix = ClassPattern::parse("*.Foo").unwrap();
        assert!(suffix.matches("com.acme.Foo"));
        assert!(!suffix.matches("com.acme.BarFoo"));

        let exact = ClassPattern::parse("Foo").unwrap();
        assert!(exact.matches("Foo"));
        assert!(!exact.is_wildcard());

        assert!(ClassPattern::parse("*").unwrap().matches("anything.At.All"));
        assert!(ClassPattern::parse("a.*.b").is_none());
    }

    #[test]
    fn test_class_pattern_display_round_trips()
    {
        for text in ["com.acme.*", "*.Foo", "*", "java.lang.Error"] {
            assert_eq!(ClassPattern::parse(text).unwrap().to_string(), text);
        }
    }
}
