//! Loaded classes, their members, and code locations.

use std::fmt;

/// A class (or interface) loaded in the debug target
///
/// This is the engine's view of a JDWP `ReferenceType`: just enough to turn a
/// textual breakpoint specification into a concrete location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceType
{
    /// Fully qualified, dot separated class name (`com.acme.Foo$Inner`)
    pub name: String,
    /// Whether the class was compiled with line number tables
    pub has_line_info: bool,
    /// Lines with executable code, ascending
    pub lines: Vec<u32>,
    /// Declared methods
    pub methods: Vec<MethodInfo>,
    /// Declared fields
    pub fields: Vec<FieldInfo>,
}

impl ReferenceType
{
    /// Create a class with line information and no members.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self
    {
        Self {
            name: name.into(),
            has_line_info: true,
            lines: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Add executable lines.
    #[must_use]
    pub fn with_lines(mut self, lines: impl IntoIterator<Item = u32>) -> Self
    {
        self.lines.extend(lines);
        self.lines.sort_unstable();
        self.lines.dedup();
        self
    }

    /// Add a method.
    #[must_use]
    pub fn with_method(mut self, method: MethodInfo) -> Self
    {
        self.methods.push(method);
        self
    }

    /// Add a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>) -> Self
    {
        self.fields.push(FieldInfo { name: name.into() });
        self
    }

    /// Mark the class as compiled without line number tables.
    #[must_use]
    pub fn without_line_info(mut self) -> Self
    {
        self.has_line_info = false;
        self
    }

    /// Last dot separated segment of the name.
    #[must_use]
    pub fn short_name(&self) -> &str
    {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Whether executable code maps to `line`.
    #[must_use]
    pub fn has_code_at(&self, line: u32) -> bool
    {
        self.lines.binary_search(&line).is_ok()
    }

    /// Methods named `name`, in declaration order.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodInfo> + 'a
    {
        self.methods.iter().filter(move |method| method.name == name)
    }

    /// Whether the class declares a field named `name`.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool
    {
        self.fields.iter().any(|field| field.name == name)
    }
}

/// A method declared by a [`ReferenceType`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo
{
    /// Method name (`<init>` for constructors)
    pub name: String,
    /// Argument type names as they appear in source (`int`, `java.lang.String`, `String[]`)
    pub argument_types: Vec<String>,
    /// First line with code, `None` for abstract and native methods
    pub first_line: Option<u32>,
}

impl MethodInfo
{
    /// Create a method.
    #[must_use]
    pub fn new(name: impl Into<String>, argument_types: &[&str], first_line: Option<u32>) -> Self
    {
        Self {
            name: name.into(),
            argument_types: argument_types.iter().map(|s| (*s).to_string()).collect(),
            first_line,
        }
    }

    /// Whether the declared argument types match the user supplied list.
    ///
    /// Types match when equal or when the user gave the unqualified form of a
    /// qualified declared type (`String` matches `java.lang.String`).
    #[must_use]
    pub fn matches_arguments(&self, given: &[String]) -> bool
    {
        self.argument_types.len() == given.len()
            && self
                .argument_types
                .iter()
                .zip(given)
                .all(|(declared, given)| declared == given || declared.ends_with(&format!(".{given}")))
    }

    /// `name(Type,Type)` rendering used in messages.
    #[must_use]
    pub fn signature(&self) -> String
    {
        format!("{}({})", self.name, self.argument_types.join(","))
    }
}

/// A field declared by a [`ReferenceType`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo
{
    /// Field name
    pub name: String,
}

/// A code location in the target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location
{
    /// Fully qualified class name
    pub class: String,
    /// Enclosing method, when known
    pub method: Option<String>,
    /// Source line
    pub line: u32,
}

impl Location
{
    /// Create a location without method information.
    #[must_use]
    pub fn new(class: impl Into<String>, line: u32) -> Self
    {
        Self {
            class: class.into(),
            method: None,
            line,
        }
    }
}

impl fmt::Display for Location
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match &self.method {
            Some(method) => write!(f, "{}.{}:{}", self.class, method, self.line),
            None => write!(f, "{}:{}", self.class, self.line),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_argument_matching_accepts_short_names()
    {
        let method = MethodInfo::new("valueOf", &["java.lang.String", "int"], Some(12));
        assert!(method.matches_arguments(&["String".to_string(), "int".to_string()]));
        assert!(method.matches_arguments(&["java.lang.String".to_string(), "int".to_string()]));
        assert!(!method.matches_arguments(&["int".to_string()]));
        assert!(!method.matches_arguments(&["ring".to_string(), "int".to_string()]));
    }

    #[test]
    fn test_reference_type_lines_sorted()
    {
        let class = ReferenceType::new("com.acme.Foo").with_lines([30, 10, 20, 10]);
        assert_eq!(class.lines, vec![10, 20, 30]);
        assert!(class.has_code_at(20));
        assert!(!class.has_code_at(21));
        assert_eq!(class.short_name(), "Foo");
    }
}
