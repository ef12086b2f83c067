//! Syntax of breakpoint specifications and commands.
//!
//! Everything here is pure: nothing consults the target, so malformed input
//! is rejected before any lookup happens.
//!
//! ## Location specs
//!
//! ```text
//! Class:line              com.acme.Foo:42
//! Class:method(args)      Foo:bar(int,String)
//! Class.method[(args)]    com.acme.Foo.bar
//! line                    42               (class from the current location)
//! method[(args)]          bar(int)         (class from the current location)
//! ```
//!
//! ## Commands
//!
//! ```text
//! [go|thread|all] <body> [c:<class-pattern>] [t:<thread-name>]
//!
//! body := <location spec>
//!       | <exception-class> caught|uncaught...
//!       | <Class>.<field> access|modify...
//!       | [<thread-name>] start|death...
//!       | enter|exit...
//!       | <class-pattern> prepare|unload...
//! ```

use crate::error::{BreakpointError, Result};
use crate::names::{is_java_identifier, is_method_identifier, is_valid_class_name, is_valid_type_name, ClassPattern};
use crate::types::SuspendPolicy;

/// A syntactically valid location specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedSpec
{
    /// `Class:line` or a bare line
    Line
    {
        /// Class as written, `None` when omitted
        class: Option<String>,
        /// 1-based line
        line: u32,
    },
    /// `Class.method(args)`, `Class:method(args)` or a bare method
    Method
    {
        /// Class as written, `None` when omitted
        class: Option<String>,
        /// Method name
        method: String,
        /// Argument types, `None` when no parentheses were given
        arguments: Option<Vec<String>>,
    },
}

impl ParsedSpec
{
    /// The class portion as written.
    #[must_use]
    pub fn class(&self) -> Option<&str>
    {
        match self {
            Self::Line { class, .. } | Self::Method { class, .. } => class.as_deref(),
        }
    }
}

/// Parse a location specification.
///
/// # Errors
///
/// - [`BreakpointError::MissingSpecification`] for empty input
/// - [`BreakpointError::MalformedClassName`] for an invalid class portion
/// - [`BreakpointError::MalformedMemberName`] for an invalid method, argument
///   type, or line portion
/// - [`BreakpointError::InvalidLineNumber`] for lines below 1 or out of range
pub fn parse_spec(spec: &str) -> Result<ParsedSpec>
{
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(BreakpointError::MissingSpecification);
    }

    if let Some((class, member)) = spec.split_once(':') {
        let class = class.trim();
        if !is_valid_class_name(class, true) {
            return Err(BreakpointError::MalformedClassName(class.to_string()));
        }
        let member = member.trim();
        if let Some(line) = parse_line(member)? {
            return Ok(ParsedSpec::Line {
                class: Some(class.to_string()),
                line,
            });
        }
        let (method, arguments) = parse_method(member)?;
        return Ok(ParsedSpec::Method {
            class: Some(class.to_string()),
            method,
            arguments,
        });
    }

    if let Some(line) = parse_line(spec)? {
        return Ok(ParsedSpec::Line { class: None, line });
    }

    let (head, arguments) = split_arguments(spec)?;
    match head.rfind('.') {
        None => {
            let (method, _) = parse_method(head)?;
            Ok(ParsedSpec::Method {
                class: None,
                method,
                arguments,
            })
        }
        Some(dot) if dot == 0 || dot == head.len() - 1 => Err(BreakpointError::MalformedMemberName(spec.to_string())),
        Some(dot) => {
            let class = &head[..dot];
            if !is_valid_class_name(class, true) {
                return Err(BreakpointError::MalformedClassName(class.to_string()));
            }
            let (method, _) = parse_method(&head[dot + 1..])?;
            Ok(ParsedSpec::Method {
                class: Some(class.to_string()),
                method,
                arguments,
            })
        }
    }
}

fn parse_line(text: &str) -> Result<Option<u32>>
{
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    match text.parse::<u32>() {
        Ok(line) if line > 0 => Ok(Some(line)),
        _ => Err(BreakpointError::InvalidLineNumber(text.to_string())),
    }
}

fn parse_method(text: &str) -> Result<(String, Option<Vec<String>>)>
{
    let (name, arguments) = split_arguments(text)?;
    if !is_method_identifier(name) {
        return Err(BreakpointError::MalformedMemberName(text.to_string()));
    }
    Ok((name.to_string(), arguments))
}

fn split_arguments(text: &str) -> Result<(&str, Option<Vec<String>>)>
{
    let Some(open) = text.find('(') else {
        if text.contains(')') {
            return Err(BreakpointError::MalformedMemberName(text.to_string()));
        }
        return Ok((text.trim(), None));
    };
    let Some(inner) = text[open + 1..].strip_suffix(')') else {
        return Err(BreakpointError::MalformedMemberName(text.to_string()));
    };
    if inner.contains('(') || inner.contains(')') {
        return Err(BreakpointError::MalformedMemberName(text.to_string()));
    }
    let arguments = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner
            .split(',')
            .map(|argument| {
                let argument = argument.trim();
                if is_valid_type_name(argument) {
                    Ok(argument.to_string())
                } else {
                    Err(BreakpointError::MalformedMemberName(argument.to_string()))
                }
            })
            .collect::<Result<Vec<_>>>()?
    };
    Ok((text[..open].trim(), Some(arguments)))
}

/// Body of a breakpoint command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandBody
{
    /// A location spec, still to be parsed and resolved
    Location(String),
    /// `<class> caught|uncaught`
    Exception
    {
        /// Exception class as written
        class: String,
        /// `caught` given
        caught: bool,
        /// `uncaught` given
        uncaught: bool,
    },
    /// `<Class>.<field> access|modify`
    Watch
    {
        /// Declaring class as written
        class: String,
        /// Field name
        field: String,
        /// `access` given
        on_access: bool,
        /// `modify` given
        on_modify: bool,
    },
    /// `[<thread>] start|death`
    Thread
    {
        /// Thread name, if given
        name: Option<String>,
        /// `start` given
        on_start: bool,
        /// `death` given
        on_death: bool,
    },
    /// `enter|exit`
    Trace
    {
        /// `enter` given
        on_enter: bool,
        /// `exit` given
        on_exit: bool,
    },
    /// `<pattern> prepare|unload`
    Class
    {
        /// Class pattern
        class: ClassPattern,
        /// `prepare` given
        on_prepare: bool,
        /// `unload` given
        on_unload: bool,
    },
}

/// A tokenized breakpoint command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand
{
    /// Explicit suspend policy keyword
    pub policy: Option<SuspendPolicy>,
    /// What to break on
    pub body: CommandBody,
    /// `c:` filter
    pub class_filter: Option<ClassPattern>,
    /// `t:` filter
    pub thread_filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family
{
    Exception,
    Watch,
    Thread,
    Trace,
    Class,
}

fn keyword_family(token: &str) -> Option<Family>
{
    match token {
        "caught" | "uncaught" => Some(Family::Exception),
        "access" | "modify" => Some(Family::Watch),
        "start" | "death" => Some(Family::Thread),
        "enter" | "exit" => Some(Family::Trace),
        "prepare" | "unload" => Some(Family::Class),
        _ => None,
    }
}

/// Whether a bare token would be read as something other than an operand.
pub(crate) fn is_reserved_word(token: &str) -> bool
{
    matches!(token, "go" | "thread" | "all")
        || keyword_family(token).is_some()
        || token.starts_with("c:")
        || token.starts_with("t:")
}

/// Split a command into policy, body and filters.
///
/// # Errors
///
/// Fails on empty input, on keywords from different kinds, on a wrong
/// number of operands for the kind, and on malformed names.
pub fn parse_command(command: &str) -> Result<ParsedCommand>
{
    let mut tokens: Vec<&str> = command.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(BreakpointError::MissingSpecification);
    }

    let mut policy = None;
    if tokens.len() > 1 {
        policy = match tokens[0] {
            "go" => Some(SuspendPolicy::None),
            "thread" => Some(SuspendPolicy::EventThread),
            "all" => Some(SuspendPolicy::All),
            _ => None,
        };
        if policy.is_some() {
            tokens.remove(0);
        }
    }

    let mut class_filter = None;
    let mut thread_filter = None;
    let mut keywords = Vec::new();
    let mut operands = Vec::new();
    for token in tokens {
        if let Some(pattern) = token.strip_prefix("c:") {
            class_filter =
                Some(ClassPattern::parse(pattern).ok_or_else(|| BreakpointError::MalformedClassName(pattern.to_string()))?);
        } else if let Some(name) = token.strip_prefix("t:") {
            if name.is_empty() {
                return Err(BreakpointError::InvalidCommand("empty thread filter".to_string()));
            }
            thread_filter = Some(name.to_string());
        } else if let Some(family) = keyword_family(token) {
            keywords.push((family, token));
        } else {
            operands.push(token);
        }
    }

    let body = match keywords.first().map(|(family, _)| *family) {
        None => {
            if operands.is_empty() {
                return Err(BreakpointError::MissingSpecification);
            }
            CommandBody::Location(operands.join(" "))
        }
        Some(family) => {
            if keywords.iter().any(|(other, _)| *other != family) {
                return Err(BreakpointError::InvalidCommand(format!(
                    "conflicting event keywords in '{}'",
                    command.trim()
                )));
            }
            let has = |word: &str| keywords.iter().any(|(_, token)| *token == word);
            keyword_body(family, &operands, &has, command)?
        }
    };

    Ok(ParsedCommand {
        policy,
        body,
        class_filter,
        thread_filter,
    })
}

fn keyword_body(family: Family, operands: &[&str], has: &dyn Fn(&str) -> bool, command: &str) -> Result<CommandBody>
{
    let single = || match operands {
        [operand] => Ok(*operand),
        _ => Err(BreakpointError::InvalidCommand(format!(
            "expected exactly one class in '{}'",
            command.trim()
        ))),
    };
    match family {
        Family::Exception => {
            let class = single()?;
            if !is_valid_class_name(class, true) {
                return Err(BreakpointError::MalformedClassName(class.to_string()));
            }
            Ok(CommandBody::Exception {
                class: class.to_string(),
                caught: has("caught"),
                uncaught: has("uncaught"),
            })
        }
        Family::Watch => {
            let target = single()?;
            let (class, field) = split_field(target)?;
            Ok(CommandBody::Watch {
                class,
                field,
                on_access: has("access"),
                on_modify: has("modify"),
            })
        }
        Family::Thread => {
            let name = match operands {
                [] => None,
                [name] => Some((*name).to_string()),
                _ => {
                    return Err(BreakpointError::InvalidCommand(format!(
                        "expected at most one thread name in '{}'",
                        command.trim()
                    )))
                }
            };
            Ok(CommandBody::Thread {
                name,
                on_start: has("start"),
                on_death: has("death"),
            })
        }
        Family::Trace => {
            if !operands.is_empty() {
                return Err(BreakpointError::InvalidCommand(format!(
                    "trace breakpoints take filters, not '{}'",
                    operands.join(" ")
                )));
            }
            Ok(CommandBody::Trace {
                on_enter: has("enter"),
                on_exit: has("exit"),
            })
        }
        Family::Class => {
            let text = single()?;
            let class = ClassPattern::parse(text).ok_or_else(|| BreakpointError::MalformedClassName(text.to_string()))?;
            Ok(CommandBody::Class {
                class,
                on_prepare: has("prepare"),
                on_unload: has("unload"),
            })
        }
    }
}

/// Split `Class.field`, validating both halves.
///
/// # Errors
///
/// Fails when either half is malformed or the dot is missing.
pub fn split_field(text: &str) -> Result<(String, String)>
{
    let Some((class, field)) = text.rsplit_once('.') else {
        return Err(BreakpointError::MalformedMemberName(text.to_string()));
    };
    if !is_valid_class_name(class, false) {
        return Err(BreakpointError::MalformedClassName(class.to_string()));
    }
    if !is_java_identifier(field) {
        return Err(BreakpointError::MalformedMemberName(field.to_string()));
    }
    Ok((class.to_string(), field.to_string()))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_line_specs()
    {
        assert_eq!(
            parse_spec("Foo:10").unwrap(),
            ParsedSpec::Line {
                class: Some("Foo".to_string()),
                line: 10
            }
        );
        assert_eq!(parse_spec(" 42 ").unwrap(), ParsedSpec::Line { class: None, line: 42 });
        assert!(matches!(parse_spec("Foo:0"), Err(BreakpointError::InvalidLineNumber(_))));
        assert!(matches!(parse_spec("Foo:-3"), Err(BreakpointError::InvalidLineNumber(_))));
        assert!(matches!(parse_spec("Foo:99999999999"), Err(BreakpointError::InvalidLineNumber(_))));
    }

    #[test]
    fn test_method_specs()
    {
        assert_eq!(
            parse_spec("com.acme.Foo.bar(int, java.lang.String[])").unwrap(),
            ParsedSpec::Method {
                class: Some("com.acme.Foo".to_string()),
                method: "bar".to_string(),
                arguments: Some(vec!["int".to_string(), "java.lang.String[]".to_string()]),
            }
        );
        assert_eq!(
            parse_spec("Foo:<init>()").unwrap(),
            ParsedSpec::Method {
                class: Some("Foo".to_string()),
                method: "<init>".to_string(),
                arguments: Some(Vec::new()),
            }
        );
        assert_eq!(
            parse_spec("run").unwrap(),
            ParsedSpec::Method {
                class: None,
                method: "run".to_string(),
                arguments: None,
            }
        );
    }

    #[test]
    fn test_malformed_specs()
    {
        assert!(matches!(parse_spec(""), Err(BreakpointError::MissingSpecification)));
        assert!(matches!(
            parse_spec("123.pkg.Malformed?$1:method"),
            Err(BreakpointError::MalformedClassName(_))
        ));
        assert!(matches!(
            parse_spec("java.lang.String:123abc"),
            Err(BreakpointError::MalformedMemberName(_))
        ));
        assert!(matches!(parse_spec("Foo.bar(int"), Err(BreakpointError::MalformedMemberName(_))));
        assert!(matches!(parse_spec("Foo.bar(in-t)"), Err(BreakpointError::MalformedMemberName(_))));
        assert!(matches!(parse_spec(".bar"), Err(BreakpointError::MalformedMemberName(_))));
        assert!(matches!(parse_spec("Foo."), Err(BreakpointError::MalformedMemberName(_))));
    }

    #[test]
    fn test_commands()
    {
        let command = parse_command("go java.io.IOException caught uncaught t:worker").unwrap();
        assert_eq!(command.policy, Some(SuspendPolicy::None));
        assert_eq!(command.thread_filter.as_deref(), Some("worker"));
        assert_eq!(
            command.body,
            CommandBody::Exception {
                class: "java.io.IOException".to_string(),
                caught: true,
                uncaught: true,
            }
        );

        let command = parse_command("thread start").unwrap();
        assert_eq!(command.policy, Some(SuspendPolicy::EventThread));
        assert_eq!(
            command.body,
            CommandBody::Thread {
                name: None,
                on_start: true,
                on_death: false,
            }
        );

        let command = parse_command("Foo.bar(int, String) t:main").unwrap();
        assert_eq!(command.body, CommandBody::Location("Foo.bar(int, String)".to_string()));

        assert!(matches!(
            parse_command("Foo.x access start"),
            Err(BreakpointError::InvalidCommand(_))
        ));
        assert!(matches!(parse_command("enter Foo"), Err(BreakpointError::InvalidCommand(_))));
        assert!(matches!(parse_command("c:1bad enter"), Err(BreakpointError::MalformedClassName(_))));
    }
}
