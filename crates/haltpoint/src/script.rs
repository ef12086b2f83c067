//! Replay scripts.
//!
//! A script drives an in-memory target one line at a time. Blank lines and
//! lines starting with `#` are skipped.
//!
//! ```text
//! class com.acme.Foo 10 11 12     # define a loaded class with code lines
//! load com.acme.Bar 5             # load a class while connected
//! thread 2 worker                 # add a thread
//! set count 6                     # set a variable for the evaluator
//! fail broken NullPointerException
//! break go Foo:10 t:main          # any breakpoint command
//! condition 1 count > 5
//! monitor 1 count
//! disable 1 / enable 1 / delete 1
//! hit com.acme.Foo 10 [thread]
//! throw java.io.IOException caught|uncaught [thread]
//! enter com.acme.Foo 10 [thread] / exit com.acme.Foo 12 [thread]
//! list
//! ```

use std::fmt;

use haltpoint_core::types::{ThreadId, Value};

/// One scripted action.
#[derive(Debug, Clone, PartialEq)]
pub enum Step
{
    Define
    {
        class: String,
        lines: Vec<u32>,
    },
    Load
    {
        class: String,
        lines: Vec<u32>,
    },
    Thread
    {
        thread: ThreadId,
        name: String,
    },
    Set
    {
        name: String,
        value: Value,
    },
    Fail
    {
        expression: String,
        message: String,
    },
    Break(String),
    Condition
    {
        number: u32,
        expression: String,
    },
    Monitor
    {
        number: u32,
        expression: String,
    },
    Enable(u32),
    Disable(u32),
    Delete(u32),
    Hit
    {
        class: String,
        line: u32,
        thread: Option<ThreadId>,
    },
    Throw
    {
        class: String,
        caught: bool,
        thread: Option<ThreadId>,
    },
    Enter
    {
        class: String,
        line: u32,
        thread: Option<ThreadId>,
    },
    Exit
    {
        class: String,
        line: u32,
        thread: Option<ThreadId>,
    },
    List,
}

/// A script line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError
{
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ScriptError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ScriptError {}

/// Parse a whole script. Stops at the first bad line.
pub fn parse_script(text: &str) -> Result<Vec<Step>, ScriptError>
{
    let mut steps = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.split_once('#').map_or(raw, |(code, _)| code).trim();
        if line.is_empty() {
            continue;
        }
        let step = parse_step(line).map_err(|message| ScriptError {
            line: index + 1,
            message,
        })?;
        steps.push(step);
    }
    Ok(steps)
}

fn parse_step(line: &str) -> Result<Step, String>
{
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let words: Vec<&str> = rest.split_whitespace().collect();

    match verb {
        "class" | "load" => {
            let (class, lines) = words.split_first().ok_or("missing class name")?;
            let lines = lines.iter().map(|word| number(word)).collect::<Result<Vec<_>, _>>()?;
            let class = (*class).to_string();
            Ok(if verb == "class" { Step::Define { class, lines } } else { Step::Load { class, lines } })
        }
        "thread" => match words.as_slice() {
            [id, name] => Ok(Step::Thread {
                thread: ThreadId(u64::from(number(id)?)),
                name: (*name).to_string(),
            }),
            _ => Err("expected: thread <id> <name>".to_string()),
        },
        "set" => match words.as_slice() {
            [name, value] => Ok(Step::Set {
                name: (*name).to_string(),
                value: value_of(value),
            }),
            _ => Err("expected: set <name> <value>".to_string()),
        },
        "fail" => {
            let (expression, message) = rest.split_once(char::is_whitespace).ok_or("expected: fail <expression> <message>")?;
            Ok(Step::Fail {
                expression: expression.to_string(),
                message: message.trim().to_string(),
            })
        }
        "break" if !rest.is_empty() => Ok(Step::Break(rest.to_string())),
        "condition" | "monitor" => {
            let (id, expression) = rest.split_once(char::is_whitespace).ok_or("expected a breakpoint number and an expression")?;
            let number = number(id)?;
            let expression = expression.trim().to_string();
            Ok(if verb == "condition" {
                Step::Condition { number, expression }
            } else {
                Step::Monitor { number, expression }
            })
        }
        "enable" => Ok(Step::Enable(number(rest)?)),
        "disable" => Ok(Step::Disable(number(rest)?)),
        "delete" => Ok(Step::Delete(number(rest)?)),
        "hit" | "enter" | "exit" => {
            let [class, line, tail @ ..] = words.as_slice() else {
                return Err(format!("expected: {verb} <class> <line> [thread]"));
            };
            let class = (*class).to_string();
            let line = number(line)?;
            let thread = thread_of(tail)?;
            Ok(match verb {
                "hit" => Step::Hit { class, line, thread },
                "enter" => Step::Enter { class, line, thread },
                _ => Step::Exit { class, line, thread },
            })
        }
        "throw" => {
            let [class, mode, tail @ ..] = words.as_slice() else {
                return Err("expected: throw <class> caught|uncaught [thread]".to_string());
            };
            let caught = match *mode {
                "caught" => true,
                "uncaught" => false,
                other => return Err(format!("expected caught or uncaught, got '{other}'")),
            };
            Ok(Step::Throw {
                class: (*class).to_string(),
                caught,
                thread: thread_of(tail)?,
            })
        }
        "list" => Ok(Step::List),
        _ => Err(format!("unknown step '{line}'")),
    }
}

fn number(word: &str) -> Result<u32, String>
{
    word.trim().parse().map_err(|_| format!("'{word}' is not a number"))
}

fn thread_of(words: &[&str]) -> Result<Option<ThreadId>, String>
{
    match words {
        [] => Ok(None),
        [id] => Ok(Some(ThreadId(u64::from(number(id)?)))),
        _ => Err("too many arguments".to_string()),
    }
}

fn value_of(word: &str) -> Value
{
    match word {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        "null" => Value::Null,
        _ => word.parse::<i64>().map_or_else(|_| Value::from(word), Value::Integer),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_script_skips_comments()
    {
        let steps = parse_script("# setup\nclass com.acme.Foo 10 11\n\nbreak go Foo:10 # silent\nhit com.acme.Foo 10 2\n").unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Define {
                    class: "com.acme.Foo".to_string(),
                    lines: vec![10, 11],
                },
                Step::Break("go Foo:10".to_string()),
                Step::Hit {
                    class: "com.acme.Foo".to_string(),
                    line: 10,
                    thread: Some(ThreadId(2)),
                },
            ]
        );
    }

    #[test]
    fn test_condition_keeps_whole_expression()
    {
        let steps = parse_script("condition 1 count > 5").unwrap();
        assert_eq!(
            steps[0],
            Step::Condition {
                number: 1,
                expression: "count > 5".to_string(),
            }
        );
    }

    #[test]
    fn test_set_infers_value_type()
    {
        let steps = parse_script("set ready true\nset count 6\nset name bob").unwrap();
        let values: Vec<Value> = steps
            .into_iter()
            .filter_map(|step| match step {
                Step::Set { value, .. } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![Value::Boolean(true), Value::Integer(6), Value::from("bob")]);
    }

    #[test]
    fn test_errors_carry_line_numbers()
    {
        let error = parse_script("list\nhit Foo ten").unwrap_err();
        assert_eq!(error.line, 2);
        assert!(error.to_string().contains("'ten' is not a number"));
        assert!(parse_script("throw Foo sometimes").is_err());
        assert!(parse_script("jump 3").is_err());
    }
}
