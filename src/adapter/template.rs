//! Command templates for adapter and caption bridges.
//!
//! A template is a shell-like command line with `{name}` placeholders:
//!
//! ```text
//! gui-bridge --adapter {adapter} --model {model_name} --base-url {base_url}
//! ```
//!
//! `{{` and `}}` render literal braces. Values are shell-quoted before the
//! line is split into argv, so a value containing spaces or quotes always
//! lands in a single argument.

use std::collections::BTreeMap;
use thiserror::Error;

/// Variables available to a template.
pub type TemplateVars = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{name}}}' at position {position} in command template")]
    UnknownPlaceholder { name: String, position: usize },

    #[error("unmatched '{{' at position {position} in command template")]
    UnmatchedBrace { position: usize },

    #[error("empty placeholder '{{}}' at position {position} in command template")]
    EmptyPlaceholder { position: usize },

    #[error("command template is not a valid command line: {0}")]
    Split(String),

    #[error("command template is empty")]
    Empty,
}

/// Substitute placeholders in `template`, quoting each value with `quote`.
fn substitute(
    template: &str,
    vars: &TemplateVars,
    quote: impl Fn(&str) -> String,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, c)) => name.push(c),
                        None => return Err(TemplateError::UnmatchedBrace { position: pos }),
                    }
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder { position: pos });
                }
                let value = vars.get(name).ok_or_else(|| TemplateError::UnknownPlaceholder {
                    name: name.to_string(),
                    position: pos,
                })?;
                out.push_str(&quote(value));
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                out.push('}');
            }
            _ => out.push(ch),
        }
    }

    Ok(out)
}

/// Render `template` and split it into a program and its arguments.
pub fn render_argv(template: &str, vars: &TemplateVars) -> Result<Vec<String>, TemplateError> {
    let line = substitute(template, vars, |v| shell_words::quote(v).into_owned())?;
    let argv = shell_words::split(&line).map_err(|e| TemplateError::Split(e.to_string()))?;
    if argv.is_empty() {
        return Err(TemplateError::Empty);
    }
    Ok(argv)
}
