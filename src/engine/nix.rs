//! Minimal Nix expression writer.
//!
//! Only the subset a disko layout needs: strings, indented strings, lists
//! and attribute sets. Output is deterministic (attribute order is insertion
//! order) with two-space indentation, so generated files diff cleanly.

use std::fmt::{self, Write};

/// A Nix value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NixValue {
    /// `"..."`, escaped
    Str(String),
    /// `''...''` indented string, one source line per line
    Lines(String),
    /// `[ a b ]`
    List(Vec<NixValue>),
    /// `{ k = v; }`, keys in insertion order
    Attrs(Vec<(String, NixValue)>),
}

impl NixValue {
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    pub fn lines(value: impl Into<String>) -> Self {
        Self::Lines(value.into())
    }

    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<NixValue>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn attrs<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, NixValue)>,
        K: Into<String>,
    {
        Self::Attrs(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up an attribute by name (attribute sets only).
    pub fn get(&self, key: &str) -> Option<&NixValue> {
        match self {
            Self::Attrs(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Render with the opening token at column `indent`.
    pub fn render(&self, indent: usize) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_to(&mut out, indent);
        out
    }

    fn write_to(&self, out: &mut String, indent: usize) -> fmt::Result {
        match self {
            Self::Str(s) => out.write_str(&quote_string(s)),
            Self::Lines(s) => {
                out.write_str("''\n")?;
                for line in s.lines() {
                    if !line.is_empty() {
                        pad(out, indent + 2);
                        out.write_str(&escape_indented(line))?;
                    }
                    out.write_char('\n')?;
                }
                pad(out, indent);
                out.write_str("''")
            }
            Self::List(items) if items.is_empty() => out.write_str("[ ]"),
            Self::List(items) if items.iter().all(NixValue::is_inline) => {
                out.write_str("[")?;
                for item in items {
                    out.write_char(' ')?;
                    item.write_to(out, indent)?;
                }
                out.write_str(" ]")
            }
            Self::List(items) => {
                out.write_str("[\n")?;
                for item in items {
                    pad(out, indent + 2);
                    item.write_to(out, indent + 2)?;
                    out.write_char('\n')?;
                }
                pad(out, indent);
                out.write_str("]")
            }
            Self::Attrs(entries) if entries.is_empty() => out.write_str("{ }"),
            Self::Attrs(entries) => {
                out.write_str("{\n")?;
                for (key, value) in entries {
                    pad(out, indent + 2);
                    out.write_str(&attr_name(key))?;
                    out.write_str(" = ")?;
                    value.write_to(out, indent + 2)?;
                    out.write_str(";\n")?;
                }
                pad(out, indent);
                out.write_str("}")
            }
        }
    }

    fn is_inline(&self) -> bool {
        matches!(self, Self::Str(_))
    }
}

impl From<&str> for NixValue {
    fn from(value: &str) -> Self {
        Self::str(value)
    }
}

impl From<String> for NixValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl fmt::Display for NixValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(0))
    }
}

/// A whole `.nix` file: leading comments, an optional function head such
/// as `{ lib, ... }:`, and the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NixFile {
    pub comments: Vec<String>,
    pub function_args: Option<String>,
    pub body: NixValue,
}

impl fmt::Display for NixFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for comment in &self.comments {
            writeln!(f, "# {}", comment)?;
        }
        if !self.comments.is_empty() {
            writeln!(f)?;
        }
        if let Some(args) = &self.function_args {
            writeln!(f, "{{ {} }}:", args)?;
        }
        writeln!(f, "{}", self.body.render(0))
    }
}

fn pad(out: &mut String, width: usize) {
    out.extend(std::iter::repeat_n(' ', width));
}

/// Whether `name` can appear unquoted on the left of `=`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '\'' | '-'))
        && !matches!(
            name,
            "if" | "then" | "else" | "assert" | "with" | "let" | "in" | "rec" | "inherit" | "or"
        )
}

fn attr_name(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        quote_string(name)
    }
}

/// Render `s` as a double-quoted Nix string.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Escape a line for use inside `''...''`.
fn escape_indented(line: &str) -> String {
    line.replace("''", "'''").replace("${", "''${")
}
