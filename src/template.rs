//! Template interpolation
//!
//! A small mustache-style engine used for every configurable string field.
//! Supports `{{name}}` lookups with dotted paths into the rendering context,
//! environment lookups, and a fixed library of block helpers applied to their
//! rendered body:
//!
//! ```text
//! {{#sanitizeLower}}{{branch}}{{/sanitizeLower}}
//! {{#short7}}{{releaseScope.finalCommit}}{{/short7}}
//! {{#environment.variable}}GITHUB_TOKEN{{/environment.variable}}
//! ```
//!
//! Undefined names render empty. Helper misuse (bad arguments, a non-numeric
//! timestamp body) also renders empty, so a template never fails late in the
//! pipeline; only malformed syntax is an error.

use crate::error::{ReleaseError, Result};
use chrono::{TimeZone, Utc};
use serde_json::Value;

/// Render a template against a context tree
pub fn render(template: &str, context: &Value) -> Result<String> {
    let tokens = tokenize(template)?;
    let mut idx = 0;
    let nodes = build(&tokens, &mut idx, None)?;
    if idx != tokens.len() {
        return Err(ReleaseError::template("Unbalanced block close tag"));
    }
    let mut out = String::new();
    render_nodes(&nodes, context, &mut out)?;
    Ok(out)
}

/// Render a boolean-valued template
///
/// The template resolves to a string first; only a case-insensitive `true`
/// counts as true.
pub fn render_boolean(template: &str, context: &Value) -> Result<bool> {
    let rendered = render(template, context)?;
    Ok(rendered.trim().eq_ignore_ascii_case("true"))
}

#[derive(Debug)]
enum Token {
    Text(String),
    Var(String),
    Open(String, Vec<String>),
    Close(String),
}

#[derive(Debug)]
enum Node {
    Text(String),
    Var(String),
    Block {
        name: String,
        args: Vec<String>,
        children: Vec<Node>,
    },
}

fn tokenize(template: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| ReleaseError::template("Unterminated tag: missing '}}'"))?;
        let inner = after[..end].trim();
        if inner.is_empty() {
            return Err(ReleaseError::template("Empty tag"));
        }
        if let Some(block) = inner.strip_prefix('#') {
            let mut parts = block.trim().splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or_default().to_string();
            if name.is_empty() {
                return Err(ReleaseError::template("Block tag without a name"));
            }
            let args = parts.next().map(parse_args).unwrap_or_default();
            tokens.push(Token::Open(name, args));
        } else if let Some(name) = inner.strip_prefix('/') {
            tokens.push(Token::Close(name.trim().to_string()));
        } else {
            tokens.push(Token::Var(inner.to_string()));
        }
        rest = &after[end + 2..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }
    Ok(tokens)
}

fn parse_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = raw.trim().chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut arg = String::new();
            for ch in chars.by_ref() {
                if ch == '"' {
                    break;
                }
                arg.push(ch);
            }
            args.push(arg);
        } else {
            let mut arg = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                arg.push(ch);
                chars.next();
            }
            args.push(arg);
        }
    }
    args
}

fn build(tokens: &[Token], idx: &mut usize, open: Option<&str>) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    while *idx < tokens.len() {
        match &tokens[*idx] {
            Token::Text(text) => {
                nodes.push(Node::Text(text.clone()));
                *idx += 1;
            }
            Token::Var(path) => {
                nodes.push(Node::Var(path.clone()));
                *idx += 1;
            }
            Token::Open(name, args) => {
                *idx += 1;
                let children = build(tokens, idx, Some(name))?;
                nodes.push(Node::Block {
                    name: name.clone(),
                    args: args.clone(),
                    children,
                });
            }
            Token::Close(name) => {
                match open {
                    Some(expected) if expected == name => {
                        *idx += 1;
                        return Ok(nodes);
                    }
                    _ => {
                        return Err(ReleaseError::template(format!(
                            "Unexpected block close: '{}'",
                            name
                        )))
                    }
                }
            }
        }
    }
    if let Some(expected) = open {
        return Err(ReleaseError::template(format!(
            "Unclosed block: '{}'",
            expected
        )));
    }
    Ok(nodes)
}

fn render_nodes(nodes: &[Node], context: &Value, out: &mut String) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(path) => out.push_str(&lookup(path, context)),
            Node::Block {
                name,
                args,
                children,
            } => {
                let mut body = String::new();
                render_nodes(children, context, &mut body)?;
                out.push_str(&apply_helper(name, args, &body));
            }
        }
    }
    Ok(())
}

/// Resolve a dotted path against the context, with environment special cases
fn lookup(path: &str, context: &Value) -> String {
    if let Some(var) = path.strip_prefix("environment.variable.") {
        return std::env::var(var).unwrap_or_default();
    }
    if path == "environment.user" {
        return std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_default();
    }
    let mut current = context;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    scalar_to_string(current)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Objects, arrays and null have no textual form here.
        _ => String::new(),
    }
}

fn apply_helper(name: &str, args: &[String], body: &str) -> String {
    match name {
        "lower" => body.to_lowercase(),
        "upper" => body.to_uppercase(),
        "trim" => body.trim().to_string(),
        "capitalize" => {
            let mut chars = body.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        }
        "first" => body.split_whitespace().next().unwrap_or_default().to_string(),
        "last" => body.split_whitespace().last().unwrap_or_default().to_string(),
        "sanitize" => body.chars().filter(|c| c.is_ascii_alphanumeric()).collect(),
        "sanitizeLower" => body
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase(),
        "short5" => body.chars().take(5).collect(),
        "short6" => body.chars().take(6).collect(),
        "short7" => body.chars().take(7).collect(),
        // Body holds epoch milliseconds; an empty body means now.
        "timestampYYYYMMDDHHMMSS" => format_timestamp(body, "%Y%m%d%H%M%S"),
        "timestampISO8601" => format_timestamp(body, "%Y-%m-%dT%H:%M:%SZ"),
        "environment.variable" => std::env::var(body.trim()).unwrap_or_default(),
        "environment.user" => std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_default(),
        "file.exists" => std::path::Path::new(body.trim()).exists().to_string(),
        "file.content" => std::fs::read_to_string(body.trim()).unwrap_or_default(),
        "replace" => match (args.first(), args.get(1)) {
            (Some(from), Some(to)) if !from.is_empty() => body.replace(from.as_str(), to),
            _ => String::new(),
        },
        // cutLeft keeps the rightmost N characters, cutRight the leftmost N.
        "cutLeft" => match args.first().and_then(|a| a.parse::<usize>().ok()) {
            Some(n) => {
                let chars: Vec<char> = body.chars().collect();
                let start = chars.len().saturating_sub(n);
                chars[start..].iter().collect()
            }
            None => String::new(),
        },
        "cutRight" => match args.first().and_then(|a| a.parse::<usize>().ok()) {
            Some(n) => body.chars().take(n).collect(),
            None => String::new(),
        },
        _ => String::new(),
    }
}

fn format_timestamp(body: &str, format: &str) -> String {
    let trimmed = body.trim();
    let datetime = if trimmed.is_empty() {
        Utc::now()
    } else {
        match trimmed.parse::<i64>() {
            Ok(millis) => match Utc.timestamp_millis_opt(millis).single() {
                Some(dt) => dt,
                None => return String::new(),
            },
            Err(_) => return String::new(),
        }
    };
    datetime.format(format).to_string()
}
