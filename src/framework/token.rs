//! Token expressions embedded in rule strings.
//!
//! | Token | Resolves to |
//! |---|---|
//! | `${name}` | request parameter |
//! | `@{name}` | request attribute, then action result of the same id |
//! | `%{name}` | setting |
//!
//! Any token may carry a default after a colon: `${page:1}`.
//! A string that consists of exactly one token evaluates to the raw value;
//! otherwise the tokens are interpolated as text.

use serde_json::Value;

/// Source of token values.
pub trait TokenResolver {
    fn parameter(&self, name: &str) -> Option<String>;

    fn attribute(&self, name: &str) -> Option<Value>;

    fn setting(&self, _name: &str) -> Option<Value> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Parameter,
    Attribute,
    Setting,
}

#[derive(Debug, PartialEq, Eq)]
enum Part<'a> {
    Text(&'a str),
    Token {
        kind: TokenKind,
        name: &'a str,
        default: Option<&'a str>,
    },
}

fn parse(expression: &str) -> Vec<Part<'_>> {
    let mut parts = Vec::new();
    let mut rest = expression;
    while let Some(start) = find_token_start(rest) {
        let kind = match rest.as_bytes()[start] {
            b'$' => TokenKind::Parameter,
            b'@' => TokenKind::Attribute,
            _ => TokenKind::Setting,
        };
        let body_start = start + 2;
        let Some(len) = rest[body_start..].find('}') else {
            break;
        };
        if start > 0 {
            parts.push(Part::Text(&rest[..start]));
        }
        let body = &rest[body_start..body_start + len];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };
        parts.push(Part::Token {
            kind,
            name: name.trim(),
            default,
        });
        rest = &rest[body_start + len + 1..];
    }
    if !rest.is_empty() {
        parts.push(Part::Text(rest));
    }
    parts
}

fn find_token_start(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    (0..bytes.len().saturating_sub(1))
        .find(|&i| matches!(bytes[i], b'$' | b'@' | b'%') && bytes[i + 1] == b'{')
}

fn resolve(kind: TokenKind, name: &str, default: Option<&str>, resolver: &dyn TokenResolver) -> Value {
    let found = match kind {
        TokenKind::Parameter => resolver.parameter(name).map(Value::String),
        TokenKind::Attribute => resolver.attribute(name),
        TokenKind::Setting => resolver.setting(name),
    };
    found
        .or_else(|| default.map(|d| Value::String(d.to_string())))
        .unwrap_or(Value::Null)
}

fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// True when the string contains at least one token.
pub fn has_tokens(expression: &str) -> bool {
    parse(expression)
        .iter()
        .any(|p| matches!(p, Part::Token { .. }))
}

/// Evaluates an expression, keeping the raw value of a lone token.
pub fn evaluate(expression: &str, resolver: &dyn TokenResolver) -> Value {
    let parts = parse(expression);
    match parts.as_slice() {
        [Part::Token { kind, name, default }] => resolve(*kind, name, *default, resolver),
        _ => Value::String(interpolate(&parts, resolver)),
    }
}

/// Evaluates an expression into text.
pub fn evaluate_string(expression: &str, resolver: &dyn TokenResolver) -> String {
    interpolate(&parse(expression), resolver)
}

fn interpolate(parts: &[Part<'_>], resolver: &dyn TokenResolver) -> String {
    parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => (*text).to_string(),
            Part::Token { kind, name, default } => as_text(&resolve(*kind, name, *default, resolver)),
        })
        .collect()
}

/// Evaluates every string nested in a JSON value.
pub fn evaluate_value(value: &Value, resolver: &dyn TokenResolver) -> Value {
    match value {
        Value::String(s) if has_tokens(s) => evaluate(s, resolver),
        Value::Array(items) => Value::Array(items.iter().map(|v| evaluate_value(v, resolver)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), evaluate_value(v, resolver)))
                .collect(),
        ),
        other => other.clone(),
    }
}
