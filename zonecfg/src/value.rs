//! Values found on the right hand side of a `zonecfg info` line.
//!
//! zonecfg prints three shapes of value: plain scalars (`autoboot: true`),
//! bracketed lists (`[a,"b,c"]`) and parenthesized property lists
//! (`(priv=privileged,limit=100,action=none)`). Scalars are coerced to
//! integers and booleans where they look like one.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(u64),
    Boolean(bool),
    List(Vec<String>),
    /// Values of a map are always scalars.
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key of a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::List(items) => write!(f, "[{}]", items.join(",")),
            Value::Map(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "({})", pairs.join(","))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Parse the text after the first colon of a report line.
pub fn parse_value(raw: &str) -> Value {
    let value = raw.trim();

    if let Some(inner) = enclosed(value, '[', ']') {
        let items = split_unquoted(inner)
            .into_iter()
            .map(|item| strip_quotes(item.trim()))
            .filter(|item| !item.is_empty())
            .collect();
        return Value::List(items);
    }

    if let Some(inner) = enclosed(value, '(', ')') {
        let mut map = BTreeMap::new();
        for pair in split_unquoted(inner) {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            match pair.split_once('=') {
                Some((key, val)) => {
                    map.insert(key.trim().to_string(), coerce(&strip_quotes(val.trim())));
                }
                None => warn!(target: "zonecfg", "dropping map element without '=': {}", pair),
            }
        }
        return Value::Map(map);
    }

    coerce(&strip_quotes(value))
}

/// Split on commas that are not inside single or double quotes.
/// Quotes are kept in the returned pieces.
pub fn split_unquoted(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (idx, c) in text.char_indices() {
        match (quote, c) {
            (None, '"') | (None, '\'') => quote = Some(c),
            (Some(open), c) if c == open => quote = None,
            (None, ',') => {
                pieces.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);
    pieces
}

fn enclosed(value: &str, open: char, close: char) -> Option<&str> {
    value.strip_prefix(open)?.strip_suffix(close)
}

fn strip_quotes(text: &str) -> String {
    let text = text.replace('"', "");
    match text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        Some(inner) => inner.to_string(),
        None => text,
    }
}

fn coerce(text: &str) -> Value {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = text.parse::<u64>() {
            return Value::Integer(n);
        }
    }
    match text {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => Value::String(text.to_string()),
    }
}
