//! Parameter values and declared types.
//!
//! A parameter holds one of a closed set of value kinds. Declared types are
//! checked against the outer kind only: a `list[int]` parameter accepts any
//! list, the element descriptor is informational.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, Serializer};

/// A concrete parameter value. Absence of a value is `Option::None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the value's kind, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view of a numeric value (ints are widened)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Convert a JSON value. JSON `null` has no counterpart and yields `None`.
    ///
    /// Nested nulls are dropped: a `null` list item is skipped and a map entry
    /// whose value is `null` is left out, so `[1, null, 2]` becomes `[1, 2]`.
    /// Use [`ValueType::parse`] where that loss must be rejected instead.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Bool(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Int(i)),
                None => n.as_f64().map(Value::Float),
            },
            serde_json::Value::String(s) => Some(Value::Str(s)),
            serde_json::Value::Array(items) => Some(Value::List(
                items.into_iter().filter_map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(entries) => Some(Value::Map(
                entries
                    .into_iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }

    /// Render the value for log output, truncating long strings.
    ///
    /// Containers are summarized by size rather than printed.
    pub fn summary(&self, max_len: usize) -> String {
        match self {
            Value::Str(s) if s.chars().count() > max_len => {
                let head: String = s.chars().take(max_len).collect();
                format!("\"{}...\"", head)
            }
            Value::Str(s) => format!("\"{}\"", s),
            Value::List(items) => format!("[list: {} items]", items.len()),
            Value::Map(map) => format!("{{map: {} keys}}", map.len()),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(_) | Value::Map(_) => match serde_json::to_string(self) {
                Ok(json) => write!(f, "{}", json),
                Err(_) => write!(f, "<{}>", self.type_name()),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(map: BTreeMap<String, T>) -> Self {
        Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Declared type of a parameter.
///
/// `List` and `Map` carry an optional element descriptor which is shown in
/// listings but not enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    /// Accepts every non-null value
    Any,
    Bool,
    Int,
    Float,
    Str,
    List(Option<Box<ValueType>>),
    Map(Option<Box<ValueType>>),
}

impl ValueType {
    /// A list of unknown element type
    pub fn list() -> Self {
        ValueType::List(None)
    }

    pub fn list_of(element: ValueType) -> Self {
        ValueType::List(Some(Box::new(element)))
    }

    /// A string-keyed map of unknown value type
    pub fn map() -> Self {
        ValueType::Map(None)
    }

    pub fn map_of(element: ValueType) -> Self {
        ValueType::Map(Some(Box::new(element)))
    }

    /// Whether `value` satisfies this declared type (outer kind only)
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ValueType::Any => true,
            ValueType::Bool => matches!(value, Value::Bool(_)),
            ValueType::Int => matches!(value, Value::Int(_)),
            ValueType::Float => matches!(value, Value::Float(_)),
            ValueType::Str => matches!(value, Value::Str(_)),
            ValueType::List(_) => matches!(value, Value::List(_)),
            ValueType::Map(_) => matches!(value, Value::Map(_)),
        }
    }

    /// Parse command-line text into a value of this type
    pub fn parse(&self, text: &str) -> Result<Value> {
        let value = match self {
            ValueType::Bool => Value::Bool(
                text.trim()
                    .parse()
                    .with_context(|| format!("Invalid bool: {}", text))?,
            ),
            ValueType::Int => Value::Int(
                text.trim()
                    .parse()
                    .with_context(|| format!("Invalid int: {}", text))?,
            ),
            ValueType::Float => Value::Float(
                text.trim()
                    .parse()
                    .with_context(|| format!("Invalid float: {}", text))?,
            ),
            ValueType::Str => Value::Str(text.to_string()),
            ValueType::List(_) | ValueType::Map(_) => {
                let json: serde_json::Value = serde_json::from_str(text)
                    .with_context(|| format!("Invalid JSON for {}: {}", self, text))?;
                if contains_nested_null(&json) {
                    anyhow::bail!("Expected {} without null items: {}", self, text);
                }
                let value = Value::from_json(json)
                    .with_context(|| format!("Expected {}, got null", self))?;
                if !self.accepts(&value) {
                    anyhow::bail!("Expected {}, got {}", self, value.type_name());
                }
                value
            }
            ValueType::Any => serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .and_then(Value::from_json)
                .unwrap_or_else(|| Value::Str(text.to_string())),
        };
        Ok(value)
    }
}

/// Whether a JSON container holds a `null` at any depth
fn contains_nested_null(json: &serde_json::Value) -> bool {
    match json {
        serde_json::Value::Array(items) => items
            .iter()
            .any(|item| item.is_null() || contains_nested_null(item)),
        serde_json::Value::Object(entries) => entries
            .values()
            .any(|value| value.is_null() || contains_nested_null(value)),
        _ => false,
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "any"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Str => write!(f, "str"),
            ValueType::List(None) => write!(f, "list"),
            ValueType::List(Some(element)) => write!(f, "list[{}]", element),
            ValueType::Map(None) => write!(f, "map"),
            ValueType::Map(Some(element)) => write!(f, "map[{}]", element),
        }
    }
}

impl Serialize for ValueType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
