//! Typed parameter values bound to a stage
//!
//! [`Parameters`] keeps insertion order, which is the order the stage's
//! descriptors list them. Order matters for display and for the serialized
//! kwargs; lookups are by name.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Key under which expressions are tagged in the JSON form
pub const EXPR_KEY: &str = "$expr";

/// A single typed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
    /// Nested expression source, already syntax-checked
    Expr(String),
}

impl ParamValue {
    /// JSON form used on the session wire
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Null => Value::Null,
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Int(i) => Value::Number((*i).into()),
            ParamValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            ParamValue::Str(s) => Value::String(s.clone()),
            ParamValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            ParamValue::Expr(src) => {
                let mut map = Map::new();
                map.insert(EXPR_KEY.to_string(), Value::String(src.clone()));
                Value::Object(map)
            }
        }
    }

    /// Inverse of [`ParamValue::to_json`]
    pub fn from_json(value: &Value) -> Result<ParamValue, String> {
        Ok(match value {
            Value::Null => ParamValue::Null,
            Value::Bool(b) => ParamValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Int(i),
                None => ParamValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ParamValue::Str(s.clone()),
            Value::Array(items) => ParamValue::List(
                items
                    .iter()
                    .map(ParamValue::from_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::Object(map) => match map.get(EXPR_KEY) {
                Some(Value::String(src)) if map.len() == 1 => ParamValue::Expr(src.clone()),
                _ => return Err(format!("unsupported object value {}", value)),
            },
        })
    }

    /// Text form accepted back by the built-in grammar
    pub fn render(&self) -> String {
        match self {
            ParamValue::Null => "none".to_string(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => format!("{:?}", f),
            ParamValue::Str(s) if is_bare_word(s) => s.clone(),
            ParamValue::Str(s) => quote(s),
            ParamValue::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.render()).collect();
                format!("[{}]", inner.join(", "))
            }
            ParamValue::Expr(src) => src.clone(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&str> {
        match self {
            ParamValue::Expr(src) => Some(src),
            _ => None,
        }
    }

    /// Strings of a string list (or a lone string)
    pub fn as_str_list(&self) -> Vec<&str> {
        match self {
            ParamValue::Str(s) => vec![s.as_str()],
            ParamValue::List(items) => items.iter().filter_map(|v| v.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ParamValue::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// True for identifiers and dotted paths like `ground_truth.label`
pub fn is_bare_word(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    let reserved = matches!(s, "true" | "false" | "none" | "None" | "null");
    !reserved && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Ordered name → value bindings of one stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Vec<(String, ParamValue)>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value, replacing an existing binding in place
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ParamValue)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}
