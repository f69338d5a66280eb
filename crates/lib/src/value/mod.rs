//! The dynamically-typed value tree.
//!
//! Everything the registry stores or hands out (raw documents, merged views,
//! change patches) is a [`Value`]: a recursive tagged union of null, scalars,
//! ordered lists, and insertion-ordered string-keyed maps. Values are always
//! deep-copyable; `clone()` is a structural copy.
//!
//! # Usage
//!
//! ```
//! use sediment::{Value, map, list};
//!
//! let doc = map! {
//!     "name" => "web-frontend",
//!     "ports" => list![80, 443],
//!     "limits" => map! { "connections" => 1024u32 },
//! };
//!
//! assert_eq!(doc.get("name").and_then(Value::as_str), Some("web-frontend"));
//! assert_eq!(doc.get("limits").and_then(|l| l.get("connections")),
//!            Some(&Value::UInt32(1024)));
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The map flavor used throughout: string keys, insertion-ordered iteration.
///
/// Iteration order is preserved for display and round-tripping but is never
/// semantically significant.
pub type Map = IndexMap<String, Value>;

/// A recursive, dynamically-typed configuration value.
///
/// Scalar variants mirror the numeric widths of the document format
/// (`Int32`/`UInt32`/`Int64`/`UInt64`/`Double`); all merge/diff logic pattern
/// matches on this enum. Two values of different variants never compare
/// equal, even when numerically equivalent.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null/absent value
    Null,
    /// UTF-8 string
    String(String),
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 32-bit unsigned integer
    UInt32(u32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit unsigned integer
    UInt64(u64),
    /// Double-precision float
    Double(f64),
    /// Ordered list of values
    List(Vec<Value>),
    /// Insertion-ordered map of string keys to values
    Map(Map),
}

impl Value {
    /// Returns true if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this is a scalar (string, bool, or numeric) value
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Null | Value::List(_) | Value::Map(_))
    }

    /// Returns true if this is a map
    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// Returns true if this is a list
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Returns the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::UInt32(_) => "uint32",
            Value::Int64(_) => "int64",
            Value::UInt64(_) => "uint64",
            Value::Double(_) => "double",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Attempts to view this value as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to view this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to view this value as a map
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Attempts to view this value as a mutable map
    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Attempts to view this value as a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Attempts to view this value as a mutable list
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Map lookup; `None` when this value is not a map or the key is absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Map lookup of a string-valued key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Number of entries in a map or list; 0 for everything else.
    pub fn len(&self) -> usize {
        match self {
            Value::List(l) => l.len(),
            Value::Map(m) => m.len(),
            _ => 0,
        }
    }

    /// Returns true when a map or list holds no entries (scalars and null
    /// count as empty).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts a parsed JSON value into a `Value`.
    ///
    /// Numbers become `Int64` when they fit a signed 64-bit integer, then
    /// `UInt64`, then `Double`. Object key order is preserved.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt64(u)
                } else {
                    Value::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts this value into its JSON representation.
    ///
    /// Non-finite doubles have no JSON spelling and become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int32(n) => serde_json::Value::from(*n),
            Value::UInt32(n) => serde_json::Value::from(*n),
            Value::Int64(n) => serde_json::Value::from(*n),
            Value::UInt64(n) => serde_json::Value::from(*n),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from_json)
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

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::UInt32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt64(n)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Map> for Value {
    fn from(entries: Map) -> Self {
        Value::Map(entries)
    }
}

/// Builds a [`Value::Map`] literal.
///
/// Keys are anything with `to_string()`, values anything with a
/// `From` impl for [`Value`]:
///
/// ```
/// use sediment::{Value, map};
///
/// let v = map! { "host" => "localhost", "port" => 8080u32 };
/// assert_eq!(v.get_str("host"), Some("localhost"));
/// ```
#[macro_export]
macro_rules! map {
    {} => { $crate::Value::Map($crate::value::Map::new()) };
    { $( $key:expr => $val:expr ),+ $(,)? } => {{
        let mut m = $crate::value::Map::new();
        $( m.insert(($key).to_string(), $crate::Value::from($val)); )+
        $crate::Value::Map(m)
    }};
}

/// Builds a [`Value::List`] literal; companion to [`map!`].
#[macro_export]
macro_rules! list {
    [] => { $crate::Value::List(Vec::new()) };
    [ $( $val:expr ),+ $(,)? ] => {
        $crate::Value::List(vec![ $( $crate::Value::from($val) ),+ ])
    };
}
