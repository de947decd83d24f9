//! Attribute values and the flat attribute map
//!
//! Every attribute the engine handles is a [`Value`]: a primitive, an ordered
//! list, an unordered set, a string-keyed map, or a nested block. A resource's
//! attributes live in an [`Attributes`] map keyed by top-level attribute name.
//! Nested values are addressed with dotted paths:
//!
//! - `network.0.address` - field of the first element of a block list
//! - `tags.env` - key of a map
//! - `rules.1a2b3c4d.port` - field of a set element, keyed by its set hash

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Number of hex characters used for set element keys
const SET_HASH_LEN: usize = 8;

/// A single attribute value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Ordered collection, compared positionally
    List(Vec<Value>),
    /// Unordered collection, compared by content
    Set(Vec<Value>),
    /// Leaf-only string mapping
    Map(BTreeMap<String, String>),
    /// Nested record
    Block(Attributes),
}

impl Value {
    /// Build a set, dropping duplicates and sorting into canonical order
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut keyed: Vec<(String, Value)> = items
            .into_iter()
            .map(|item| (item.canonical_key(), item))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.dedup_by(|a, b| a.0 == b.0);
        Self::Set(keyed.into_iter().map(|(_, item)| item).collect())
    }

    /// Build a list
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Build a nested block
    pub fn block(attributes: impl Into<Attributes>) -> Self {
        Self::Block(attributes.into())
    }

    /// Build a string map
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Short name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Block(_) => "block",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as a float; ints widen
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Elements of a list or set
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) | Self::Set(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Attributes> {
        match self {
            Self::Block(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Deterministic text form; two values with the same key are equal
    ///
    /// Sets and maps are rendered in sorted order so the key does not depend
    /// on insertion order.
    pub fn canonical_key(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Self::Bool(b) => out.push_str(if *b { "b:true" } else { "b:false" }),
            Self::Int(i) => out.push_str(&format!("i:{i}")),
            Self::Float(f) => out.push_str(&format!("f:{f:?}")),
            Self::String(s) => out.push_str(&format!("s:{s:?}")),
            Self::List(items) => {
                out.push('[');
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            Self::Set(items) => {
                let keys: BTreeSet<String> = items.iter().map(Value::canonical_key).collect();
                out.push('{');
                out.push_str(&keys.into_iter().collect::<Vec<_>>().join(","));
                out.push('}');
            }
            Self::Map(entries) => {
                out.push_str("m{");
                for (index, (k, v)) in entries.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    out.push_str(&format!("{k:?}:{v:?}"));
                }
                out.push('}');
            }
            Self::Block(attrs) => {
                out.push_str("r{");
                for (index, (name, value)) in attrs.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    out.push_str(name);
                    out.push('=');
                    value.write_canonical(out);
                }
                out.push('}');
            }
        }
    }

    /// Stable key of this value as a set element, used as its path segment
    pub fn set_hash(&self) -> String {
        let hash = blake3::hash(self.canonical_key().as_bytes());
        hash.to_hex().as_str()[..SET_HASH_LEN].to_string()
    }

    /// Child addressed by one path segment (list index, set hash, block field)
    fn child(&self, segment: &str) -> Option<Value> {
        match self {
            Self::List(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .cloned(),
            Self::Set(items) => items.iter().find(|v| v.set_hash() == segment).cloned(),
            Self::Map(entries) => entries.get(segment).cloned().map(Value::String),
            Self::Block(attrs) => attrs.get(segment).cloned(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => content_keys(a) == content_keys(b),
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Block(a), Self::Block(b)) => a == b,
            _ => false,
        }
    }
}

fn content_keys(items: &[Value]) -> BTreeSet<String> {
    items.iter().map(Value::canonical_key).collect()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => write!(f, "list({} items)", items.len()),
            Self::Set(items) => write!(f, "set({} items)", items.len()),
            Self::Map(entries) => write!(f, "map({} keys)", entries.len()),
            Self::Block(attrs) => write!(f, "block({} attributes)", attrs.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// Attribute values keyed by top-level attribute name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve a dotted path such as `network.0.address`
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?.clone();
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }
}

impl From<BTreeMap<String, Value>> for Attributes {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Attributes {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Join a parent path and a child segment
pub(crate) fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}
