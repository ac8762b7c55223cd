//! Row model shared by the position manager and every row store.
//!
//! Stored rows and in-flight rows both reduce their group membership to a
//! [`GroupValues`], which is the only thing filters and locks are built from.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary key of a sortable row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowKey {
    Int(i64),
    Text(String),
}

impl RowKey {
    /// True for keys that can never identify a stored row (`0`, empty text).
    pub fn is_blank(&self) -> bool {
        match self {
            RowKey::Int(n) => *n == 0,
            RowKey::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Int(n) => write!(f, "{}", n),
            RowKey::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RowKey {
    fn from(value: i64) -> Self {
        RowKey::Int(value)
    }
}

impl From<i32> for RowKey {
    fn from(value: i32) -> Self {
        RowKey::Int(value as i64)
    }
}

impl From<&str> for RowKey {
    fn from(value: &str) -> Self {
        RowKey::Text(value.to_string())
    }
}

impl From<String> for RowKey {
    fn from(value: String) -> Self {
        RowKey::Text(value)
    }
}

/// A column value as seen by group filters.
///
/// Only the shapes group columns realistically take are supported. `Null`
/// sorts first and equals only itself, so rows with a null group column form
/// their own group.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<&RowKey> for Value {
    fn from(key: &RowKey) -> Self {
        match key {
            RowKey::Int(n) => Value::Int(*n),
            RowKey::Text(s) => Value::Text(s.clone()),
        }
    }
}

/// Values of the configured group fields, in configuration order.
///
/// Two rows belong to the same group exactly when their `GroupValues` are
/// equal. An empty set means the whole collection is one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupValues(Vec<(String, Value)>);

impl GroupValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Later duplicates replace earlier ones.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.0.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.0.push((field, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(f, v)| (f.as_str(), v))
    }

    /// True when this set names exactly `fields` (in any order).
    pub fn covers_exactly(&self, fields: &[String]) -> bool {
        self.0.len() == fields.len() && fields.iter().all(|f| self.get(f).is_some())
    }

    /// Reorder to match `fields`, so equal groups compare equal regardless of
    /// the order callers supplied them in.
    pub fn normalized(&self, fields: &[String]) -> GroupValues {
        let mut out = GroupValues::new();
        for field in fields {
            if let Some(value) = self.get(field) {
                out.0.push((field.clone(), value.clone()));
            }
        }
        for (field, value) in &self.0 {
            if !fields.contains(field) {
                out.0.push((field.clone(), value.clone()));
            }
        }
        out
    }
}

impl fmt::Display for GroupValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(all)");
        }
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        f.write_str(&parts.join(","))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for GroupValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(GroupValues::new(), |acc, (k, v)| acc.with(k, v))
    }
}

/// A persisted row as returned by a row store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: RowKey,
    pub position: i64,
    /// Non-key, non-position columns the store loaded (at least the group fields).
    pub fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new(key: impl Into<RowKey>, position: i64) -> Self {
        Self {
            key: key.into(),
            position,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Group membership of this row. Missing columns read as `Null`.
    pub fn group(&self, group_fields: &[String]) -> GroupValues {
        group_fields
            .iter()
            .map(|f| (f.clone(), self.fields.get(f).cloned().unwrap_or_default()))
            .collect()
    }
}

/// A row about to be persisted for the first time.
///
/// Implemented by host payload types so the creation hook can read their
/// pending group values and inject the initial position.
pub trait Placeable {
    /// Key already assigned to the payload, if any. A present key means the
    /// payload is an update, not a creation.
    fn key(&self) -> Option<&RowKey>;

    /// Position explicitly supplied by the caller.
    fn position(&self) -> Option<i64>;

    fn set_position(&mut self, position: i64);

    /// Pending value of a group field, `None` when the payload lacks it.
    fn group_value(&self, field: &str) -> Option<Value>;
}

/// Plain in-flight row payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRow {
    pub key: Option<RowKey>,
    pub position: Option<i64>,
    pub fields: BTreeMap<String, Value>,
}

impl NewRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<RowKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }
}

impl Placeable for NewRow {
    fn key(&self) -> Option<&RowKey> {
        self.key.as_ref().filter(|k| !k.is_blank())
    }

    fn position(&self) -> Option<i64> {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = Some(position);
    }

    fn group_value(&self, field: &str) -> Option<Value> {
        self.fields.get(field).cloned()
    }
}
