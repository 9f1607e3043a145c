//! Dynamic values: what the engine reads and what it produces.
//!
//! The shape mirrors `serde_json::Value` with two additions: an `Undefined`
//! marker for "key present, no value", and a type tag set carried by every
//! array and object. Container contents sit behind an `Arc`, so a clone shares
//! its content and [`Value::same`] can tell an untouched branch from a rebuilt
//! one.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value as JsonValue};

use crate::error::Result;
use crate::tags::TypeSet;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Array),
    Object(Object),
}

#[derive(Debug, Clone, Default)]
pub struct Array {
    items: Arc<Vec<Value>>,
    tags: TypeSet,
}

#[derive(Debug, Clone, Default)]
pub struct Object {
    fields: Arc<IndexMap<String, Value>>,
    tags: TypeSet,
}

// --------------------------------- Array ---------------------------------- //

impl Array {
    pub fn new(items: Vec<Value>) -> Self {
        Self { items: Arc::new(items), tags: TypeSet::new() }
    }

    pub(crate) fn with_tags(items: Vec<Value>, tags: TypeSet) -> Self {
        Self { items: Arc::new(items), tags }
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Copy-on-write replace; a shared content vector is cloned first.
    pub fn set(&mut self, index: usize, value: Value) {
        if let Some(slot) = Arc::make_mut(&mut self.items).get_mut(index) {
            *slot = value;
        }
    }

    pub fn push(&mut self, value: Value) {
        Arc::make_mut(&mut self.items).push(value);
    }

    pub fn tags(&self) -> &TypeSet {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TypeSet {
        &mut self.tags
    }

    pub fn same(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Array::new(iter.into_iter().collect())
    }
}

// --------------------------------- Object --------------------------------- //

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: IndexMap<String, Value>) -> Self {
        Self { fields: Arc::new(fields), tags: TypeSet::new() }
    }

    pub(crate) fn with_tags(fields: IndexMap<String, Value>, tags: TypeSet) -> Self {
        Self { fields: Arc::new(fields), tags }
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, String, Value> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy-on-write insert; an existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        Arc::make_mut(&mut self.fields).insert(key.into(), value);
    }

    pub fn tags(&self) -> &TypeSet {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TypeSet {
        &mut self.tags
    }

    pub fn same(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

impl FromIterator<(String, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Object::from_map(iter.into_iter().collect())
    }
}

// --------------------------------- Value ---------------------------------- //

impl Value {
    /// Parses JSON text. Never yields `Undefined`.
    pub fn from_json_str(src: &str) -> Result<Value> {
        let json: JsonValue = serde_json::from_str(src)?;
        Ok(Value::from(json))
    }

    /// Plain conversion: internal property names, no tag-driven renaming.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::from(self)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Field lookup on objects; `None` for anything else.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|o| o.get(key))
    }

    /// Identity: shared content for containers, equality for scalars.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => a.same(b),
            (Value::Object(a), Value::Object(b)) => a.same(b),
            (Value::Array(_), _) | (Value::Object(_), _) => false,
            (a, b) => a == b,
        }
    }
}

/// Deep data equality; type tags are ignored.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.same(b) || a.items() == b.items(),
            (Value::Object(a), Value::Object(b)) => a.same(b) || a.fields() == b.fields(),
            _ => false,
        }
    }
}

// ----------------------------- JSON conversion ---------------------------- //

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Number(n),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(xs) => Value::Array(xs.into_iter().map(Value::from).collect()),
            JsonValue::Object(m) => {
                Value::Object(m.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for JsonValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Undefined | Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => JsonValue::Number(n.clone()),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Array(a) => JsonValue::Array(a.iter().map(JsonValue::from).collect()),
            Value::Object(o) => JsonValue::Object(
                o.iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), JsonValue::from(v)))
                    .collect(),
            ),
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

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

/// Non-finite floats become `null`, as in JSON.
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Array::new(items))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(a) => serializer.collect_seq(a.iter()),
            Value::Object(o) => serializer.collect_map(o.iter().filter(|(_, v)| !v.is_undefined())),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Value::from)
    }
}
