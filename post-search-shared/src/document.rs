//! Search documents.
//!
//! A `Document` is the transient payload sent to the search engine. It is
//! derived from an entity and never stored on its own.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Ordered mapping from field name to value.
///
/// Fields keep the order in which they were inserted, so a document built
/// from the same entity state always serializes to the same JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Set a field, replacing an existing value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();

        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style variant of [`Document::insert`].
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Get the value of a field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(field, _)| field.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a document from a JSON object, such as an engine `_source`.
    /// Fields keep the order of the source object.
    ///
    /// Returns `None` if the value is not an object.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let fields = object
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Some(Self { fields })
    }

    /// Render the document as a JSON object.
    pub fn to_json(&self) -> Value {
        let map: serde_json::Map<String, Value> = self.fields.iter().cloned().collect();
        Value::Object(map)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
