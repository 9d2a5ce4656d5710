//! Entity identity and the searchable capability.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;

/// Identifier assigned by the record store when an entity is created.
///
/// The decimal rendering doubles as the search document id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

/// Capability implemented by every entity type that is mirrored into the
/// search index.
///
/// The set of searchable fields is fixed per type and must name attributes
/// the entity actually has.
pub trait Searchable {
    /// Default index the entity's documents live in.
    fn index_name() -> &'static str;

    /// The ordered set of attributes projected into the index.
    fn searchable_fields() -> &'static [&'static str];

    /// Current value of one attribute, or `None` if the entity has no such
    /// attribute.
    fn field_value(&self, field: &str) -> Option<Value>;

    /// Project the entity into a search document.
    ///
    /// The document holds exactly the searchable fields, in declaration
    /// order, with values copied verbatim. A declared field without a value
    /// is emitted as `null` so the key set never varies.
    fn to_document(&self) -> Document {
        let mut document = Document::new();
        for field in Self::searchable_fields() {
            document.insert(*field, self.field_value(field).unwrap_or(Value::Null));
        }
        document
    }
}

/// A persistent domain entity owned by a record store.
pub trait Entity: Searchable + Clone + Send + Sync + 'static {
    /// Attributes supplied when creating the entity.
    type NewAttributes: Clone + Send + Sync + 'static;

    /// Partial update; unset members leave the stored value untouched.
    type Changes: Clone + Send + Sync + 'static;

    fn id(&self) -> RecordId;

    /// Materialize a freshly inserted entity.
    fn from_attributes(id: RecordId, attributes: Self::NewAttributes) -> Self;

    /// Apply a partial update in place.
    fn apply_changes(&mut self, changes: Self::Changes);
}
