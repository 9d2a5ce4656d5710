//! The `Post` entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{Entity, RecordId, Searchable};

/// Name of the index posts are mirrored into.
pub const POSTS_INDEX: &str = "posts";

const SEARCHABLE_FIELDS: &[&str] = &["name", "content"];

/// A blog post as stored in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: RecordId,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attributes for creating a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub name: String,
    pub content: String,
}

impl NewPost {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Partial update of a post.
///
/// Only fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostChanges {
    pub name: Option<String>,
    pub content: Option<String>,
}

impl PostChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name to update.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the content to update.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Check if any fields are set for update.
    pub fn has_changes(&self) -> bool {
        self.name.is_some() || self.content.is_some()
    }
}

impl Searchable for Post {
    fn index_name() -> &'static str {
        POSTS_INDEX
    }

    fn searchable_fields() -> &'static [&'static str] {
        SEARCHABLE_FIELDS
    }

    fn field_value(&self, field: &str) -> Option<Value> {
        match field {
            "name" => Some(Value::String(self.name.clone())),
            "content" => Some(Value::String(self.content.clone())),
            _ => None,
        }
    }
}

impl Entity for Post {
    type NewAttributes = NewPost;
    type Changes = PostChanges;

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_attributes(id: RecordId, attributes: NewPost) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: attributes.name,
            content: attributes.content,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_changes(&mut self, changes: PostChanges) {
        if !changes.has_changes() {
            return;
        }
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(content) = changes.content {
            self.content = content;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(id: i64, name: &str, content: &str) -> Post {
        Post::from_attributes(RecordId::new(id), NewPost::new(name, content))
    }

    #[test]
    fn test_document_contains_exactly_searchable_fields() {
        let doc = post(1, "Hello", "World").to_document();

        assert_eq!(doc.field_names().collect::<Vec<_>>(), vec!["name", "content"]);
        assert!(doc.get("id").is_none());
        assert!(doc.get("created_at").is_none());
        assert!(doc.get("updated_at").is_none());
    }

    #[test]
    fn test_document_copies_values_verbatim() {
        let doc = post(1, "  Hello ", "World\n").to_document();

        assert_eq!(doc.get("name"), Some(&json!("  Hello ")));
        assert_eq!(doc.get("content"), Some(&json!("World\n")));
        assert_eq!(doc.to_json(), json!({ "name": "  Hello ", "content": "World\n" }));
    }

    #[test]
    fn test_identical_attributes_produce_identical_documents() {
        let first = post(1, "Hello", "World");
        let second = post(2, "Hello", "World");

        assert_eq!(first.to_document(), second.to_document());
        assert_eq!(first.to_document(), first.to_document());
    }

    #[test]
    fn test_searchable_fields_are_post_attributes() {
        let p = post(1, "Hello", "World");
        for field in Post::searchable_fields() {
            assert!(p.field_value(field).is_some(), "{field} is not an attribute");
        }
        assert_eq!(Post::index_name(), "posts");
    }

    #[test]
    fn test_apply_changes_leaves_unset_fields() {
        let mut p = post(1, "Hello", "World");
        p.apply_changes(PostChanges::new().with_content("Rust"));

        assert_eq!(p.name, "Hello");
        assert_eq!(p.content, "Rust");
        assert!(p.updated_at >= p.created_at);
    }

    #[test]
    fn test_post_changes_builder() {
        let changes = PostChanges::new();
        assert!(!changes.has_changes());

        let changes = changes.with_name("New Name");
        assert!(changes.has_changes());
        assert_eq!(changes.name, Some("New Name".to_string()));
        assert!(changes.content.is_none());
    }
}
