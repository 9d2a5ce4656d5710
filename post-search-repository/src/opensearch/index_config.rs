//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for document indices.

use serde_json::{json, Map, Value};

/// Get the index settings and mappings for an index holding the given text fields.
///
/// Every searchable field is analysed as `text` for full-text matching and
/// carries a `raw` keyword sub-field for exact matches and sorting.
///
/// # Sharding Configuration
///
/// - 1 primary shard
/// - 1 replica for redundancy
pub fn get_index_settings(fields: &[&str]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        properties.insert(
            (*field).to_string(),
            json!({
                "type": "text",
                "fields": {
                    "raw": {
                        "type": "keyword",
                        "ignore_above": 256
                    }
                }
            }),
        );
    }

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": properties
        }
    })
}
