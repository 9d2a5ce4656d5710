//! OpenSearch query builders.
//!
//! This module provides functions to build OpenSearch request bodies from a
//! `SearchQuery`.

use serde_json::{json, Map, Value};

use post_search_shared::{RecordId, SearchQuery};

/// Boost applied to the first (most important) field.
const PRIMARY_FIELD_BOOST: f64 = 1.5;

/// Boost for the document whose id equals the query text.
const ID_MATCH_BOOST: f64 = 10.0;

/// Maximum length of a highlight fragment.
const SNIPPET_FRAGMENT_SIZE: usize = 150;

/// Build an OpenSearch search body from a SearchQuery.
///
/// The query builder handles:
/// - Fuzzy `multi_match` over the query fields with the first field boosted
/// - `match_phrase_prefix` on the first field for strong prefix matching
/// - An extra `ids` clause when the text is a record id, so the record
///   itself ranks first while text matches on the same number still count
/// - Highlighting for snippets
/// - `from`/`size` paging
pub fn build_search_query(query: &SearchQuery) -> Value {
    let mut body = build_text_query(&query.query, &query.fields, query.as_record_id());

    body["from"] = json!(query.from);
    body["size"] = json!(query.size);
    body
}

/// Build the full-text query with highlighting.
fn build_text_query(query_text: &str, fields: &[String], record_id: Option<RecordId>) -> Value {
    let mut should = vec![json!({
        // Fuzzy text match to tolerate minor typos
        // AUTO fuzziness allows variable edits based on query length:
        // 1-2 chars: 0 edits, 3-4 chars: 1 edit, 5+ chars: 2 edits
        "multi_match": {
            "query": query_text,
            "fields": boosted_fields(fields),
            "fuzziness": "AUTO"
        }
    })];

    if let Some(primary) = fields.first() {
        // Strongly boost documents where the primary field starts with the query text
        should.push(json!({
            "match_phrase_prefix": {
                primary.as_str(): {
                    "query": query_text,
                    "boost": 2.0
                }
            }
        }));
    }

    if let Some(id) = record_id {
        should.push(json!({
            "ids": {
                "values": [id.to_string()],
                "boost": ID_MATCH_BOOST
            }
        }));
    }

    json!({
        "query": {
            "bool": {
                "should": should,
                "minimum_should_match": 1
            }
        },
        "highlight": build_highlight(fields)
    })
}

/// Field list for `multi_match`; all fields when none are given.
fn boosted_fields(fields: &[String]) -> Vec<String> {
    if fields.is_empty() {
        return vec!["*".to_string()];
    }

    fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            if i == 0 {
                format!("{}^{}", field, PRIMARY_FIELD_BOOST)
            } else {
                field.clone()
            }
        })
        .collect()
}

fn build_highlight(fields: &[String]) -> Value {
    let mut highlight_fields = Map::new();
    let names: Vec<&str> = if fields.is_empty() {
        vec!["*"]
    } else {
        fields.iter().map(String::as_str).collect()
    };

    for name in names {
        highlight_fields.insert(
            name.to_string(),
            json!({
                "fragment_size": SNIPPET_FRAGMENT_SIZE,
                "number_of_fragments": 1
            }),
        );
    }

    json!({
        "pre_tags": ["<em>"],
        "post_tags": ["</em>"],
        "fields": highlight_fields
    })
}
