//! Search query and result types.

use serde::{Deserialize, Serialize};

use crate::entity::RecordId;

/// Page size used when a query does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest page a single query may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// A full-text query against one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free text entered by the caller.
    pub query: String,
    /// Document fields to match against, most important first.
    pub fields: Vec<String>,
    /// Offset of the first hit.
    pub from: usize,
    /// Maximum number of hits returned.
    pub size: usize,
}

impl SearchQuery {
    /// Create a query for the first page of results.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            fields: Vec::new(),
            from: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Restrict matching to the given fields.
    pub fn with_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// Select a page. The size is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Check that the query can be sent to the engine.
    pub fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("query text must not be empty".to_string());
        }
        Ok(())
    }

    /// The record id named by the query text, if the text is nothing else.
    pub fn as_record_id(&self) -> Option<RecordId> {
        self.query.parse().ok()
    }
}

/// A single search hit. Hits are references, not hydrated entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: RecordId,
    pub score: f64,
    pub snippet: Option<String>,
}

/// Hits for one query, ordered by relevance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// Total number of matching documents, across all pages.
    pub total: u64,
    /// Time the engine spent on the query.
    pub took_ms: u64,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record ids of the hits, in relevance order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.hits.iter().map(|hit| hit.id).collect()
    }
}
