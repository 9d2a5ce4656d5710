//! # Post Search Shared
//!
//! Domain types shared by the record store adapters, the search engine
//! client and the sync layer: record identifiers, search documents, the
//! `Searchable` capability and the `Post` entity itself.

pub mod document;
pub mod entity;
pub mod post;
pub mod query;
pub mod status;

pub use document::Document;
pub use entity::{Entity, RecordId, Searchable};
pub use post::{NewPost, Post, PostChanges, POSTS_INDEX};
pub use query::{SearchHit, SearchQuery, SearchResponse, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use status::{IndexStatus, LedgerEntry, PendingOperation};
