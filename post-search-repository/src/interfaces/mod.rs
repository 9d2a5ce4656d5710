//! Interface definitions for the external collaborators.
//!
//! The sync layer only depends on these traits, which allows for
//! dependency injection and swappable backends.

mod index_status_store;
mod record_store;
mod search_engine_client;

pub use index_status_store::IndexStatusStore;
pub use record_store::RecordStore;
pub use search_engine_client::SearchEngineClient;
