//! Storage layer
//!
//! The SQLite metadata store and its schema. Document files themselves are
//! handled by [`crate::store`].

pub mod metadata;
pub mod schema;

pub use metadata::MetadataStore;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
