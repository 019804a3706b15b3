//! Catalog registry with cached embeddings and semantic search

pub mod service;
pub mod types;

pub use service::{CatalogRegistry, SearchParams};
pub use types::{DiscoveryMatch, ServerEntry, TransportSpec};
