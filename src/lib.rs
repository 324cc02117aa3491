//! rowpath - Hierarchical resource addressing for relational stores
//!
//! This crate provides row and collection access over a relational backend through:
//! - Hierarchical resource identifiers (`albums/3/tracks?expand=artists`)
//! - A static table catalog with join-aware projection maps
//! - Fully parameterized SQL generation
//! - Transactional mutation with post-commit change notification

pub mod notification;
pub mod provider;
pub mod query_builder;
pub mod resource_uri;
pub mod store;
pub mod table_catalog;

pub use provider::{MutationResult, ProviderError, ProviderOptions, ResourceProvider, ResultSet};
pub use resource_uri::ResourceUri;
pub use table_catalog::TableCatalog;
