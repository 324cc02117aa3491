use thiserror::Error;

use crate::query_builder::QueryBuildError;
use crate::resource_uri::ResourceUriError;
use crate::store::StoreError;
use crate::table_catalog::CatalogError;

/// Mutation outcomes the executor treats as failures.
///
/// Zero affected rows is an error, not a silent no-op: callers must handle
/// "nothing matched" explicitly. Compatibility policy; see DESIGN.md.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MutationError {
    #[error("Failed to insert row into `{uri}` (store returned row key {key})")]
    InsertFailed { uri: String, key: i64 },
    #[error("No matching row for {kind} on `{uri}` (predicate `{predicate}`)")]
    NoMatchingRow {
        kind: &'static str,
        uri: String,
        predicate: String,
    },
}

/// Everything a provider call can fail with, each kind inspectable on its
/// own. Nothing is downgraded to an empty result.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error(transparent)]
    Parse(#[from] ResourceUriError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    QueryBuild(#[from] QueryBuildError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error("Schema violation on `{relation}`: {detail}")]
    SchemaViolation { relation: String, detail: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Lift a store failure, turning schema violations into the dedicated
/// provider error so callers can tell them from operational failures.
pub(crate) fn map_store_error(err: StoreError, relation: &str) -> ProviderError {
    match err {
        StoreError::SchemaViolation(detail) => ProviderError::SchemaViolation {
            relation: relation.to_string(),
            detail,
        },
        other => ProviderError::Store(other),
    }
}
