use thiserror::Error;

use crate::table_catalog::CatalogError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryBuildError {
    #[error("Insert targets a collection, but `{uri}` addresses a single item")]
    InvalidTargetForInsert { uri: String },
    #[error("`having` modifier on `{uri}` requires a `groupBy` modifier")]
    HavingWithoutGroupBy { uri: String },
    #[error("Invalid `limit` value `{value}` on `{uri}` (must be a decimal integer)")]
    InvalidLimit { value: String, uri: String },
    #[error("No values supplied for {kind} into `{relation}`")]
    EmptyValues { kind: &'static str, relation: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
