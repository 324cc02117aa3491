//! Physical single-row insert.
//!
//! The statement arrives with its relation already resolved; values are
//! passed through unfiltered, so an unknown column fails at the store
//! boundary and surfaces as a schema violation rather than being silently
//! stripped.

use super::errors::{map_store_error, ProviderError};
use crate::query_builder::{MutationStatement, ToSql};
use crate::store::StoreTransaction;

/// Run the insert inside the supplied transaction and return the generated
/// row key exactly as the store reported it, sentinel included. The caller
/// decides what a valid key is.
pub(crate) async fn insert_row(
    tx: &mut dyn StoreTransaction,
    stmt: &MutationStatement,
) -> Result<i64, ProviderError> {
    let sql = stmt.to_sql()?;
    log::debug!("insert into {}: {} {:?}", stmt.table, sql.sql, sql.params);
    tx.insert(&sql.sql, sql.params)
        .await
        .map_err(|e| map_store_error(e, &stmt.table))
}
