//! The resource provider: the public query/insert/update/delete surface and
//! the transactional executor behind the mutating half.
//!
//! Every mutation runs begin -> execute -> commit or rollback; the
//! transaction is released on every exit path and change notification fires
//! synchronously after commit, never for a rolled-back transaction.

use std::sync::Arc;

use serde_json::Value;

use crate::notification::{ChangeSink, NotificationDispatcher};
use crate::query_builder::{
    build_mutation, build_query, MutationKind, MutationOp, MutationStatement, ReadRequest, ToSql,
};
use crate::resource_uri::{parse_resource_uri, ResourceUri};
use crate::store::{RelationalStore, Row, StoreTransaction};
use crate::table_catalog::TableCatalog;

pub use errors::{MutationError, ProviderError};

pub mod errors;
mod insert_helper;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderOptions {
    /// Threaded through to the change sink unchanged; the sink decides what
    /// propagation to a remote sync layer means.
    pub sync_to_network: bool,
}

/// Immutable snapshot of one read: the identifier it answered and its rows.
/// Not a subscription; attach an observer through
/// [`ResourceProvider::notifications`] to watch for changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub uri: ResourceUri,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of a committed mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationResult {
    /// Canonical identifier of the new row: the collection path with the
    /// generated key appended.
    Inserted(ResourceUri),
    Updated(u64),
    Deleted(u64),
}

pub struct ResourceProvider<S> {
    catalog: Arc<TableCatalog>,
    store: S,
    dispatcher: NotificationDispatcher,
}

impl<S: RelationalStore> ResourceProvider<S> {
    pub fn new(
        catalog: Arc<TableCatalog>,
        store: S,
        sink: Arc<dyn ChangeSink>,
        options: ProviderOptions,
    ) -> Self {
        ResourceProvider {
            catalog,
            store,
            dispatcher: NotificationDispatcher::new(sink, options.sync_to_network),
        }
    }

    pub fn catalog(&self) -> &TableCatalog {
        &self.catalog
    }

    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Read the rows an identifier addresses. Runs outside any explicit
    /// transaction; the store guarantees a point-in-time snapshot.
    pub async fn query(
        &self,
        raw_uri: &str,
        projection: Option<&[String]>,
        filter: Option<&str>,
        filter_args: &[Value],
        sort_order: Option<&str>,
    ) -> Result<ResultSet, ProviderError> {
        let uri = parse_resource_uri(raw_uri, &self.catalog)?;
        let expands = &uri.modifiers().expand;
        let projection_map = if expands.is_empty() {
            None
        } else {
            Some(self.catalog.projection_for(uri.base_relation(), expands)?)
        };
        let spec = build_query(
            &self.catalog,
            &uri,
            projection_map,
            ReadRequest {
                projection,
                filter,
                filter_args,
                sort_order,
            },
        )?;
        let stmt = spec.to_sql()?;
        log::debug!("query {}: {} {:?}", uri, stmt.sql, stmt.params);
        let rows = self.store.query(&stmt.sql, stmt.params).await?;
        Ok(ResultSet { uri, rows })
    }

    /// Insert a row into a collection; returns the canonical identifier of
    /// the new row.
    pub async fn insert(&self, raw_uri: &str, values: Row) -> Result<ResourceUri, ProviderError> {
        let uri = parse_resource_uri(raw_uri, &self.catalog)?;
        let stmt = build_mutation(
            &self.catalog,
            &uri,
            Some(values),
            MutationKind::Insert,
            None,
            &[],
        )?;
        match self.execute_mutation(stmt).await? {
            MutationResult::Inserted(new_uri) => Ok(new_uri),
            // The executor maps an insert statement to Inserted.
            _ => unreachable!("insert mutation produced a non-insert result"),
        }
    }

    /// Update the rows an identifier addresses; returns the affected count.
    pub async fn update(
        &self,
        raw_uri: &str,
        values: Row,
        filter: Option<&str>,
        filter_args: &[Value],
    ) -> Result<u64, ProviderError> {
        let uri = parse_resource_uri(raw_uri, &self.catalog)?;
        let stmt = build_mutation(
            &self.catalog,
            &uri,
            Some(values),
            MutationKind::Update,
            filter,
            filter_args,
        )?;
        match self.execute_mutation(stmt).await? {
            MutationResult::Updated(n) => Ok(n),
            _ => unreachable!("update mutation produced a non-update result"),
        }
    }

    /// Delete the rows an identifier addresses; returns the affected count.
    pub async fn delete(
        &self,
        raw_uri: &str,
        filter: Option<&str>,
        filter_args: &[Value],
    ) -> Result<u64, ProviderError> {
        let uri = parse_resource_uri(raw_uri, &self.catalog)?;
        let stmt = build_mutation(
            &self.catalog,
            &uri,
            None,
            MutationKind::Delete,
            filter,
            filter_args,
        )?;
        match self.execute_mutation(stmt).await? {
            MutationResult::Deleted(n) => Ok(n),
            _ => unreachable!("delete mutation produced a non-delete result"),
        }
    }

    /// Run one mutation as a single all-or-nothing transaction.
    ///
    /// The transaction is released on every path. Notification fires exactly
    /// once, synchronously, after a successful commit and before returning;
    /// a rolled-back mutation emits none.
    pub async fn execute_mutation(
        &self,
        stmt: MutationStatement,
    ) -> Result<MutationResult, ProviderError> {
        let kind = stmt.kind();
        let request_uri = stmt.uri.clone();
        let mut tx = self.store.begin().await?;

        let outcome = self.apply(&mut *tx, &stmt).await;
        match outcome {
            Ok(result) => {
                if let Err(commit_err) = tx.commit().await {
                    if let Err(rb) = tx.rollback().await {
                        log::warn!(
                            "rollback after failed commit of {} on {} also failed: {}",
                            kind.as_str(),
                            request_uri,
                            rb
                        );
                    }
                    return Err(errors::map_store_error(commit_err, &stmt.table));
                }
                let changed = match &result {
                    MutationResult::Inserted(new_uri) => new_uri.clone(),
                    MutationResult::Updated(_) | MutationResult::Deleted(_) => request_uri,
                };
                log::debug!("{} on {} committed", kind.as_str(), changed);
                self.dispatcher.notify(&changed);
                Ok(result)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    log::warn!(
                        "rollback after failed {} on {} also failed: {}",
                        kind.as_str(),
                        request_uri,
                        rb
                    );
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        tx: &mut dyn StoreTransaction,
        stmt: &MutationStatement,
    ) -> Result<MutationResult, ProviderError> {
        match &stmt.op {
            MutationOp::Insert { .. } => {
                let key = insert_helper::insert_row(tx, stmt).await?;
                if key > 0 {
                    Ok(MutationResult::Inserted(stmt.uri.with_appended_key(key)))
                } else {
                    Err(MutationError::InsertFailed {
                        uri: stmt.uri.to_string(),
                        key,
                    }
                    .into())
                }
            }
            MutationOp::Update { predicate, .. } | MutationOp::Delete { predicate } => {
                let sql = stmt.to_sql()?;
                log::debug!(
                    "{} on {}: {} {:?}",
                    stmt.kind().as_str(),
                    stmt.uri,
                    sql.sql,
                    sql.params
                );
                let affected = tx
                    .exec(&sql.sql, sql.params)
                    .await
                    .map_err(|e| errors::map_store_error(e, &stmt.table))?;
                if affected == 0 {
                    return Err(MutationError::NoMatchingRow {
                        kind: stmt.kind().as_str(),
                        uri: stmt.uri.to_string(),
                        predicate: predicate.clause.clone(),
                    }
                    .into());
                }
                match stmt.kind() {
                    MutationKind::Update => Ok(MutationResult::Updated(affected)),
                    _ => Ok(MutationResult::Deleted(affected)),
                }
            }
        }
    }
}
