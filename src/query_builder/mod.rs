//! Query and mutation statement construction.
//!
//! Identifiers and modifiers come in; immutable, fully parameterized
//! [`QuerySpec`]s and [`MutationStatement`]s come out. User-controlled values
//! (item keys, parent keys, row values, filter arguments) are always bound as
//! `?` parameters, never concatenated into the statement text.

use serde_json::Value;

use crate::resource_uri::ResourceUri;
use crate::table_catalog::{ProjectionMap, TableCatalog};

pub use errors::QueryBuildError;
pub use to_sql::{SqlStatement, ToSql};

pub mod errors;
pub mod to_sql;

/// A WHERE fragment with its bound parameters. An empty clause means no
/// predicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub clause: String,
    pub params: Vec<Value>,
}

impl Predicate {
    pub fn new(clause: impl Into<String>, params: Vec<Value>) -> Self {
        Predicate {
            clause: clause.into(),
            params,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }

    /// AND this predicate with a caller-supplied filter; either side may be
    /// absent. Filter parameters bind after the scope parameters.
    fn and_filter(mut self, filter: Option<&str>, filter_args: &[Value]) -> Self {
        let filter = match filter {
            Some(f) if !f.is_empty() => f,
            _ => return self,
        };
        if self.clause.is_empty() {
            self.clause = filter.to_string();
        } else {
            self.clause = format!("({}) AND ({})", self.clause, filter);
        }
        self.params.extend(filter_args.iter().cloned());
        self
    }
}

/// A fully specified read. Immutable once built; consumed once by rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Base table or rendered INNER JOIN chain.
    pub tables: String,
    /// Expand-derived alias map, when expansion was requested.
    pub projection: Option<ProjectionMap>,
    /// Caller-requested output columns; `None` selects everything.
    pub columns: Option<Vec<String>>,
    pub predicate: Predicate,
    pub group_by: Option<String>,
    pub having: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<String>,
    pub distinct: bool,
}

/// Caller-side read arguments that accompany the identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadRequest<'a> {
    pub projection: Option<&'a [String]>,
    pub filter: Option<&'a str>,
    pub filter_args: &'a [Value],
    pub sort_order: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Insert => "insert",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    Insert { values: serde_json::Map<String, Value> },
    Update {
        values: serde_json::Map<String, Value>,
        predicate: Predicate,
    },
    Delete { predicate: Predicate },
}

/// A fully specified mutation, scoped to its target identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationStatement {
    pub uri: ResourceUri,
    pub table: String,
    pub op: MutationOp,
}

impl MutationStatement {
    pub fn kind(&self) -> MutationKind {
        match self.op {
            MutationOp::Insert { .. } => MutationKind::Insert,
            MutationOp::Update { .. } => MutationKind::Update,
            MutationOp::Delete { .. } => MutationKind::Delete,
        }
    }
}

/// Scope predicate for an identifier: `pk = ?` for an item, `parent_fk = ?`
/// for a parent-scoped collection, empty for a top-level collection.
fn scope_predicate(
    catalog: &TableCatalog,
    uri: &ResourceUri,
) -> Result<Predicate, QueryBuildError> {
    let base = catalog.relation_for(uri.base_relation())?;
    if let Some(key) = uri.item_key() {
        return Ok(Predicate::new(
            format!("{} = ?", base.primary_key),
            vec![Value::from(key)],
        ));
    }
    if let Some(parent) = uri.parent_scope() {
        let column = catalog.parent_column_for(base, &parent.relation);
        return Ok(Predicate::new(
            format!("{} = ?", column),
            vec![Value::from(parent.key)],
        ));
    }
    Ok(Predicate::default())
}

/// Build the read spec for an identifier.
///
/// Modifiers are copied verbatim: an absent modifier omits its clause, never
/// substitutes a default. `limit` is validated as a decimal integer because
/// it is rendered into the statement text rather than bound.
pub fn build_query(
    catalog: &TableCatalog,
    uri: &ResourceUri,
    projection_map: Option<ProjectionMap>,
    request: ReadRequest,
) -> Result<QuerySpec, QueryBuildError> {
    let modifiers = uri.modifiers();
    let base = catalog.relation_for(uri.base_relation())?;

    let tables = if modifiers.expand.is_empty() {
        base.table.clone()
    } else {
        catalog.join_clause_for(uri.base_relation(), &modifiers.expand)?
    };

    if modifiers.having.is_some() && modifiers.group_by.is_none() {
        return Err(QueryBuildError::HavingWithoutGroupBy {
            uri: uri.to_string(),
        });
    }
    if let Some(limit) = &modifiers.limit {
        if limit.is_empty() || !limit.bytes().all(|b| b.is_ascii_digit()) {
            return Err(QueryBuildError::InvalidLimit {
                value: limit.clone(),
                uri: uri.to_string(),
            });
        }
    }

    let predicate =
        scope_predicate(catalog, uri)?.and_filter(request.filter, request.filter_args);

    Ok(QuerySpec {
        tables,
        projection: projection_map,
        columns: request.projection.map(|cols| cols.to_vec()),
        predicate,
        group_by: modifiers.group_by.clone(),
        having: modifiers.having.clone(),
        order_by: request.sort_order.map(str::to_string),
        limit: modifiers.limit.clone(),
        distinct: modifiers.distinct,
    })
}

/// Build a mutation statement scoped to an identifier.
///
/// Insert only ever targets a collection; update and delete apply the
/// identifier's scope predicate (ANDed with any caller filter) as the WHERE
/// clause.
pub fn build_mutation(
    catalog: &TableCatalog,
    uri: &ResourceUri,
    values: Option<serde_json::Map<String, Value>>,
    kind: MutationKind,
    filter: Option<&str>,
    filter_args: &[Value],
) -> Result<MutationStatement, QueryBuildError> {
    let base = catalog.relation_for(uri.base_relation())?;
    let table = base.table.clone();

    let op = match kind {
        MutationKind::Insert => {
            if uri.is_item() {
                return Err(QueryBuildError::InvalidTargetForInsert {
                    uri: uri.to_string(),
                });
            }
            let values = values.unwrap_or_default();
            if values.is_empty() {
                return Err(QueryBuildError::EmptyValues {
                    kind: kind.as_str(),
                    relation: base.name.clone(),
                });
            }
            MutationOp::Insert { values }
        }
        MutationKind::Update => {
            let values = values.unwrap_or_default();
            if values.is_empty() {
                return Err(QueryBuildError::EmptyValues {
                    kind: kind.as_str(),
                    relation: base.name.clone(),
                });
            }
            let predicate = scope_predicate(catalog, uri)?.and_filter(filter, filter_args);
            MutationOp::Update { values, predicate }
        }
        MutationKind::Delete => {
            let predicate = scope_predicate(catalog, uri)?.and_filter(filter, filter_args);
            MutationOp::Delete { predicate }
        }
    };

    Ok(MutationStatement {
        uri: uri.clone(),
        table,
        op,
    })
}
