//! SQL text rendering for query specs and mutation statements.
//!
//! All user-controlled values stay in the parameter list; the only modifier
//! rendered into the text is `limit`, which is validated as a decimal integer
//! at build time.

use serde_json::Value;

use super::errors::QueryBuildError;
use super::{MutationOp, MutationStatement, QuerySpec};

/// Parameterized statement text ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Render a spec or statement to parameterized SQL.
pub trait ToSql {
    fn to_sql(&self) -> Result<SqlStatement, QueryBuildError>;
}

impl ToSql for QuerySpec {
    fn to_sql(&self) -> Result<SqlStatement, QueryBuildError> {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.select_list());
        sql.push_str(" FROM ");
        sql.push_str(&self.tables);
        if !self.predicate.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.predicate.clause);
        }
        if let Some(group_by) = &self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
            if let Some(having) = &self.having {
                sql.push_str(" HAVING ");
                sql.push_str(having);
            }
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some(limit) = &self.limit {
            sql.push_str(" LIMIT ");
            sql.push_str(limit);
        }
        Ok(SqlStatement {
            sql,
            params: self.predicate.params.clone(),
        })
    }
}

impl QuerySpec {
    /// Output column list. Explicit caller columns are routed through the
    /// projection map when one exists; with no caller columns the map itself
    /// is the projection; with neither, select everything.
    fn select_list(&self) -> String {
        match (&self.columns, &self.projection) {
            (Some(columns), projection) => columns
                .iter()
                .map(|col| match projection.as_ref().and_then(|p| p.get(col)) {
                    Some(column_ref) => format!("{} AS {}", column_ref.qualified(), col),
                    None => col.clone(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            (None, Some(projection)) => projection
                .iter()
                .map(|(alias, column_ref)| format!("{} AS {}", column_ref.qualified(), alias))
                .collect::<Vec<_>>()
                .join(", "),
            (None, None) => "*".to_string(),
        }
    }
}

impl ToSql for MutationStatement {
    fn to_sql(&self) -> Result<SqlStatement, QueryBuildError> {
        match &self.op {
            MutationOp::Insert { values } => {
                let columns: Vec<&str> = values.keys().map(String::as_str).collect();
                let placeholders = vec!["?"; columns.len()].join(", ");
                Ok(SqlStatement {
                    sql: format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        self.table,
                        columns.join(", "),
                        placeholders
                    ),
                    params: values.values().cloned().collect(),
                })
            }
            MutationOp::Update { values, predicate } => {
                let assignments = values
                    .keys()
                    .map(|c| format!("{} = ?", c))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut sql = format!("UPDATE {} SET {}", self.table, assignments);
                let mut params: Vec<Value> = values.values().cloned().collect();
                if !predicate.is_empty() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&predicate.clause);
                    params.extend(predicate.params.iter().cloned());
                }
                Ok(SqlStatement { sql, params })
            }
            MutationOp::Delete { predicate } => {
                let mut sql = format!("DELETE FROM {}", self.table);
                let mut params = Vec::new();
                if !predicate.is_empty() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&predicate.clause);
                    params.extend(predicate.params.iter().cloned());
                }
                Ok(SqlStatement { sql, params })
            }
        }
    }
}
