//! In-memory store double.
//!
//! This is not a SQL engine: it recognizes exactly the parameterized
//! statement shapes the query builder emits (single-table INSERT/UPDATE/
//! DELETE/SELECT with an optional single-equality WHERE) and keeps real
//! transactional state so commit/rollback behavior is observable.

use async_trait::async_trait;
use rowpath::store::{RelationalStore, Row, StoreError, StoreTransaction};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
struct TableData {
    columns: Vec<String>,
    rows: Vec<Row>,
    next_key: i64,
}

#[derive(Debug, Clone, Default)]
struct FakeState {
    tables: HashMap<String, TableData>,
}

#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<FakeState>>,
    fail_next_insert: Arc<Mutex<bool>>,
}

impl FakeStore {
    pub fn new() -> Self {
        FakeStore::default()
    }

    pub fn create_table(&self, name: &str, columns: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.tables.insert(
            name.to_string(),
            TableData {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
                next_key: 1,
            },
        );
    }

    pub fn seed_row(&self, table: &str, row: Row) {
        let mut state = self.state.lock().unwrap();
        let data = state.tables.get_mut(table).expect("unknown table");
        if let Some(key) = row.get("_id").and_then(Value::as_i64) {
            data.next_key = data.next_key.max(key + 1);
        }
        data.rows.push(row);
    }

    /// Make the next transaction-scoped insert report the -1 sentinel
    /// without touching any state.
    pub fn fail_next_insert(&self) {
        *self.fail_next_insert.lock().unwrap() = true;
    }

    /// Committed rows per table, for state-unchanged assertions.
    pub fn snapshot(&self) -> HashMap<String, Vec<Row>> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .iter()
            .map(|(name, data)| (name.clone(), data.rows.clone()))
            .collect()
    }
}

#[async_trait]
impl RelationalStore for FakeStore {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, StoreError> {
        let state = self.state.lock().unwrap();
        run_select(&state, sql, &params)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let working = self.state.lock().unwrap().clone();
        Ok(Box::new(FakeTransaction {
            shared: self.state.clone(),
            working,
            fail_next_insert: self.fail_next_insert.clone(),
            open: true,
        }))
    }
}

struct FakeTransaction {
    shared: Arc<Mutex<FakeState>>,
    working: FakeState,
    fail_next_insert: Arc<Mutex<bool>>,
    open: bool,
}

#[async_trait]
impl StoreTransaction for FakeTransaction {
    async fn insert(&mut self, sql: &str, params: Vec<Value>) -> Result<i64, StoreError> {
        {
            let mut flag = self.fail_next_insert.lock().unwrap();
            if *flag {
                *flag = false;
                return Ok(-1);
            }
        }
        let (table, columns) = parse_insert(sql)?;
        let data = table_mut(&mut self.working, &table)?;
        for column in &columns {
            if !data.columns.contains(column) {
                return Err(StoreError::SchemaViolation(format!(
                    "no such column: {}.{}",
                    table, column
                )));
            }
        }
        let key = data.next_key;
        data.next_key += 1;
        let mut row = Row::new();
        row.insert("_id".to_string(), Value::from(key));
        for (column, value) in columns.iter().zip(params) {
            row.insert(column.clone(), value);
        }
        data.rows.push(row);
        Ok(key)
    }

    async fn exec(&mut self, sql: &str, params: Vec<Value>) -> Result<u64, StoreError> {
        if let Some(rest) = sql.strip_prefix("UPDATE ") {
            let (table, rest) = split_once(rest, " SET ")?;
            let (assignments, where_clause) = match rest.split_once(" WHERE ") {
                Some((a, w)) => (a, Some(w)),
                None => (rest, None),
            };
            let columns: Vec<String> = assignments
                .split(", ")
                .map(|a| a.trim_end_matches(" = ?").to_string())
                .collect();
            let data = table_mut(&mut self.working, table)?;
            for column in &columns {
                if !data.columns.contains(column) {
                    return Err(StoreError::SchemaViolation(format!(
                        "no such column: {}.{}",
                        table, column
                    )));
                }
            }
            let (values, where_params) = params.split_at(columns.len());
            let matcher = where_matcher(where_clause, where_params)?;
            let mut affected = 0;
            for row in data.rows.iter_mut() {
                if !matcher(row) {
                    continue;
                }
                for (column, value) in columns.iter().zip(values) {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
            Ok(affected)
        } else if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
            let (table, where_clause) = match rest.split_once(" WHERE ") {
                Some((t, w)) => (t, Some(w)),
                None => (rest, None),
            };
            let data = table_mut(&mut self.working, table)?;
            let matcher = where_matcher(where_clause, &params)?;
            let before = data.rows.len();
            data.rows.retain(|r| !matcher(r));
            Ok((before - data.rows.len()) as u64)
        } else {
            Err(StoreError::Execution(format!(
                "unsupported statement: {}",
                sql
            )))
        }
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        if !self.open {
            return Err(StoreError::Transaction("transaction already closed".into()));
        }
        *self.shared.lock().unwrap() = self.working.clone();
        self.open = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.open {
            return Err(StoreError::Transaction("transaction already closed".into()));
        }
        self.open = false;
        Ok(())
    }
}

fn run_select(state: &FakeState, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
    let rest = sql
        .strip_prefix("SELECT * FROM ")
        .ok_or_else(|| StoreError::Execution(format!("unsupported statement: {}", sql)))?;
    let (table, where_clause) = match rest.split_once(" WHERE ") {
        Some((t, w)) => (t, Some(w)),
        None => (rest, None),
    };
    let data = state
        .tables
        .get(table)
        .ok_or_else(|| StoreError::SchemaViolation(format!("no such table: {}", table)))?;
    let matcher = where_matcher(where_clause, params)?;
    Ok(data.rows.iter().filter(|r| matcher(r)).cloned().collect())
}

/// Supports the single-equality predicate the builder emits for item and
/// parent-scoped identifiers: `col = ?`.
fn where_matcher<'a>(
    clause: Option<&str>,
    params: &'a [Value],
) -> Result<Box<dyn Fn(&Row) -> bool + 'a>, StoreError> {
    match clause {
        None => Ok(Box::new(|_| true)),
        Some(clause) => {
            let column = clause
                .strip_suffix(" = ?")
                .ok_or_else(|| {
                    StoreError::Execution(format!("unsupported predicate: {}", clause))
                })?
                .to_string();
            let expected = params
                .first()
                .cloned()
                .ok_or_else(|| StoreError::Execution("missing bind parameter".into()))?;
            Ok(Box::new(move |row: &Row| row.get(&column) == Some(&expected)))
        }
    }
}

fn parse_insert(sql: &str) -> Result<(String, Vec<String>), StoreError> {
    let rest = sql
        .strip_prefix("INSERT INTO ")
        .ok_or_else(|| StoreError::Execution(format!("unsupported statement: {}", sql)))?;
    let (table, rest) = split_once(rest, " (")?;
    let (columns, _) = split_once(rest, ") VALUES ")?;
    Ok((
        table.to_string(),
        columns.split(", ").map(str::to_string).collect(),
    ))
}

fn split_once<'a>(input: &'a str, sep: &str) -> Result<(&'a str, &'a str), StoreError> {
    input
        .split_once(sep)
        .ok_or_else(|| StoreError::Execution(format!("unsupported statement near `{}`", input)))
}

fn table_mut<'a>(state: &'a mut FakeState, table: &str) -> Result<&'a mut TableData, StoreError> {
    state
        .tables
        .get_mut(table)
        .ok_or_else(|| StoreError::SchemaViolation(format!("no such table: {}", table)))
}
