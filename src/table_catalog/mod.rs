//! Static relation catalog: path-segment to table resolution, expand join
//! chains, and merged projection maps.
//!
//! The catalog is built once from an explicit [`CatalogConfig`] and is
//! read-only afterwards. Query building borrows it; nothing mutates it at
//! runtime.

use std::collections::HashMap;

pub use config::{CatalogConfig, RelationConfig, DEFAULT_PRIMARY_KEY};
pub use errors::CatalogError;

pub mod config;
pub mod errors;

/// A fully qualified physical column, the value side of a projection map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Alias -> physical column mapping for a read with expand joins.
///
/// Insertion order is preserved so generated SELECT lists are deterministic.
/// Inserting an existing alias overwrites the mapping in place: when expand
/// relations share column names with the base (or each other), the later
/// expand wins. That shadow rule is deliberate, not a collision error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionMap {
    entries: Vec<(String, ColumnRef)>,
    index: HashMap<String, usize>,
}

impl ProjectionMap {
    pub fn insert(&mut self, alias: impl Into<String>, column: ColumnRef) {
        let alias = alias.into();
        match self.index.get(&alias) {
            Some(&i) => self.entries[i].1 = column,
            None => {
                self.index.insert(alias.clone(), self.entries.len());
                self.entries.push((alias, column));
            }
        }
    }

    pub fn get(&self, alias: &str) -> Option<&ColumnRef> {
        self.index.get(alias).map(|&i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnRef)> {
        self.entries.iter().map(|(a, c)| (a.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolved schema of one registered relation.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSchema {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub columns: Vec<String>,
    /// relation name -> foreign-key column in this relation's table.
    pub references: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct TableCatalog {
    relations: HashMap<String, RelationSchema>,
}

impl TableCatalog {
    /// Build the catalog from a validated configuration.
    pub fn from_config(config: CatalogConfig) -> Result<Self, CatalogError> {
        config.validate()?;
        let mut relations = HashMap::with_capacity(config.relations.len());
        for rc in config.relations {
            let table = rc.table.unwrap_or_else(|| rc.name.clone());
            relations.insert(
                rc.name.clone(),
                RelationSchema {
                    name: rc.name,
                    table,
                    primary_key: rc.primary_key,
                    columns: rc.columns,
                    references: rc.references,
                },
            );
        }
        Ok(TableCatalog { relations })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, CatalogError> {
        Self::from_config(CatalogConfig::from_yaml_str(content)?)
    }

    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, CatalogError> {
        Self::from_config(CatalogConfig::from_yaml_file(path)?)
    }

    pub fn contains(&self, segment: &str) -> bool {
        self.relations.contains_key(segment)
    }

    pub fn relation_for(&self, segment: &str) -> Result<&RelationSchema, CatalogError> {
        self.relations
            .get(segment)
            .ok_or_else(|| CatalogError::UnknownRelation {
                segment: segment.to_string(),
            })
    }

    /// Merged alias map for `base` expanded with `expands`, in request order.
    /// Base columns come first; each expand's columns follow and shadow any
    /// earlier alias of the same name.
    pub fn projection_for(
        &self,
        base: &str,
        expands: &[String],
    ) -> Result<ProjectionMap, CatalogError> {
        let base_schema = self.relation_for(base)?;
        let mut map = ProjectionMap::default();
        for column in &base_schema.columns {
            map.insert(
                column.clone(),
                ColumnRef {
                    table: base_schema.table.clone(),
                    column: column.clone(),
                },
            );
        }
        for expand in expands {
            let expand_schema = self.expand_target(base_schema, expand)?;
            for column in &expand_schema.columns {
                map.insert(
                    column.clone(),
                    ColumnRef {
                        table: expand_schema.table.clone(),
                        column: column.clone(),
                    },
                );
            }
        }
        Ok(map)
    }

    /// INNER JOIN chain for `base` expanded with `expands`, in request order:
    /// `base INNER JOIN e ON (base.fk = e.pk) INNER JOIN ...`.
    pub fn join_clause_for(
        &self,
        base: &str,
        expands: &[String],
    ) -> Result<String, CatalogError> {
        let base_schema = self.relation_for(base)?;
        let mut tables = base_schema.table.clone();
        for expand in expands {
            let expand_schema = self.expand_target(base_schema, expand)?;
            let fk = &base_schema.references[expand];
            tables.push_str(&format!(
                " INNER JOIN {} ON ({}.{} = {}.{})",
                expand_schema.table,
                base_schema.table,
                fk,
                expand_schema.table,
                expand_schema.primary_key
            ));
        }
        Ok(tables)
    }

    /// Foreign-key column scoping `base` rows under a `parent` item. A
    /// declared reference wins; otherwise the column is derived mechanically
    /// as `singular(parent)_id`, so `albums/3/tracks` scopes on `album_id`
    /// without explicit configuration.
    pub fn parent_column_for(&self, base: &RelationSchema, parent: &str) -> String {
        match base.references.get(parent) {
            Some(fk) => fk.clone(),
            None => format!("{}_id", singular(parent)),
        }
    }

    fn expand_target(
        &self,
        base: &RelationSchema,
        expand: &str,
    ) -> Result<&RelationSchema, CatalogError> {
        if !base.references.contains_key(expand) {
            return Err(CatalogError::UnknownExpand {
                base: base.name.clone(),
                expand: expand.to_string(),
            });
        }
        self.relation_for(expand)
    }
}

/// Naive singularization: strip one trailing `s`. Only used to derive
/// parent columns from collection names; declare a reference for anything
/// irregular.
fn singular(name: &str) -> &str {
    match name.strip_suffix('s') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => name,
    }
}
