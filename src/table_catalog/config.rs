//! Catalog configuration loading.
//!
//! Relation catalogs are defined in YAML with the following structure:
//!
//! ```yaml
//! name: music_store          # Configuration name (optional)
//! relations:
//!   - name: tracks           # Path segment that addresses this relation
//!     table: tracks          # Physical table (defaults to the name)
//!     primary_key: _id       # Generated-key column (defaults to _id)
//!     columns: [_id, title, album_id, artist_id]
//!     references:            # Join columns to related relations; used for
//!       albums: album_id     # expand joins and parent scoping
//!       artists: artist_id
//! ```
//!
//! Configurations are loaded once at startup and handed to [`super::TableCatalog`];
//! there is no ambient global registry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::errors::CatalogError;

pub const DEFAULT_PRIMARY_KEY: &str = "_id";

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub relations: Vec<RelationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationConfig {
    /// Path segment addressing this relation.
    pub name: String,
    /// Physical table name; defaults to `name`.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub columns: Vec<String>,
    /// relation name -> foreign-key column in *this* relation's table.
    #[serde(default)]
    pub references: HashMap<String, String>,
}

impl CatalogConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, CatalogError> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| CatalogError::ConfigParseError {
                error: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|e| CatalogError::ConfigReadError {
            error: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Structural validation: names are non-empty and unique, the primary key
    /// appears in the column list, and every declared reference points at a
    /// registered relation.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.relations.is_empty() {
            return Err(CatalogError::invalid("no relations declared"));
        }
        let names: Vec<&str> = self.relations.iter().map(|r| r.name.as_str()).collect();
        for relation in &self.relations {
            if relation.name.is_empty() {
                return Err(CatalogError::invalid("relation with empty name"));
            }
            if names.iter().filter(|n| **n == relation.name).count() > 1 {
                return Err(CatalogError::invalid(format!(
                    "relation `{}` declared more than once",
                    relation.name
                )));
            }
            if relation.columns.is_empty() {
                return Err(CatalogError::invalid(format!(
                    "relation `{}` declares no columns",
                    relation.name
                )));
            }
            if !relation.columns.contains(&relation.primary_key) {
                return Err(CatalogError::invalid(format!(
                    "primary key `{}` of relation `{}` is not in its column list",
                    relation.primary_key, relation.name
                )));
            }
            for (target, fk_column) in &relation.references {
                if !names.contains(&target.as_str()) {
                    return Err(CatalogError::invalid(format!(
                        "relation `{}` references unknown relation `{}`",
                        relation.name, target
                    )));
                }
                if !relation.columns.contains(fk_column) {
                    return Err(CatalogError::invalid(format!(
                        "join column `{}` of relation `{}` is not in its column list",
                        fk_column, relation.name
                    )));
                }
            }
        }
        Ok(())
    }
}
