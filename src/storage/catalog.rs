use std::collections::HashMap;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::core::{ColumnType, DbError, Result};
use crate::timeseries::TimeseriesSchema;
use super::{TableKind, TableSchema};

/// SQL-visible table bound to an analytical store of a timeseries table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTable {
    pub name: String,
    pub timeseries_table: String,
    pub analytical_store: String,
    pub columns: Vec<(String, ColumnType)>,
}

/// Schema registry: table schemas, timeseries definitions and mapping
/// tables.
///
/// Immutable once built; every change produces a new `Catalog` sharing the
/// untouched maps, so readers clone it cheaply and never block DDL.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: Arc<HashMap<String, TableSchema>>,
    timeseries: Arc<HashMap<String, TimeseriesSchema>>,
    mappings: Arc<HashMap<String, MappingTable>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table; fails if the name is taken.
    pub fn with_table(self, schema: TableSchema) -> Result<Self> {
        let name = schema.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(DbError::AlreadyExists("Requested table already exists.".into()));
        }
        let mut tables = (*self.tables).clone();
        tables.insert(name, schema);
        Ok(Self {
            tables: Arc::new(tables),
            ..self
        })
    }

    /// Replaces the schema of an existing table.
    pub fn with_table_schema(self, schema: TableSchema) -> Result<Self> {
        if !self.tables.contains_key(schema.name()) {
            return Err(DbError::table_not_found());
        }
        let mut tables = (*self.tables).clone();
        tables.insert(schema.name().to_string(), schema);
        Ok(Self {
            tables: Arc::new(tables),
            ..self
        })
    }

    pub fn without_table(self, name: &str) -> Result<Self> {
        if !self.tables.contains_key(name) {
            return Err(DbError::table_not_found());
        }
        let mut tables = (*self.tables).clone();
        tables.remove(name);
        let mut timeseries = (*self.timeseries).clone();
        timeseries.remove(name);
        Ok(Self {
            tables: Arc::new(tables),
            timeseries: Arc::new(timeseries),
            mappings: self.mappings,
        })
    }

    pub fn get_table(&self, name: &str) -> Result<&TableSchema> {
        self.tables.get(name).ok_or_else(DbError::table_not_found)
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Sorted names of tables of one kind.
    pub fn list_tables(&self, kind: TableKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .values()
            .filter(|t| t.kind == kind)
            .map(|t| t.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Base table owning the index `name`.
    pub fn index_owner(&self, name: &str) -> Option<&str> {
        self.tables
            .values()
            .find(|t| t.has_index(name))
            .map(|t| t.name())
    }

    /// Registers a timeseries definition; the backing table must already be
    /// in the catalog.
    pub fn with_timeseries(self, schema: TimeseriesSchema) -> Result<Self> {
        if !self.tables.contains_key(schema.name()) {
            return Err(DbError::table_not_found());
        }
        let mut timeseries = (*self.timeseries).clone();
        timeseries.insert(schema.name().to_string(), schema);
        Ok(Self {
            timeseries: Arc::new(timeseries),
            ..self
        })
    }

    pub fn get_timeseries(&self, name: &str) -> Result<&TimeseriesSchema> {
        self.timeseries.get(name).ok_or_else(DbError::table_not_found)
    }

    pub fn with_mapping(self, mapping: MappingTable) -> Result<Self> {
        if self.mappings.contains_key(&mapping.name) {
            return Err(DbError::AlreadyExists(format!(
                "Mapping table '{}' already exists.",
                mapping.name
            )));
        }
        let mut mappings = (*self.mappings).clone();
        mappings.insert(mapping.name.clone(), mapping);
        Ok(Self {
            mappings: Arc::new(mappings),
            ..self
        })
    }

    pub fn without_mapping(self, name: &str) -> Result<Self> {
        if !self.mappings.contains_key(name) {
            return Err(DbError::NotFound(format!("Mapping table '{}' does not exist.", name)));
        }
        let mut mappings = (*self.mappings).clone();
        mappings.remove(name);
        Ok(Self {
            mappings: Arc::new(mappings),
            ..self
        })
    }

    pub fn get_mapping(&self, name: &str) -> Option<&MappingTable> {
        self.mappings.get(name)
    }

    /// Mapping tables depending on a store, sorted by name.
    pub fn mappings_of(&self, table: &str, store: &str) -> Vec<&MappingTable> {
        let mut found: Vec<&MappingTable> = self
            .mappings
            .values()
            .filter(|m| m.timeseries_table == table && m.analytical_store == store)
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    pub fn list_mappings(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mappings.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{IndexMeta, PrimaryKeyType, TableMeta, TableOptions};

    fn schema(name: &str) -> TableSchema {
        TableSchema::new(
            TableMeta::new(name).with_primary_key("id", PrimaryKeyType::Integer),
            TableOptions::default(),
        )
    }

    #[test]
    fn test_copy_on_write() {
        let catalog = Catalog::new().with_table(schema("a")).unwrap();
        let old = catalog.clone();
        let catalog = catalog.with_table(schema("b")).unwrap();

        assert!(!old.table_exists("b"));
        assert_eq!(catalog.list_tables(TableKind::WideColumn), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_and_missing() {
        let catalog = Catalog::new().with_table(schema("a")).unwrap();
        let err = catalog.clone().with_table(schema("a")).unwrap_err();
        assert_eq!(err.code(), "OTSObjectAlreadyExist");
        let err = catalog.without_table("zzz").unwrap_err();
        assert_eq!(err.message(), "Requested table does not exist.");
    }

    #[test]
    fn test_index_owner() {
        let mut with_index = schema("orders");
        with_index.indexes.push(IndexMeta::new("orders_by_customer").with_primary_key("c"));
        let catalog = Catalog::new().with_table(with_index).unwrap();
        assert_eq!(catalog.index_owner("orders_by_customer"), Some("orders"));
        assert_eq!(catalog.index_owner("orders"), None);
    }
}
