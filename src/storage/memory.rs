use super::{Table, TableSchema};
use crate::core::{DbError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Table data, one lock per table.
///
/// The outer lock only guards the name → handle map and is held for the
/// duration of a lookup; row work happens on the per-table lock.
pub struct InMemoryStorage {
    tables: RwLock<HashMap<String, Arc<RwLock<Table>>>>,
    max_column_name_bytes: usize,
}

impl InMemoryStorage {
    pub fn new(max_column_name_bytes: usize) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            max_column_name_bytes,
        }
    }

    pub async fn create_table(&self, schema: TableSchema) -> Result<Arc<RwLock<Table>>> {
        let name = schema.name().to_string();
        let mut tables = self.tables.write().await;
        if tables.contains_key(&name) {
            return Err(DbError::AlreadyExists("Requested table already exists.".into()));
        }
        let table = Arc::new(RwLock::new(Table::new(schema, self.max_column_name_bytes)));
        tables.insert(name, Arc::clone(&table));
        Ok(table)
    }

    pub async fn drop_table(&self, name: &str) -> Result<()> {
        if self.tables.write().await.remove(name).is_none() {
            return Err(DbError::table_not_found());
        }
        Ok(())
    }

    /// Handle to a table for concurrent access.
    pub async fn get_table(&self, name: &str) -> Result<Arc<RwLock<Table>>> {
        self.tables
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(DbError::table_not_found)
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        self.tables.read().await.contains_key(name)
    }

    pub async fn list_tables(&self) -> Vec<String> {
        self.tables.read().await.keys().cloned().collect()
    }

    pub async fn clear(&self) {
        self.tables.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PrimaryKeyType, TableMeta, TableOptions};

    #[tokio::test]
    async fn test_create_get_drop() {
        let storage = InMemoryStorage::new(255);
        let schema = TableSchema::new(
            TableMeta::new("t").with_primary_key("id", PrimaryKeyType::Integer),
            TableOptions::default(),
        );
        storage.create_table(schema.clone()).await.unwrap();
        assert!(storage.create_table(schema).await.is_err());
        assert!(storage.table_exists("t").await);

        let handle = storage.get_table("t").await.unwrap();
        assert_eq!(handle.read().await.schema().name(), "t");

        storage.drop_table("t").await.unwrap();
        let err = storage.get_table("t").await.unwrap_err();
        assert_eq!(err.code(), "OTSObjectNotExist");
    }
}
