use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use log::{debug, info};
use regex::Regex;
use tokio::sync::RwLock;
use crate::config::StoreConfig;
use crate::core::{DbError, IndexMeta, Result, TableMeta, TableOptions, now_millis};
use crate::executor::{
    CreateTableExecutor, DropTableExecutor, ExecutionContext, ExecutorPipeline, ShowTablesExecutor,
};
use crate::parser::SqlParserAdapter;
use crate::result::QueryResult;
use crate::storage::index::{validate_defined_columns, validate_index_shape};
use crate::storage::{
    Catalog, InMemoryStorage, IndexTable, StreamSpec, Table, TableKind, TableSchema,
};
use crate::timeseries::MetaStore;
use super::requests::{CreateTableRequest, DescribeTableResponse, StreamDetails, UpdateTableRequest};

const MAX_STREAM_EXPIRATION_HOURS: i64 = 168;

/// In-process wide-column store.
///
/// One value owns every table, index, stream and timeseries registry; share
/// it behind an `Arc`. DDL serializes on the catalog lock, row operations
/// only take the lock of the table they touch.
pub struct WideColumnDB {
    pub(crate) config: StoreConfig,
    parser: SqlParserAdapter,
    pub(crate) storage: InMemoryStorage,
    pub(crate) catalog: RwLock<Catalog>,
    pub(crate) meta_stores: RwLock<HashMap<String, Arc<RwLock<MetaStore>>>>,
    executor_pipeline: ExecutorPipeline,
    name_pattern: Regex,
    closed: AtomicBool,
}

impl WideColumnDB {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let mut pipeline = ExecutorPipeline::new();
        pipeline.register(Box::new(CreateTableExecutor));
        pipeline.register(Box::new(DropTableExecutor));
        pipeline.register(Box::new(ShowTablesExecutor));

        let name_pattern = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| DbError::invalid(e.to_string()))?;

        Ok(Self {
            parser: SqlParserAdapter::new()?,
            storage: InMemoryStorage::new(config.max_column_name_bytes),
            catalog: RwLock::new(Catalog::new()),
            meta_stores: RwLock::new(HashMap::new()),
            executor_pipeline: pipeline,
            name_pattern,
            closed: AtomicBool::new(false),
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Drops every table and rejects all later calls with `Unavailable`.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut catalog = self.catalog.write().await;
        self.storage.clear().await;
        self.meta_stores.write().await.clear();
        *catalog = Catalog::new();
        info!("store shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(DbError::Unavailable("The store has been shut down.".into()));
        }
        Ok(())
    }

    /// Runs one statement of the mapping-table SQL bridge.
    pub async fn execute_sql(&self, sql: &str) -> Result<QueryResult> {
        self.ensure_open()?;
        let statements = self.parser.parse(sql)?;
        let [stmt] = statements.as_slice() else {
            return Err(DbError::ParseError("Expected exactly one statement".into()));
        };

        let ctx = ExecutionContext::new(&self.catalog);
        self.executor_pipeline.execute(stmt, &ctx).await
    }

    pub async fn create_table(&self, request: CreateTableRequest) -> Result<()> {
        self.ensure_open()?;
        let CreateTableRequest {
            meta,
            options,
            indexes,
            stream_spec,
        } = request;

        self.validate_table_meta(&meta)?;
        validate_options(&options)?;
        let expiration = self.stream_expiration(stream_spec.as_ref())?;

        let mut index_tables = Vec::with_capacity(indexes.len());
        for (i, index) in indexes.iter().enumerate() {
            validate_index_shape(index, &meta, i, &self.config)?;
            self.validate_name("index", &index.name)?;
            if index.name == meta.name || indexes[..i].iter().any(|o| o.name == index.name) {
                return Err(index_exists(&index.name));
            }
            index_tables.push(IndexTable::new(index.clone(), &meta)?);
        }

        let mut catalog = self.catalog.write().await;
        if catalog.table_exists(&meta.name) || catalog.index_owner(&meta.name).is_some() {
            return Err(DbError::AlreadyExists("Requested table already exists.".into()));
        }
        if let Some(index) = indexes
            .iter()
            .find(|i| catalog.table_exists(&i.name) || catalog.index_owner(&i.name).is_some())
        {
            return Err(index_exists(&index.name));
        }

        let now = now_millis();
        let name = meta.name.clone();
        let handle = self.storage.create_table(TableSchema::new(meta, options)).await?;
        let schema = {
            let mut table = handle.write().await;
            for index in index_tables {
                table.add_index(index, false, now);
            }
            if let Some(hours) = expiration {
                table.enable_stream(hours, now);
            }
            table.schema().clone()
        };
        *catalog = catalog.clone().with_table(schema)?;

        info!("created table {} with {} index(es)", name, indexes.len());
        Ok(())
    }

    pub async fn create_index(
        &self,
        table_name: &str,
        index: IndexMeta,
        include_base_data: bool,
    ) -> Result<()> {
        self.ensure_open()?;
        let mut catalog = self.catalog.write().await;
        let schema = catalog.get_table(table_name)?.clone();
        if schema.kind == TableKind::Timeseries {
            return Err(DbError::invalid("Timeseries tables do not support secondary indexes."));
        }

        validate_index_shape(&index, &schema.meta, schema.indexes.len(), &self.config)?;
        self.validate_name("index", &index.name)?;
        if catalog.table_exists(&index.name) || catalog.index_owner(&index.name).is_some() {
            return Err(index_exists(&index.name));
        }
        let index_table = IndexTable::new(index, &schema.meta)?;
        let index_name = index_table.name().to_string();

        let handle = self.storage.get_table(table_name).await?;
        let updated = {
            let mut table = handle.write().await;
            table.add_index(index_table, include_base_data, now_millis());
            table.schema().clone()
        };
        *catalog = catalog.clone().with_table_schema(updated)?;

        info!(
            "created index {} on {} (include_base_data={})",
            index_name, table_name, include_base_data
        );
        Ok(())
    }

    pub async fn delete_index(&self, table_name: &str, index_name: &str) -> Result<()> {
        self.ensure_open()?;
        let mut catalog = self.catalog.write().await;
        let handle = self.storage.get_table(table_name).await?;
        let updated = {
            let mut table = handle.write().await;
            table.remove_index(index_name)?;
            table.schema().clone()
        };
        *catalog = catalog.clone().with_table_schema(updated)?;

        info!("deleted index {} of {}", index_name, table_name);
        Ok(())
    }

    /// Changes table options and/or the stream of a table.
    pub async fn update_table(&self, table_name: &str, request: UpdateTableRequest) -> Result<()> {
        self.ensure_open()?;
        if let Some(options) = &request.options {
            validate_options(options)?;
        }
        let expiration = self.stream_expiration(request.stream_spec.as_ref())?;

        let mut catalog = self.catalog.write().await;
        if catalog.get_table(table_name)?.kind == TableKind::Timeseries {
            return Err(DbError::invalid(format!(
                "Table '{}' is a timeseries table; use update_timeseries_table.",
                table_name
            )));
        }

        let handle = self.storage.get_table(table_name).await?;
        let updated = {
            let mut table = handle.write().await;
            if let Some(options) = request.options {
                table.set_options(options);
            }
            match (request.stream_spec, expiration) {
                (Some(_), Some(hours)) => table.enable_stream(hours, now_millis()),
                (Some(_), None) => table.disable_stream(),
                (None, _) => {}
            }
            table.schema().clone()
        };
        *catalog = catalog.clone().with_table_schema(updated)?;

        debug!("updated table {}", table_name);
        Ok(())
    }

    pub async fn describe_table(&self, table_name: &str) -> Result<DescribeTableResponse> {
        self.ensure_open()?;
        let handle = self.storage.get_table(table_name).await?;
        let table = handle.read().await;
        Ok(describe(&table))
    }

    /// Names of the wide-column tables, sorted.
    pub async fn list_table(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.catalog.read().await.list_tables(TableKind::WideColumn))
    }

    pub async fn delete_table(&self, table_name: &str) -> Result<()> {
        self.ensure_open()?;
        let mut catalog = self.catalog.write().await;
        if catalog.get_table(table_name)?.kind == TableKind::Timeseries {
            return Err(DbError::invalid(format!(
                "Table '{}' is a timeseries table; use delete_timeseries_table.",
                table_name
            )));
        }
        self.storage.drop_table(table_name).await?;
        *catalog = catalog.clone().without_table(table_name)?;

        info!("deleted table {}", table_name);
        Ok(())
    }

    pub(crate) fn validate_name(&self, kind: &str, name: &str) -> Result<()> {
        if name.len() > self.config.max_table_name_bytes || !self.name_pattern.is_match(name) {
            return Err(DbError::invalid(format!("Invalid {} name: '{}'.", kind, name)));
        }
        Ok(())
    }

    fn validate_table_meta(&self, meta: &TableMeta) -> Result<()> {
        self.validate_name("table", &meta.name)?;

        let pk_count = meta.primary_key.len();
        if pk_count == 0 || pk_count > self.config.max_primary_key_columns {
            return Err(DbError::invalid(format!(
                "The number of primary key columns must be in range: [1, {}].",
                self.config.max_primary_key_columns
            )));
        }
        validate_defined_columns(meta, &self.config)?;

        let mut names = HashSet::new();
        for column in &meta.primary_key {
            self.validate_column_name("primary key", &column.name)?;
            if !names.insert(column.name.as_str()) {
                return Err(DbError::invalid(format!(
                    "Duplicated primary key name: '{}'.",
                    column.name
                )));
            }
        }
        for column in &meta.defined_columns {
            self.validate_column_name("attribute", &column.name)?;
            if !names.insert(column.name.as_str()) {
                return Err(DbError::invalid(format!(
                    "Duplicated defined column name: '{}'.",
                    column.name
                )));
            }
        }
        Ok(())
    }

    fn validate_column_name(&self, kind: &str, name: &str) -> Result<()> {
        if name.is_empty() || name.len() > self.config.max_column_name_bytes {
            return Err(DbError::invalid(format!(
                "The length of {} column name must be in range: [1, {}].",
                kind, self.config.max_column_name_bytes
            )));
        }
        Ok(())
    }

    /// Retention for an enabling spec, `None` for a disabling one.
    fn stream_expiration(&self, spec: Option<&StreamSpec>) -> Result<Option<i64>> {
        let Some(spec) = spec.filter(|s| s.enable) else {
            return Ok(None);
        };
        let hours = spec
            .expiration_hours
            .unwrap_or(self.config.default_stream_expiration_hours);
        if !(1..=MAX_STREAM_EXPIRATION_HOURS).contains(&hours) {
            return Err(DbError::invalid(format!(
                "expiration_hours must be in range: [1, {}].",
                MAX_STREAM_EXPIRATION_HOURS
            )));
        }
        Ok(Some(hours))
    }
}

pub(crate) fn validate_options(options: &TableOptions) -> Result<()> {
    if options.max_versions == 0 {
        return Err(DbError::invalid("max_versions must be greater than 0."));
    }
    if options.time_to_live != -1 && options.time_to_live <= 0 {
        return Err(DbError::invalid("time_to_live must be -1 or positive."));
    }
    Ok(())
}

fn index_exists(name: &str) -> DbError {
    DbError::AlreadyExists(format!("Requested index '{}' already exists.", name))
}

fn describe(table: &Table) -> DescribeTableResponse {
    let schema = table.schema();
    let stream_details = match table.stream() {
        Some(stream) => StreamDetails {
            enable: true,
            stream_id: Some(stream.stream_id().to_string()),
            expiration_hours: Some(stream.expiration_hours()),
            last_enable_time: Some(stream.creation_time()),
        },
        None => StreamDetails {
            enable: false,
            stream_id: None,
            expiration_hours: None,
            last_enable_time: None,
        },
    };
    DescribeTableResponse {
        meta: schema.meta.clone(),
        options: schema.options,
        indexes: schema.indexes.clone(),
        stream_details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ColumnType, PrimaryKeySchema, PrimaryKeyType};

    fn meta(name: &str) -> TableMeta {
        TableMeta::new(name)
            .with_primary_key("id", PrimaryKeyType::Integer)
            .with_defined_column("c", ColumnType::String)
    }

    #[tokio::test]
    async fn test_table_lifecycle() {
        let db = WideColumnDB::new(StoreConfig::default()).unwrap();
        db.create_table(CreateTableRequest::new(meta("t1"))).await.unwrap();

        let err = db.create_table(CreateTableRequest::new(meta("t1"))).await.unwrap_err();
        assert_eq!(err.message(), "Requested table already exists.");
        assert_eq!(db.list_table().await.unwrap(), vec!["t1"]);

        let described = db.describe_table("t1").await.unwrap();
        assert_eq!(described.meta, meta("t1"));
        assert!(!described.stream_details.enable);

        db.delete_table("t1").await.unwrap();
        assert!(db.list_table().await.unwrap().is_empty());
        let err = db.delete_table("t1").await.unwrap_err();
        assert_eq!(err.message(), "Requested table does not exist.");
    }

    #[tokio::test]
    async fn test_invalid_table_definitions() {
        let db = WideColumnDB::new(StoreConfig::default()).unwrap();

        let err = db.create_table(CreateTableRequest::new(meta("1bad"))).await.unwrap_err();
        assert_eq!(err.code(), "OTSParameterInvalid");

        let no_pk = TableMeta::new("t");
        assert!(db.create_table(CreateTableRequest::new(no_pk)).await.is_err());

        let dup = TableMeta::new("t")
            .with_primary_key("id", PrimaryKeyType::Integer)
            .with_defined_column("id", ColumnType::String);
        let err = db.create_table(CreateTableRequest::new(dup)).await.unwrap_err();
        assert_eq!(err.message(), "Duplicated defined column name: 'id'.");

        let bad_versions = CreateTableRequest::new(meta("t")).with_options(TableOptions::new(-1, 0));
        assert!(db.create_table(bad_versions).await.is_err());
        assert!(db.list_table().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_primary_key_schema_reported() {
        let db = WideColumnDB::new(StoreConfig::default()).unwrap();
        db.create_table(CreateTableRequest::new(meta("t"))).await.unwrap();
        let described = db.describe_table("t").await.unwrap();
        assert_eq!(
            described.meta.primary_key,
            vec![PrimaryKeySchema::new("id", PrimaryKeyType::Integer)]
        );
    }

    #[tokio::test]
    async fn test_shutdown_rejects_calls() {
        let db = WideColumnDB::new(StoreConfig::default()).unwrap();
        db.create_table(CreateTableRequest::new(meta("t"))).await.unwrap();
        db.shutdown().await;
        let err = db.list_table().await.unwrap_err();
        assert_eq!(err.code(), "OTSServerUnavailable");
    }
}
