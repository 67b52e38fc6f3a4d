//! Request and response shapes of the store API.

use crate::core::{
    Cell, DbError, Direction, IndexMeta, PrimaryKey, PrimaryKeySchema, Row, RowExistence,
    TableMeta, TableOptions, TimeRange,
};
use crate::storage::{RowUpdate, Split, StreamRecord, StreamSpec};
use crate::timeseries::{
    AnalyticalStore, MetaQueryCondition, SyncOption, TimeseriesKey, TimeseriesMeta,
    TimeseriesMetaOptions, TimeseriesRow, TimeseriesTableMeta,
};

#[derive(Debug, Clone)]
pub struct CreateTableRequest {
    pub meta: TableMeta,
    pub options: TableOptions,
    pub indexes: Vec<IndexMeta>,
    pub stream_spec: Option<StreamSpec>,
}

impl CreateTableRequest {
    pub fn new(meta: TableMeta) -> Self {
        Self {
            meta,
            options: TableOptions::default(),
            indexes: Vec::new(),
            stream_spec: None,
        }
    }

    pub fn with_options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_index(mut self, index: IndexMeta) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_stream(mut self, spec: StreamSpec) -> Self {
        self.stream_spec = Some(spec);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTableRequest {
    pub options: Option<TableOptions>,
    pub stream_spec: Option<StreamSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDetails {
    pub enable: bool,
    pub stream_id: Option<String>,
    pub expiration_hours: Option<i64>,
    pub last_enable_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescribeTableResponse {
    pub meta: TableMeta,
    pub options: TableOptions,
    pub indexes: Vec<IndexMeta>,
    pub stream_details: StreamDetails,
}

/// Point read. Defaults to the newest version of every column.
#[derive(Debug, Clone)]
pub struct GetRowRequest {
    pub table_name: String,
    pub primary_key: PrimaryKey,
    pub columns_to_get: Vec<String>,
    pub max_versions: usize,
    pub time_range: Option<TimeRange>,
}

impl GetRowRequest {
    pub fn new(table_name: impl Into<String>, primary_key: PrimaryKey) -> Self {
        Self {
            table_name: table_name.into(),
            primary_key,
            columns_to_get: Vec::new(),
            max_versions: 1,
            time_range: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns_to_get = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_versions(mut self, max_versions: usize) -> Self {
        self.max_versions = max_versions;
        self
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOperation {
    Put(Vec<Cell>),
    Update(RowUpdate),
    Delete,
}

/// One row of a batch write.
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    pub table_name: String,
    pub primary_key: PrimaryKey,
    pub operation: RowOperation,
    pub condition: RowExistence,
}

impl RowChange {
    pub fn put(table_name: impl Into<String>, primary_key: PrimaryKey, cells: Vec<Cell>) -> Self {
        Self::new(table_name, primary_key, RowOperation::Put(cells))
    }

    pub fn update(table_name: impl Into<String>, primary_key: PrimaryKey, update: RowUpdate) -> Self {
        Self::new(table_name, primary_key, RowOperation::Update(update))
    }

    pub fn delete(table_name: impl Into<String>, primary_key: PrimaryKey) -> Self {
        Self::new(table_name, primary_key, RowOperation::Delete)
    }

    pub fn with_condition(mut self, condition: RowExistence) -> Self {
        self.condition = condition;
        self
    }

    fn new(table_name: impl Into<String>, primary_key: PrimaryKey, operation: RowOperation) -> Self {
        Self {
            table_name: table_name.into(),
            primary_key,
            operation,
            condition: RowExistence::Ignore,
        }
    }
}

/// Range read over `[start, end)` (forward) or `(end, start]` (backward).
#[derive(Debug, Clone)]
pub struct GetRangeRequest {
    pub table_name: String,
    pub direction: Direction,
    pub inclusive_start_primary_key: PrimaryKey,
    pub exclusive_end_primary_key: PrimaryKey,
    pub columns_to_get: Vec<String>,
    pub max_versions: usize,
    pub limit: Option<usize>,
    pub time_range: Option<TimeRange>,
}

impl GetRangeRequest {
    pub fn new(table_name: impl Into<String>, start: PrimaryKey, end: PrimaryKey) -> Self {
        Self {
            table_name: table_name.into(),
            direction: Direction::Forward,
            inclusive_start_primary_key: start,
            exclusive_end_primary_key: end,
            columns_to_get: Vec::new(),
            max_versions: 1,
            limit: None,
            time_range: None,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns_to_get = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_versions(mut self, max_versions: usize) -> Self {
        self.max_versions = max_versions;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetRangeResponse {
    pub rows: Vec<Row>,
    pub next_start_primary_key: Option<PrimaryKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeSplitsResponse {
    pub primary_key_schema: Vec<PrimaryKeySchema>,
    pub splits: Vec<Split>,
}

#[derive(Debug, Clone)]
pub struct CreateTimeseriesTableRequest {
    pub meta: TimeseriesTableMeta,
    pub analytical_stores: Vec<AnalyticalStore>,
    /// Provisions `default_analytical_store` when no store is listed.
    pub enable_analytical_store: bool,
}

impl CreateTimeseriesTableRequest {
    pub fn new(meta: TimeseriesTableMeta) -> Self {
        Self {
            meta,
            analytical_stores: Vec::new(),
            enable_analytical_store: true,
        }
    }

    pub fn with_analytical_store(mut self, store: AnalyticalStore) -> Self {
        self.analytical_stores.push(store);
        self
    }

    pub fn without_analytical_store(mut self) -> Self {
        self.enable_analytical_store = false;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTimeseriesTableRequest {
    pub time_to_live: Option<i64>,
    pub meta_options: Option<TimeseriesMetaOptions>,
}

/// A row of a timeseries batch that was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRow {
    pub row_index: usize,
    pub error: DbError,
}

#[derive(Debug, Clone)]
pub struct GetTimeseriesDataRequest {
    pub key: TimeseriesKey,
    pub begin_time_in_us: i64,
    pub end_time_in_us: i64,
    pub limit: Option<usize>,
    pub backward: bool,
    pub fields_to_get: Vec<String>,
    pub next_token: Option<String>,
}

impl GetTimeseriesDataRequest {
    pub fn new(key: TimeseriesKey) -> Self {
        Self {
            key,
            begin_time_in_us: 0,
            end_time_in_us: i64::MAX,
            limit: None,
            backward: false,
            fields_to_get: Vec::new(),
            next_token: None,
        }
    }

    pub fn time_range(mut self, begin_time_in_us: i64, end_time_in_us: i64) -> Self {
        self.begin_time_in_us = begin_time_in_us;
        self.end_time_in_us = end_time_in_us;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn backward(mut self) -> Self {
        self.backward = true;
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_to_get = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn next_token(mut self, token: impl Into<String>) -> Self {
        self.next_token = Some(token.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanTimeseriesDataRequest {
    pub limit: Option<usize>,
    pub fields_to_get: Vec<String>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeseriesDataResponse {
    pub rows: Vec<TimeseriesRow>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryTimeseriesMetaRequest {
    pub condition: Option<MetaQueryCondition>,
    pub limit: Option<usize>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTimeseriesMetaResponse {
    pub metas: Vec<TimeseriesMeta>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAnalyticalStoreRequest {
    pub time_to_live: Option<i64>,
    pub sync_option: Option<SyncOption>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticalStoreDescription {
    pub store: AnalyticalStore,
    /// Mapping tables created on this store through SQL.
    pub mapping_tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetStreamRecordResponse {
    pub records: Vec<StreamRecord>,
    pub next_shard_iterator: Option<String>,
}
