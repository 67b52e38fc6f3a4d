use std::collections::VecDeque;
use std::sync::Arc;
use futures::future::join_all;
use log::{debug, warn};
use tokio::sync::RwLock;
use tracing::{Instrument, info_span};
use crate::core::{Cell, DbError, PrimaryKey, Result, Row, RowExistence, now_millis};
use crate::storage::{ReadOptions, RowUpdate, Table, TableKind, compute_splits};
use super::database::WideColumnDB;
use super::requests::{
    ComputeSplitsResponse, GetRangeRequest, GetRangeResponse, GetRowRequest, RowChange,
    RowOperation,
};

impl WideColumnDB {
    pub async fn put_row(
        &self,
        table_name: &str,
        primary_key: &PrimaryKey,
        cells: &[Cell],
        condition: RowExistence,
    ) -> Result<()> {
        self.ensure_open()?;
        let handle = self.writable_table(table_name).await?;
        let mut table = handle.write().await;
        ensure_row_table(&table)?;
        table.put_row(primary_key, cells, condition, now_millis())
    }

    pub async fn update_row(
        &self,
        table_name: &str,
        primary_key: &PrimaryKey,
        update: &RowUpdate,
        condition: RowExistence,
    ) -> Result<()> {
        self.ensure_open()?;
        let handle = self.writable_table(table_name).await?;
        let mut table = handle.write().await;
        ensure_row_table(&table)?;
        table.update_row(primary_key, update, condition, now_millis())
    }

    pub async fn delete_row(
        &self,
        table_name: &str,
        primary_key: &PrimaryKey,
        condition: RowExistence,
    ) -> Result<()> {
        self.ensure_open()?;
        let handle = self.writable_table(table_name).await?;
        let mut table = handle.write().await;
        ensure_row_table(&table)?;
        table.delete_row(primary_key, condition, now_millis())
    }

    /// Reads one row of a table or index. `None` when the row has no live
    /// cells.
    pub async fn get_row(&self, request: &GetRowRequest) -> Result<Option<Row>> {
        self.ensure_open()?;
        validate_max_versions(request.max_versions)?;
        let (handle, index) = self.readable_table(&request.table_name).await?;
        let table = handle.read().await;
        let view = match &index {
            Some(name) => table.index_view(name)?,
            None => table.view(),
        };
        let read = ReadOptions {
            columns: &request.columns_to_get,
            max_versions: request.max_versions,
            time_range: request.time_range,
        };
        view.get_row(&request.primary_key, &read, now_millis())
    }

    /// Applies each change on its own; the outer error only reports a
    /// malformed batch.
    pub async fn batch_write_row(&self, changes: Vec<RowChange>) -> Result<Vec<Result<()>>> {
        self.ensure_open()?;
        if changes.is_empty() {
            return Err(DbError::invalid("No row specified in the request of BatchWriteRow."));
        }
        if changes.len() > self.config.max_batch_write_rows {
            return Err(DbError::invalid(format!(
                "Rows count exceeds the upper limit: {}.",
                self.config.max_batch_write_rows
            )));
        }

        let span = info_span!("batch_write_row", rows = changes.len());
        let results = join_all(changes.iter().enumerate().map(|(i, change)| async move {
            let result = self.apply_change(change).await;
            if let Err(err) = &result {
                warn!("batch write row {} on {} failed: {}", i, change.table_name, err);
            }
            result
        }))
        .instrument(span)
        .await;

        Ok(results)
    }

    pub async fn batch_get_row(&self, requests: Vec<GetRowRequest>) -> Result<Vec<Result<Option<Row>>>> {
        self.ensure_open()?;
        if requests.is_empty() {
            return Err(DbError::invalid("No row specified in the request of BatchGetRow."));
        }
        if requests.len() > self.config.max_batch_get_rows {
            return Err(DbError::invalid(format!(
                "Rows count exceeds the upper limit: {}.",
                self.config.max_batch_get_rows
            )));
        }

        let span = info_span!("batch_get_row", rows = requests.len());
        let results = join_all(requests.iter().enumerate().map(|(i, request)| async move {
            let result = self.get_row(request).await;
            if let Err(err) = &result {
                warn!("batch get row {} on {} failed: {}", i, request.table_name, err);
            }
            result
        }))
        .instrument(span)
        .await;

        Ok(results)
    }

    /// One page of a range read. The page holds at most
    /// `min(limit, max_range_rows)` rows.
    pub async fn get_range(&self, request: &GetRangeRequest) -> Result<GetRangeResponse> {
        self.ensure_open()?;
        validate_max_versions(request.max_versions)?;
        let limit = match request.limit {
            Some(0) => return Err(DbError::invalid("limit must be greater than 0.")),
            Some(limit) => limit.min(self.config.max_range_rows),
            None => self.config.max_range_rows,
        };

        let (handle, index) = self.readable_table(&request.table_name).await?;
        let table = handle.read().await;
        let view = match &index {
            Some(name) => table.index_view(name)?,
            None => table.view(),
        };
        let read = ReadOptions {
            columns: &request.columns_to_get,
            max_versions: request.max_versions,
            time_range: request.time_range,
        };
        let page = view.scan(
            &request.inclusive_start_primary_key,
            &request.exclusive_end_primary_key,
            request.direction,
            limit,
            &read,
            now_millis(),
        )?;

        Ok(GetRangeResponse {
            rows: page.rows,
            next_start_primary_key: page.next_start_primary_key,
        })
    }

    /// Lazy row sequence over a whole range, fetched one page at a time.
    pub fn range_scanner(&self, request: GetRangeRequest) -> RangeScanner<'_> {
        RangeScanner {
            db: self,
            request,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub async fn compute_splits_by_size(
        &self,
        table_name: &str,
        split_size_in_100mb: i64,
    ) -> Result<ComputeSplitsResponse> {
        self.ensure_open()?;
        if split_size_in_100mb <= 0 {
            return Err(DbError::invalid("split_size_in_MB is not positive"));
        }
        let handle = self.storage.get_table(table_name).await?;
        let table = handle.read().await;

        let target = (split_size_in_100mb as u64).saturating_mul(self.config.split_unit_bytes);
        let schema = &table.schema().meta.primary_key;
        let splits = compute_splits(table.cells(), schema, target, &self.config.split_locations);
        debug!(
            "computed {} split(s) for {} ({} bytes, target {})",
            splits.len(),
            table_name,
            table.cells().total_size(),
            target
        );

        Ok(ComputeSplitsResponse {
            primary_key_schema: schema.clone(),
            splits,
        })
    }

    async fn apply_change(&self, change: &RowChange) -> Result<()> {
        match &change.operation {
            RowOperation::Put(cells) => {
                self.put_row(&change.table_name, &change.primary_key, cells, change.condition)
                    .await
            }
            RowOperation::Update(update) => {
                self.update_row(&change.table_name, &change.primary_key, update, change.condition)
                    .await
            }
            RowOperation::Delete => {
                self.delete_row(&change.table_name, &change.primary_key, change.condition)
                    .await
            }
        }
    }

    async fn writable_table(&self, name: &str) -> Result<Arc<RwLock<Table>>> {
        match self.storage.get_table(name).await {
            Ok(handle) => Ok(handle),
            Err(err) => {
                if self.catalog.read().await.index_owner(name).is_some() {
                    return Err(DbError::invalid(format!(
                        "Index table '{}' can not be written directly.",
                        name
                    )));
                }
                Err(err)
            }
        }
    }

    /// Base table handle, plus the index name when `name` is an index.
    async fn readable_table(&self, name: &str) -> Result<(Arc<RwLock<Table>>, Option<String>)> {
        match self.storage.get_table(name).await {
            Ok(handle) => Ok((handle, None)),
            Err(err) => {
                let owner = self.catalog.read().await.index_owner(name).map(str::to_string);
                match owner {
                    Some(owner) => Ok((self.storage.get_table(&owner).await?, Some(name.to_string()))),
                    None => Err(err),
                }
            }
        }
    }
}

fn ensure_row_table(table: &Table) -> Result<()> {
    if table.schema().kind == TableKind::Timeseries {
        return Err(DbError::invalid(format!(
            "Table '{}' is a timeseries table; write it with put_timeseries_data.",
            table.schema().name()
        )));
    }
    Ok(())
}

fn validate_max_versions(max_versions: usize) -> Result<()> {
    if max_versions == 0 {
        return Err(DbError::invalid("max_versions must be greater than 0."));
    }
    Ok(())
}

/// Pages through a range with `get_range`, holding no lock between pages.
///
/// `next_start_primary_key` is the key of the next row not yet returned, so
/// a scan can be resumed later with a fresh scanner.
pub struct RangeScanner<'a> {
    db: &'a WideColumnDB,
    request: GetRangeRequest,
    buffer: VecDeque<Row>,
    exhausted: bool,
}

impl RangeScanner<'_> {
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Ok(Some(row));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self.db.get_range(&self.request).await?;
            self.buffer.extend(page.rows);
            match page.next_start_primary_key {
                Some(next) => self.request.inclusive_start_primary_key = next,
                None => self.exhausted = true,
            }
        }
    }

    pub fn next_start_primary_key(&self) -> Option<PrimaryKey> {
        match self.buffer.front() {
            Some(row) => Some(row.primary_key.clone()),
            None if self.exhausted => None,
            None => Some(self.request.inclusive_start_primary_key.clone()),
        }
    }

    pub async fn collect_all(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}
