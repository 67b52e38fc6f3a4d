use std::collections::HashSet;
use std::sync::Arc;
use log::{debug, info, warn};
use tokio::sync::RwLock;
use crate::core::{
    DbError, Direction, PrimaryKey, PrimaryKeyValue, Result, RowExistence, TableOptions,
    now_micros, now_millis,
};
use crate::storage::{ReadOptions, Table, TableKind, TableSchema};
use crate::timeseries::{
    AnalyticalStore, KeyLayout, MetaStore, TimeseriesKey, TimeseriesMeta, TimeseriesRow,
    TimeseriesSchema, TimeseriesTableMeta,
};
use super::database::WideColumnDB;
use super::requests::{
    AnalyticalStoreDescription, CreateTimeseriesTableRequest, FailedRow, GetTimeseriesDataRequest,
    QueryTimeseriesMetaRequest, QueryTimeseriesMetaResponse, ScanTimeseriesDataRequest,
    TimeseriesDataResponse, UpdateAnalyticalStoreRequest, UpdateTimeseriesTableRequest,
};

const DEFAULT_META_QUERY_LIMIT: usize = 100;

/// Resolved handles of one timeseries table.
struct SeriesTable {
    schema: TimeseriesSchema,
    layout: KeyLayout,
    table: Arc<RwLock<Table>>,
}

impl WideColumnDB {
    pub async fn create_timeseries_table(&self, request: CreateTimeseriesTableRequest) -> Result<()> {
        self.ensure_open()?;
        let CreateTimeseriesTableRequest {
            meta,
            mut analytical_stores,
            enable_analytical_store,
        } = request;

        self.validate_name("table", &meta.name)?;
        validate_ttl(meta.options.time_to_live, "time_to_live")?;
        validate_ttl(meta.meta_options.meta_time_to_live, "meta_time_to_live")?;
        let layout = KeyLayout::new(&meta)?;

        if analytical_stores.is_empty()
            && enable_analytical_store
            && self.config.provision_default_analytical_store
        {
            analytical_stores.push(AnalyticalStore::new(AnalyticalStore::DEFAULT_NAME));
        }
        let mut names = HashSet::new();
        for store in &analytical_stores {
            self.validate_store(store)?;
            if !names.insert(store.name.as_str()) {
                return Err(store_exists(&store.name));
            }
        }

        let mut catalog = self.catalog.write().await;
        if catalog.table_exists(&meta.name) || catalog.index_owner(&meta.name).is_some() {
            return Err(DbError::AlreadyExists("Requested table already exists.".into()));
        }

        let mut table_schema = TableSchema::new(
            layout.table_meta(&meta.name),
            TableOptions::new(meta.options.time_to_live, 1),
        );
        table_schema.kind = TableKind::Timeseries;
        self.storage.create_table(table_schema.clone()).await?;

        let name = meta.name.clone();
        let store_count = analytical_stores.len();
        *catalog = catalog
            .clone()
            .with_table(table_schema)?
            .with_timeseries(TimeseriesSchema {
                meta,
                analytical_stores,
            })?;
        self.meta_stores
            .write()
            .await
            .insert(name.clone(), Arc::new(RwLock::new(MetaStore::new())));

        info!(
            "created timeseries table {} with {} analytical store(s)",
            name, store_count
        );
        Ok(())
    }

    pub async fn describe_timeseries_table(&self, table_name: &str) -> Result<TimeseriesSchema> {
        self.ensure_open()?;
        Ok(self.catalog.read().await.get_timeseries(table_name)?.clone())
    }

    pub async fn list_timeseries_table(&self) -> Result<Vec<TimeseriesTableMeta>> {
        self.ensure_open()?;
        let catalog = self.catalog.read().await;
        catalog
            .list_tables(TableKind::Timeseries)
            .iter()
            .map(|name| Ok(catalog.get_timeseries(name)?.meta.clone()))
            .collect()
    }

    pub async fn update_timeseries_table(
        &self,
        table_name: &str,
        request: UpdateTimeseriesTableRequest,
    ) -> Result<()> {
        self.ensure_open()?;
        if let Some(ttl) = request.time_to_live {
            validate_ttl(ttl, "time_to_live")?;
        }
        if let Some(options) = &request.meta_options {
            validate_ttl(options.meta_time_to_live, "meta_time_to_live")?;
        }

        let mut catalog = self.catalog.write().await;
        let mut schema = catalog.get_timeseries(table_name)?.clone();
        if let Some(options) = request.meta_options {
            schema.meta.meta_options = options;
        }

        let mut table_schema = catalog.get_table(table_name)?.clone();
        if let Some(ttl) = request.time_to_live {
            schema.meta.options.time_to_live = ttl;
            let options = TableOptions::new(ttl, 1);
            let handle = self.storage.get_table(table_name).await?;
            handle.write().await.set_options(options);
            table_schema.options = options;
        }
        *catalog = catalog
            .clone()
            .with_table_schema(table_schema)?
            .with_timeseries(schema)?;

        debug!("updated timeseries table {}", table_name);
        Ok(())
    }

    /// Drops the table, its series meta and every mapping table on its
    /// analytical stores.
    pub async fn delete_timeseries_table(&self, table_name: &str) -> Result<()> {
        self.ensure_open()?;
        let mut catalog = self.catalog.write().await;
        let schema = catalog.get_timeseries(table_name)?.clone();
        let mappings: Vec<String> = schema
            .analytical_stores
            .iter()
            .flat_map(|s| catalog.mappings_of(table_name, &s.name))
            .map(|m| m.name.clone())
            .collect();

        self.storage.drop_table(table_name).await?;
        let mut next = catalog.clone().without_table(table_name)?;
        for mapping in &mappings {
            next = next.without_mapping(mapping)?;
        }
        *catalog = next;
        self.meta_stores.write().await.remove(table_name);

        info!(
            "deleted timeseries table {} and {} mapping table(s)",
            table_name,
            mappings.len()
        );
        Ok(())
    }

    /// Writes data points; rows that fail are reported and the rest are
    /// kept.
    pub async fn put_timeseries_data(
        &self,
        table_name: &str,
        rows: Vec<TimeseriesRow>,
    ) -> Result<Vec<FailedRow>> {
        self.ensure_open()?;
        if rows.is_empty() {
            return Err(DbError::invalid("No row specified in the request of PutTimeseriesData."));
        }
        if rows.len() > self.config.max_batch_write_rows {
            return Err(DbError::invalid(format!(
                "Rows count exceeds the upper limit: {}.",
                self.config.max_batch_write_rows
            )));
        }
        let series = self.series_table(table_name).await?;

        let mut failed = Vec::new();
        let mut written: Vec<&TimeseriesKey> = Vec::new();
        {
            let mut table = series.table.write().await;
            let now = now_millis();
            for (row_index, row) in rows.iter().enumerate() {
                let result = series
                    .layout
                    .encode(row)
                    .and_then(|(pk, cells)| table.put_row(&pk, &cells, RowExistence::Ignore, now));
                match result {
                    Ok(()) => written.push(&row.key),
                    Err(error) => {
                        warn!("timeseries row {} of {} rejected: {}", row_index, table_name, error);
                        failed.push(FailedRow { row_index, error });
                    }
                }
            }
        }

        if !written.is_empty() {
            let meta_store = self.meta_store(table_name).await?;
            let mut meta_store = meta_store.write().await;
            let now_us = now_micros();
            for key in written {
                meta_store.touch(key, now_us);
            }
        }
        Ok(failed)
    }

    /// Points of one series in `[begin, end)`, oldest first unless
    /// `backward` is set.
    pub async fn get_timeseries_data(
        &self,
        table_name: &str,
        request: &GetTimeseriesDataRequest,
    ) -> Result<TimeseriesDataResponse> {
        self.ensure_open()?;
        if request.begin_time_in_us < 0 || request.begin_time_in_us >= request.end_time_in_us {
            return Err(DbError::invalid(
                "begin_time_in_us must be non-negative and less than end_time_in_us.",
            ));
        }
        let limit = self.page_limit(request.limit)?;
        let series = self.series_table(table_name).await?;
        let layout = &series.layout;
        let key = &request.key;

        let (start, end, direction) = if request.backward {
            (
                layout.time_bound(key, request.end_time_in_us - 1, PrimaryKeyValue::InfMax)?,
                layout.time_bound(key, request.begin_time_in_us - 1, PrimaryKeyValue::InfMax)?,
                Direction::Backward,
            )
        } else {
            (
                layout.time_bound(key, request.begin_time_in_us, PrimaryKeyValue::InfMin)?,
                layout.time_bound(key, request.end_time_in_us, PrimaryKeyValue::InfMin)?,
                Direction::Forward,
            )
        };
        let start = match &request.next_token {
            Some(token) => decode_token(token)?,
            None => start,
        };

        self.read_series(&series, &start, &end, direction, limit, &request.fields_to_get)
            .await
    }

    /// Every point of the table in key order.
    pub async fn scan_timeseries_data(
        &self,
        table_name: &str,
        request: &ScanTimeseriesDataRequest,
    ) -> Result<TimeseriesDataResponse> {
        self.ensure_open()?;
        let limit = self.page_limit(request.limit)?;
        let series = self.series_table(table_name).await?;
        let schema = series.layout.primary_key_schema();

        let start = match &request.next_token {
            Some(token) => decode_token(token)?,
            None => PrimaryKey::inf_min(&schema),
        };
        let end = PrimaryKey::inf_max(&schema);

        self.read_series(&series, &start, &end, Direction::Forward, limit, &request.fields_to_get)
            .await
    }

    /// Sets series attributes; entries are created when missing.
    pub async fn update_timeseries_meta(
        &self,
        table_name: &str,
        metas: Vec<TimeseriesMeta>,
    ) -> Result<Vec<FailedRow>> {
        self.ensure_open()?;
        let series = self.series_table(table_name).await?;
        let options = series.schema.meta.meta_options;
        let meta_store = self.meta_store(table_name).await?;
        let mut meta_store = meta_store.write().await;
        let now_us = now_micros();

        let mut failed = Vec::new();
        for (row_index, meta) in metas.iter().enumerate() {
            let result = series
                .layout
                .series_prefix(&meta.key)
                .and_then(|_| meta_store.update(meta, &options, now_us));
            if let Err(error) = result {
                failed.push(FailedRow { row_index, error });
            }
        }
        Ok(failed)
    }

    pub async fn query_timeseries_meta(
        &self,
        table_name: &str,
        request: &QueryTimeseriesMetaRequest,
    ) -> Result<QueryTimeseriesMetaResponse> {
        self.ensure_open()?;
        let limit = match request.limit {
            Some(0) => return Err(DbError::invalid("limit must be greater than 0.")),
            Some(limit) => limit,
            None => DEFAULT_META_QUERY_LIMIT,
        };
        let offset = match &request.next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| DbError::invalid("Invalid next token."))?,
            None => 0,
        };

        let options = self.catalog.read().await.get_timeseries(table_name)?.meta.meta_options;
        let meta_store = self.meta_store(table_name).await?;
        let (metas, next) = meta_store.read().await.query(
            request.condition.as_ref(),
            offset,
            limit,
            &options,
            now_micros(),
        )?;

        Ok(QueryTimeseriesMetaResponse {
            metas,
            next_token: next.map(|offset| offset.to_string()),
        })
    }

    pub async fn delete_timeseries_meta(
        &self,
        table_name: &str,
        keys: Vec<TimeseriesKey>,
    ) -> Result<Vec<FailedRow>> {
        self.ensure_open()?;
        let meta_store = self.meta_store(table_name).await?;
        let mut meta_store = meta_store.write().await;
        Ok(keys
            .iter()
            .enumerate()
            .filter_map(|(row_index, key)| {
                meta_store
                    .delete(key)
                    .err()
                    .map(|error| FailedRow { row_index, error })
            })
            .collect())
    }

    pub async fn create_timeseries_analytical_store(
        &self,
        table_name: &str,
        store: AnalyticalStore,
    ) -> Result<()> {
        self.ensure_open()?;
        self.validate_store(&store)?;
        let mut catalog = self.catalog.write().await;
        let mut schema = catalog.get_timeseries(table_name)?.clone();
        if schema.analytical_store(&store.name).is_some() {
            return Err(store_exists(&store.name));
        }

        let name = store.name.clone();
        schema.analytical_stores.push(store);
        *catalog = catalog.clone().with_timeseries(schema)?;

        info!("created analytical store {} on {}", name, table_name);
        Ok(())
    }

    pub async fn describe_timeseries_analytical_store(
        &self,
        table_name: &str,
        store_name: &str,
    ) -> Result<AnalyticalStoreDescription> {
        self.ensure_open()?;
        let catalog = self.catalog.read().await;
        let store = catalog
            .get_timeseries(table_name)?
            .analytical_store(store_name)
            .cloned()
            .ok_or_else(|| store_not_found(store_name))?;

        Ok(AnalyticalStoreDescription {
            store,
            mapping_tables: catalog
                .mappings_of(table_name, store_name)
                .into_iter()
                .map(|m| m.name.clone())
                .collect(),
        })
    }

    pub async fn update_timeseries_analytical_store(
        &self,
        table_name: &str,
        store_name: &str,
        request: UpdateAnalyticalStoreRequest,
    ) -> Result<()> {
        self.ensure_open()?;
        if let Some(ttl) = request.time_to_live {
            validate_ttl(ttl, "time_to_live")?;
        }
        let mut catalog = self.catalog.write().await;
        let mut schema = catalog.get_timeseries(table_name)?.clone();
        let store = schema
            .analytical_stores
            .iter_mut()
            .find(|s| s.name == store_name)
            .ok_or_else(|| store_not_found(store_name))?;
        if let Some(ttl) = request.time_to_live {
            store.time_to_live = ttl;
        }
        if let Some(sync_option) = request.sync_option {
            store.sync_option = sync_option;
        }
        *catalog = catalog.clone().with_timeseries(schema)?;

        debug!("updated analytical store {} on {}", store_name, table_name);
        Ok(())
    }

    /// Removes a store. Mapping tables on it block the call unless
    /// `drop_mapping_table` is set, in which case they are removed too.
    pub async fn delete_timeseries_analytical_store(
        &self,
        table_name: &str,
        store_name: &str,
        drop_mapping_table: bool,
    ) -> Result<()> {
        self.ensure_open()?;
        let mut catalog = self.catalog.write().await;
        let mut schema = catalog.get_timeseries(table_name)?.clone();
        if schema.analytical_store(store_name).is_none() {
            return Err(store_not_found(store_name));
        }

        let mappings: Vec<String> = catalog
            .mappings_of(table_name, store_name)
            .into_iter()
            .map(|m| m.name.clone())
            .collect();
        if !mappings.is_empty() && !drop_mapping_table {
            return Err(DbError::invalid(format!(
                "Analytical store '{}' still has mapping table(s): {}.",
                store_name,
                mappings.join(", ")
            )));
        }

        schema.analytical_stores.retain(|s| s.name != store_name);
        let mut next = catalog.clone().with_timeseries(schema)?;
        for mapping in &mappings {
            next = next.without_mapping(mapping)?;
        }
        *catalog = next;

        info!(
            "deleted analytical store {} on {} ({} mapping table(s) dropped)",
            store_name,
            table_name,
            mappings.len()
        );
        Ok(())
    }

    async fn series_table(&self, table_name: &str) -> Result<SeriesTable> {
        let schema = self.catalog.read().await.get_timeseries(table_name)?.clone();
        let layout = KeyLayout::new(&schema.meta)?;
        let table = self.storage.get_table(table_name).await?;
        Ok(SeriesTable {
            schema,
            layout,
            table,
        })
    }

    async fn meta_store(&self, table_name: &str) -> Result<Arc<RwLock<MetaStore>>> {
        self.meta_stores
            .read()
            .await
            .get(table_name)
            .cloned()
            .ok_or_else(DbError::table_not_found)
    }

    fn page_limit(&self, limit: Option<usize>) -> Result<usize> {
        match limit {
            Some(0) => Err(DbError::invalid("limit must be greater than 0.")),
            Some(limit) => Ok(limit.min(self.config.max_range_rows)),
            None => Ok(self.config.max_range_rows),
        }
    }

    fn validate_store(&self, store: &AnalyticalStore) -> Result<()> {
        self.validate_name("analytical store", &store.name)?;
        validate_ttl(store.time_to_live, "time_to_live")
    }

    async fn read_series(
        &self,
        series: &SeriesTable,
        start: &PrimaryKey,
        end: &PrimaryKey,
        direction: Direction,
        limit: usize,
        fields: &[String],
    ) -> Result<TimeseriesDataResponse> {
        let mut columns = fields.to_vec();
        if !columns.is_empty() {
            columns.extend(series.layout.key_attribute_columns());
        }
        let read = ReadOptions::latest(&columns);

        let page = {
            let table = series.table.read().await;
            table.view().scan(start, end, direction, limit, &read, now_millis())?
        };
        let rows = page
            .rows
            .iter()
            .map(|row| series.layout.decode(row))
            .collect::<Result<Vec<_>>>()?;
        let next_token = page
            .next_start_primary_key
            .as_ref()
            .map(encode_token)
            .transpose()?;

        Ok(TimeseriesDataResponse { rows, next_token })
    }
}

fn validate_ttl(seconds: i64, name: &str) -> Result<()> {
    if seconds != -1 && seconds <= 0 {
        return Err(DbError::invalid(format!("{} must be -1 or positive.", name)));
    }
    Ok(())
}

fn store_exists(name: &str) -> DbError {
    DbError::AlreadyExists(format!("Analytical store '{}' already exists.", name))
}

fn store_not_found(name: &str) -> DbError {
    DbError::NotFound(format!("Analytical store '{}' does not exist.", name))
}

fn encode_token(pk: &PrimaryKey) -> Result<String> {
    serde_json::to_string(pk).map_err(|e| DbError::invalid(format!("Invalid next token: {}", e)))
}

fn decode_token(token: &str) -> Result<PrimaryKey> {
    serde_json::from_str(token).map_err(|_| DbError::invalid("Invalid next token."))
}
