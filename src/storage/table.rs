use serde::{Deserialize, Serialize};
use crate::core::{
    Cell, DbError, Direction, IndexMeta, PrimaryKey, PrimaryKeySchema, Result, Row, RowExistence,
    TableMeta, TableOptions,
};
use super::cells::{ReadOptions, ScanPage, VersionedCells};
use super::index::IndexTable;
use super::stream::{RecordColumn, StreamLog, StreamRecordType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    WideColumn,
    Timeseries,
}

/// Registry entry of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub meta: TableMeta,
    pub options: TableOptions,
    pub indexes: Vec<IndexMeta>,
    pub kind: TableKind,
}

impl TableSchema {
    pub fn new(meta: TableMeta, options: TableOptions) -> Self {
        Self {
            meta,
            options,
            indexes: Vec::new(),
            kind: TableKind::WideColumn,
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.iter().any(|i| i.name == name)
    }
}

/// Mutation applied by `update_row`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowUpdate {
    pub put: Vec<Cell>,
    pub delete_columns: Vec<String>,
    pub delete_cells: Vec<(String, i64)>,
}

impl RowUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, cell: Cell) -> Self {
        self.put.push(cell);
        self
    }

    pub fn delete_column(mut self, name: impl Into<String>) -> Self {
        self.delete_columns.push(name.into());
        self
    }

    pub fn delete_cell(mut self, name: impl Into<String>, timestamp: i64) -> Self {
        self.delete_cells.push((name.into(), timestamp));
        self
    }
}

/// Read-only view over a base table or one of its indexes.
pub struct TableView<'a> {
    pub primary_key: &'a [PrimaryKeySchema],
    pub cells: &'a VersionedCells,
    pub options: TableOptions,
}

impl TableView<'_> {
    pub fn get_row(&self, pk: &PrimaryKey, read: &ReadOptions<'_>, now: i64) -> Result<Option<Row>> {
        validate_primary_key(self.primary_key, pk, false)?;
        Ok(self.cells.read_row(pk, read, &self.options, now))
    }

    pub fn scan(
        &self,
        start: &PrimaryKey,
        end: &PrimaryKey,
        direction: Direction,
        limit: usize,
        read: &ReadOptions<'_>,
        now: i64,
    ) -> Result<ScanPage> {
        validate_primary_key(self.primary_key, start, true)?;
        validate_primary_key(self.primary_key, end, true)?;
        Ok(self
            .cells
            .scan(start, end, direction, limit, read, &self.options, now))
    }
}

/// A base table with its index shadow tables and optional change stream.
/// All of it sits behind one lock, so a row mutation, its index updates
/// and its stream record become visible together.
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    cells: VersionedCells,
    indexes: Vec<IndexTable>,
    stream: Option<StreamLog>,
    max_column_name_bytes: usize,
}

impl Table {
    pub fn new(schema: TableSchema, max_column_name_bytes: usize) -> Self {
        Self {
            schema,
            cells: VersionedCells::new(),
            indexes: Vec::new(),
            stream: None,
            max_column_name_bytes,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn cells(&self) -> &VersionedCells {
        &self.cells
    }

    pub fn row_count(&self) -> usize {
        self.cells.row_count()
    }

    pub fn view(&self) -> TableView<'_> {
        TableView {
            primary_key: &self.schema.meta.primary_key,
            cells: &self.cells,
            options: self.schema.options,
        }
    }

    pub fn index_view(&self, name: &str) -> Result<TableView<'_>> {
        let index = self
            .indexes
            .iter()
            .find(|i| i.name() == name)
            .ok_or_else(|| DbError::NotFound(format!("Requested index '{}' does not exist.", name)))?;
        Ok(TableView {
            primary_key: index.primary_key(),
            cells: index.cells(),
            options: IndexTable::options(&self.schema.options),
        })
    }

    pub fn set_options(&mut self, options: TableOptions) {
        self.schema.options = options;
    }

    pub fn put_row(
        &mut self,
        pk: &PrimaryKey,
        cells: &[Cell],
        condition: RowExistence,
        now: i64,
    ) -> Result<()> {
        validate_primary_key(&self.schema.meta.primary_key, pk, false)?;
        self.validate_cells(cells)?;
        let cells = stamp(cells, now);
        let columns = cells.iter().map(|c| RecordColumn::put(c, stamp_of(c, now))).collect();

        self.mutate(pk, condition, now, StreamRecordType::Put, columns, |store, options| {
            store.put_row(pk, &cells, now, options)
        })
    }

    pub fn update_row(
        &mut self,
        pk: &PrimaryKey,
        update: &RowUpdate,
        condition: RowExistence,
        now: i64,
    ) -> Result<()> {
        validate_primary_key(&self.schema.meta.primary_key, pk, false)?;
        self.validate_cells(&update.put)?;
        for name in update
            .delete_columns
            .iter()
            .chain(update.delete_cells.iter().map(|(n, _)| n))
        {
            self.validate_column_name(name)?;
        }

        let puts = stamp(&update.put, now);
        let mut columns: Vec<RecordColumn> = puts
            .iter()
            .map(|c| RecordColumn::put(c, stamp_of(c, now)))
            .collect();
        columns.extend(update.delete_columns.iter().map(|n| RecordColumn::delete_all(n)));
        columns.extend(
            update
                .delete_cells
                .iter()
                .map(|(n, ts)| RecordColumn::delete_version(n, *ts)),
        );

        self.mutate(pk, condition, now, StreamRecordType::Update, columns, |store, options| {
            store.update_row(pk, &puts, &update.delete_columns, &update.delete_cells, now, options)
        })
    }

    pub fn delete_row(&mut self, pk: &PrimaryKey, condition: RowExistence, now: i64) -> Result<()> {
        validate_primary_key(&self.schema.meta.primary_key, pk, false)?;
        self.mutate(pk, condition, now, StreamRecordType::Delete, Vec::new(), |store, _| {
            store.delete_row(pk)
        })
    }

    /// Attaches an index; existing rows are indexed when `include_base_data`.
    pub fn add_index(&mut self, mut index: IndexTable, include_base_data: bool, now: i64) {
        if include_base_data {
            index.backfill(&self.cells, &self.schema.options, now);
        }
        self.schema.indexes.push(index.meta().clone());
        self.indexes.push(index);
    }

    pub fn remove_index(&mut self, name: &str) -> Result<()> {
        let before = self.indexes.len();
        self.indexes.retain(|i| i.name() != name);
        if self.indexes.len() == before {
            return Err(DbError::NotFound(format!("Requested index '{}' does not exist.", name)));
        }
        self.schema.indexes.retain(|i| i.name != name);
        Ok(())
    }

    pub fn stream(&self) -> Option<&StreamLog> {
        self.stream.as_ref()
    }

    /// Starts a new stream, or changes retention of the running one.
    pub fn enable_stream(&mut self, expiration_hours: i64, now: i64) {
        match &mut self.stream {
            Some(stream) => stream.set_expiration_hours(expiration_hours),
            None => self.stream = Some(StreamLog::new(&self.schema.meta.name, expiration_hours, now)),
        }
    }

    pub fn disable_stream(&mut self) {
        self.stream = None;
    }

    fn mutate<F>(
        &mut self,
        pk: &PrimaryKey,
        condition: RowExistence,
        now: i64,
        record_type: StreamRecordType,
        columns: Vec<RecordColumn>,
        apply: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut VersionedCells, &TableOptions),
    {
        let options = self.schema.options;
        let exists = self.cells.is_live(pk, &options, now);
        match condition {
            RowExistence::ExpectExist if !exists => {
                return Err(DbError::ConditionCheckFail("Condition check failed.".into()));
            }
            RowExistence::ExpectNotExist if exists => {
                return Err(DbError::ConditionCheckFail("Condition check failed.".into()));
            }
            _ => {}
        }

        let latest = ReadOptions::latest(&[]);
        let before = if self.indexes.is_empty() {
            None
        } else {
            self.cells.read_row(pk, &latest, &options, now)
        };

        apply(&mut self.cells, &options);

        if !self.indexes.is_empty() {
            let after = self.cells.read_row(pk, &latest, &options, now);
            for index in &mut self.indexes {
                index.apply(before.as_ref(), after.as_ref(), now, &options);
            }
        }
        if let Some(stream) = &mut self.stream {
            stream.append(record_type, pk.clone(), columns, now);
        }
        Ok(())
    }

    fn validate_column_name(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.len() > self.max_column_name_bytes {
            return Err(DbError::invalid(format!(
                "The length of attribute column name must be in range: [1, {}].",
                self.max_column_name_bytes
            )));
        }
        if self.schema.meta.primary_key_column(name).is_some() {
            return Err(DbError::invalid(format!(
                "Attribute column '{}' conflicts with primary key.",
                name
            )));
        }
        Ok(())
    }

    fn validate_cells(&self, cells: &[Cell]) -> Result<()> {
        for cell in cells {
            self.validate_column_name(&cell.name)?;
            if let Some(defined) = self.schema.meta.defined_column(&cell.name)
                && defined.column_type != cell.value.column_type()
            {
                return Err(DbError::invalid(format!(
                    "The type of defined column '{}' must be {}.",
                    cell.name, defined.column_type
                )));
            }
        }
        Ok(())
    }
}

fn stamp(cells: &[Cell], now: i64) -> Vec<Cell> {
    cells
        .iter()
        .map(|c| Cell {
            timestamp: Some(stamp_of(c, now)),
            ..c.clone()
        })
        .collect()
}

fn stamp_of(cell: &Cell, now: i64) -> i64 {
    cell.timestamp.unwrap_or(now)
}

/// Checks a key against a schema. Range bounds may use `INF_MIN`/`INF_MAX`.
pub fn validate_primary_key(
    schema: &[PrimaryKeySchema],
    pk: &PrimaryKey,
    allow_infinite: bool,
) -> Result<()> {
    if pk.len() != schema.len() {
        return Err(DbError::invalid(format!(
            "Validate PK size fail. Input: {}, Meta: {}.",
            pk.len(),
            schema.len()
        )));
    }
    for (column, expected) in pk.columns().iter().zip(schema) {
        if column.name != expected.name {
            return Err(DbError::invalid(format!(
                "Validate PK name fail. Input: {}, Meta: {}.",
                column.name, expected.name
            )));
        }
        if column.value.is_infinite() {
            if !allow_infinite {
                return Err(DbError::invalid("INF_MIN or INF_MAX is not allowed in a row key."));
            }
            continue;
        }
        if !expected.key_type.accepts(&column.value) {
            let input = column.value.key_type().map(|t| t.name()).unwrap_or("INF");
            return Err(DbError::invalid(format!(
                "Validate PK type fail. Input: {}, Meta: {}.",
                input, expected.key_type
            )));
        }
    }
    Ok(())
}
