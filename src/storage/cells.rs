//! Ordered multi-version cell map.
//!
//! Every version lives under one composite key `(primary key, column,
//! Reverse(timestamp))`, so a row's cells are contiguous, columns are ordered
//! by name and versions by timestamp descending. Range scans and version
//! eviction are plain `BTreeMap` range operations.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included};
use crate::core::{Cell, ColumnValue, Direction, PrimaryKey, Row, TableOptions, TimeRange};

type CellKey = (PrimaryKey, String, Reverse<i64>);

/// Per-cell bookkeeping overhead counted by the size estimate.
const CELL_OVERHEAD_BYTES: u64 = 8;

/// What a read wants back from a row.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions<'a> {
    /// Empty means every column.
    pub columns: &'a [String],
    pub max_versions: usize,
    pub time_range: Option<TimeRange>,
}

impl<'a> ReadOptions<'a> {
    pub fn latest(columns: &'a [String]) -> Self {
        Self {
            columns,
            max_versions: 1,
            time_range: None,
        }
    }
}

/// One page of a range scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub rows: Vec<Row>,
    pub next_start_primary_key: Option<PrimaryKey>,
}

#[derive(Debug, Clone, Default)]
pub struct VersionedCells {
    cells: BTreeMap<CellKey, ColumnValue>,
    /// Approximate byte size of every physically present row. The splitter
    /// only looks at this map.
    row_sizes: BTreeMap<PrimaryKey, u64>,
    /// Keep rows that have a key but no cells (index entries without
    /// attribute columns).
    retain_empty_rows: bool,
    /// Newest source timestamp of each retained row; a cell-less row is
    /// live only while this stamp is not expired.
    row_stamps: BTreeMap<PrimaryKey, i64>,
}

impl VersionedCells {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_empty_rows() -> Self {
        Self {
            retain_empty_rows: true,
            ..Self::default()
        }
    }

    /// Replaces the whole row with `cells`.
    pub fn put_row(&mut self, pk: &PrimaryKey, cells: &[Cell], now: i64, options: &TableOptions) {
        self.remove_row_cells(pk);
        for cell in cells {
            self.insert(pk, cell, now);
        }
        for name in distinct_names(cells) {
            self.trim_column(pk, &name, options, now);
        }
        self.refresh_row_size(pk);
    }

    /// Replaces the whole row and records `stamp` as the time the row was
    /// last written at its source.
    pub fn put_stamped_row(
        &mut self,
        pk: &PrimaryKey,
        cells: &[Cell],
        stamp: i64,
        now: i64,
        options: &TableOptions,
    ) {
        self.put_row(pk, cells, now, options);
        if self.retain_empty_rows {
            self.row_stamps.insert(pk.clone(), stamp);
        }
    }

    pub fn update_row(
        &mut self,
        pk: &PrimaryKey,
        puts: &[Cell],
        delete_columns: &[String],
        delete_cells: &[(String, i64)],
        now: i64,
        options: &TableOptions,
    ) {
        for name in delete_columns {
            self.remove_column(pk, name);
        }
        for (name, ts) in delete_cells {
            self.cells.remove(&(pk.clone(), name.clone(), Reverse(*ts)));
        }
        for cell in puts {
            self.insert(pk, cell, now);
        }
        for name in distinct_names(puts) {
            self.trim_column(pk, &name, options, now);
        }
        self.refresh_row_size(pk);
    }

    pub fn delete_row(&mut self, pk: &PrimaryKey) {
        self.remove_row_cells(pk);
        self.row_sizes.remove(pk);
        self.row_stamps.remove(pk);
    }

    pub fn read_row(
        &self,
        pk: &PrimaryKey,
        read: &ReadOptions<'_>,
        options: &TableOptions,
        now: i64,
    ) -> Option<Row> {
        let mut cells = Vec::new();
        let mut current: Option<&str> = None;
        let mut taken = 0usize;
        let max_versions = read.max_versions.min(options.max_versions);

        for ((_, name, Reverse(ts)), value) in self.row_range(pk) {
            if !read.columns.is_empty() && !read.columns.iter().any(|c| c == name) {
                continue;
            }
            if options.is_expired(*ts, now) {
                continue;
            }
            if let Some(range) = read.time_range
                && !range.contains(*ts)
            {
                continue;
            }
            if current != Some(name.as_str()) {
                current = Some(name.as_str());
                taken = 0;
            }
            if taken >= max_versions {
                continue;
            }
            taken += 1;
            cells.push(Cell {
                name: name.clone(),
                value: value.clone(),
                timestamp: Some(*ts),
            });
        }

        if cells.is_empty() && !self.has_live_stamp(pk, options, now) {
            None
        } else {
            Some(Row {
                primary_key: pk.clone(),
                cells,
            })
        }
    }

    /// Whether the row has at least one live cell.
    pub fn is_live(&self, pk: &PrimaryKey, options: &TableOptions, now: i64) -> bool {
        if self.has_live_stamp(pk, options, now) {
            return true;
        }
        self.row_range(pk)
            .any(|((_, _, Reverse(ts)), _)| !options.is_expired(*ts, now))
    }

    /// Scans `[start, end)` forward, or `(end, start]` backward, returning at
    /// most `limit` live rows and the key to resume from.
    #[allow(clippy::too_many_arguments)]
    pub fn scan(
        &self,
        start: &PrimaryKey,
        end: &PrimaryKey,
        direction: Direction,
        limit: usize,
        read: &ReadOptions<'_>,
        options: &TableOptions,
        now: i64,
    ) -> ScanPage {
        let mut page = ScanPage::default();
        let keys: Box<dyn Iterator<Item = &PrimaryKey>> = match direction {
            Direction::Forward if start <= end => Box::new(
                self.row_sizes
                    .range((Included(start), Excluded(end)))
                    .map(|(k, _)| k),
            ),
            Direction::Backward if end <= start => Box::new(
                self.row_sizes
                    .range((Excluded(end), Included(start)))
                    .rev()
                    .map(|(k, _)| k),
            ),
            _ => return page,
        };

        for pk in keys {
            if page.rows.len() >= limit {
                page.next_start_primary_key = Some(pk.clone());
                break;
            }
            if let Some(row) = self.read_row(pk, read, options, now) {
                page.rows.push(row);
            }
        }
        page
    }

    /// Row keys with their estimated sizes, in key order.
    pub fn row_sizes(&self) -> impl Iterator<Item = (&PrimaryKey, u64)> {
        self.row_sizes.iter().map(|(k, v)| (k, *v))
    }

    pub fn total_size(&self) -> u64 {
        self.row_sizes.values().sum()
    }

    pub fn row_count(&self) -> usize {
        self.row_sizes.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PrimaryKey> {
        self.row_sizes.keys()
    }

    fn has_live_stamp(&self, pk: &PrimaryKey, options: &TableOptions, now: i64) -> bool {
        self.retain_empty_rows
            && self
                .row_stamps
                .get(pk)
                .is_some_and(|ts| !options.is_expired(*ts, now))
    }

    fn insert(&mut self, pk: &PrimaryKey, cell: &Cell, now: i64) {
        let ts = cell.timestamp.unwrap_or(now);
        self.cells
            .insert((pk.clone(), cell.name.clone(), Reverse(ts)), cell.value.clone());
    }

    fn row_range<'a>(
        &'a self,
        pk: &'a PrimaryKey,
    ) -> impl Iterator<Item = (&'a CellKey, &'a ColumnValue)> + 'a {
        self.cells
            .range((pk.clone(), String::new(), Reverse(i64::MAX))..)
            .take_while(move |((k, _, _), _)| k == pk)
    }

    fn column_keys(&self, pk: &PrimaryKey, name: &str) -> Vec<CellKey> {
        let from = (pk.clone(), name.to_string(), Reverse(i64::MAX));
        let to = (pk.clone(), name.to_string(), Reverse(i64::MIN));
        self.cells.range(from..=to).map(|(k, _)| k.clone()).collect()
    }

    fn remove_column(&mut self, pk: &PrimaryKey, name: &str) {
        for key in self.column_keys(pk, name) {
            self.cells.remove(&key);
        }
    }

    fn remove_row_cells(&mut self, pk: &PrimaryKey) {
        let keys: Vec<CellKey> = self.row_range(pk).map(|(k, _)| k.clone()).collect();
        for key in keys {
            self.cells.remove(&key);
        }
    }

    /// Drops expired versions and everything beyond `max_versions`, oldest
    /// first.
    fn trim_column(&mut self, pk: &PrimaryKey, name: &str, options: &TableOptions, now: i64) {
        let keys = self.column_keys(pk, name);
        let mut kept = 0usize;
        for key in keys {
            let Reverse(ts) = key.2;
            if kept < options.max_versions && !options.is_expired(ts, now) {
                kept += 1;
            } else {
                self.cells.remove(&key);
            }
        }
    }

    fn refresh_row_size(&mut self, pk: &PrimaryKey) {
        let key_size = pk.size_in_bytes() as u64;
        let mut size = 0u64;
        let mut present = false;
        for ((_, name, _), value) in self.row_range(pk) {
            present = true;
            size += name.len() as u64 + value.size_in_bytes() as u64 + CELL_OVERHEAD_BYTES;
        }
        if present || self.retain_empty_rows {
            self.row_sizes.insert(pk.clone(), key_size + size);
        } else {
            self.row_sizes.remove(pk);
        }
    }
}

fn distinct_names(cells: &[Cell]) -> Vec<String> {
    let mut names: Vec<String> = cells.iter().map(|c| c.name.clone()).collect();
    names.sort();
    names.dedup();
    names
}
