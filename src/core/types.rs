use std::cmp::Ordering;
use serde::{Deserialize, Serialize};
use super::{ColumnType, ColumnValue, PrimaryKeyType, PrimaryKeyValue};

/// Upper bound for `max_versions` reads that want every retained version.
pub const ALL_VERSIONS: usize = usize::MAX;

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Wall-clock microseconds since the Unix epoch.
pub fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryKeyColumn {
    pub name: String,
    pub value: PrimaryKeyValue,
}

impl PrimaryKeyColumn {
    pub fn new(name: impl Into<String>, value: impl Into<PrimaryKeyValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn inf_min(name: impl Into<String>) -> Self {
        Self::new(name, PrimaryKeyValue::InfMin)
    }

    pub fn inf_max(name: impl Into<String>) -> Self {
        Self::new(name, PrimaryKeyValue::InfMax)
    }
}

/// Ordered primary key. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryKey {
    columns: Vec<PrimaryKeyColumn>,
}

impl PrimaryKey {
    pub fn new(columns: Vec<PrimaryKeyColumn>) -> Self {
        Self { columns }
    }

    pub fn builder() -> PrimaryKeyBuilder {
        PrimaryKeyBuilder::default()
    }

    pub fn columns(&self) -> &[PrimaryKeyColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PrimaryKeyValue> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.value)
    }

    /// A key of the given schema with every column set to `INF_MIN`.
    pub fn inf_min(schema: &[PrimaryKeySchema]) -> Self {
        Self::new(schema.iter().map(|s| PrimaryKeyColumn::inf_min(&s.name)).collect())
    }

    /// A key of the given schema with every column set to `INF_MAX`.
    pub fn inf_max(schema: &[PrimaryKeySchema]) -> Self {
        Self::new(schema.iter().map(|s| PrimaryKeyColumn::inf_max(&s.name)).collect())
    }

    pub fn size_in_bytes(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.name.len() + c.value.size_in_bytes())
            .sum()
    }
}

impl Ord for PrimaryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.columns.iter().zip(other.columns.iter()) {
            match a.value.cmp(&b.value) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        self.columns
            .len()
            .cmp(&other.columns.len())
            .then_with(|| {
                self.columns
                    .iter()
                    .map(|c| &c.name)
                    .cmp(other.columns.iter().map(|c| &c.name))
            })
    }
}

impl PartialOrd for PrimaryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct PrimaryKeyBuilder {
    columns: Vec<PrimaryKeyColumn>,
}

impl PrimaryKeyBuilder {
    pub fn add(mut self, name: impl Into<String>, value: impl Into<PrimaryKeyValue>) -> Self {
        self.columns.push(PrimaryKeyColumn::new(name, value));
        self
    }

    pub fn inf_min(mut self, name: impl Into<String>) -> Self {
        self.columns.push(PrimaryKeyColumn::inf_min(name));
        self
    }

    pub fn inf_max(mut self, name: impl Into<String>) -> Self {
        self.columns.push(PrimaryKeyColumn::inf_max(name));
        self
    }

    pub fn build(self) -> PrimaryKey {
        PrimaryKey::new(self.columns)
    }
}

/// One version of one column.
///
/// `timestamp` is optional on writes (the store stamps the current time) and
/// always set on reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub name: String,
    pub value: ColumnValue,
    pub timestamp: Option<i64>,
}

impl Cell {
    pub fn new(name: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub primary_key: PrimaryKey,
    /// Ordered by column name, then by timestamp descending.
    pub cells: Vec<Cell>,
}

impl Row {
    /// Newest version of a column.
    pub fn latest(&self, name: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.name == name)
    }

    pub fn latest_value(&self, name: &str) -> Option<&ColumnValue> {
        self.latest(name).map(|c| &c.value)
    }

    pub fn versions(&self, name: &str) -> Vec<&Cell> {
        self.cells.iter().filter(|c| c.name == name).collect()
    }

    /// Distinct column names in row order.
    pub fn column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for cell in &self.cells {
            if names.last() != Some(&cell.name.as_str()) {
                names.push(&cell.name);
            }
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeySchema {
    pub name: String,
    pub key_type: PrimaryKeyType,
}

impl PrimaryKeySchema {
    pub fn new(name: impl Into<String>, key_type: PrimaryKeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinedColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl DefinedColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    pub primary_key: Vec<PrimaryKeySchema>,
    pub defined_columns: Vec<DefinedColumnSchema>,
}

impl TableMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: Vec::new(),
            defined_columns: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, name: impl Into<String>, key_type: PrimaryKeyType) -> Self {
        self.primary_key.push(PrimaryKeySchema::new(name, key_type));
        self
    }

    pub fn with_defined_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.defined_columns.push(DefinedColumnSchema::new(name, column_type));
        self
    }

    pub fn defined_column(&self, name: &str) -> Option<&DefinedColumnSchema> {
        self.defined_columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_column(&self, name: &str) -> Option<&PrimaryKeySchema> {
        self.primary_key.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    /// Seconds; `-1` keeps data forever.
    pub time_to_live: i64,
    pub max_versions: usize,
}

impl TableOptions {
    pub fn new(time_to_live: i64, max_versions: usize) -> Self {
        Self {
            time_to_live,
            max_versions,
        }
    }

    /// Whether a cell written at `timestamp` is expired at `now` (both ms).
    pub fn is_expired(&self, timestamp: i64, now: i64) -> bool {
        self.time_to_live >= 0
            && timestamp.saturating_add(self.time_to_live.saturating_mul(1000)) < now
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            time_to_live: -1,
            max_versions: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub primary_key: Vec<String>,
    pub defined_columns: Vec<String>,
}

impl IndexMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: Vec::new(),
            defined_columns: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key.push(column.into());
        self
    }

    pub fn with_defined_column(mut self, column: impl Into<String>) -> Self {
        self.defined_columns.push(column.into());
        self
    }
}

/// Timestamp filter: `[start, end)` in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Row existence expectation checked before a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RowExistence {
    #[default]
    Ignore,
    ExpectExist,
    ExpectNotExist,
}
