//! Secondary index definitions and their shadow tables.

use std::collections::HashSet;
use crate::config::StoreConfig;
use crate::core::{
    Cell, DbError, IndexMeta, PrimaryKey, PrimaryKeyColumn, PrimaryKeySchema, PrimaryKeyType,
    PrimaryKeyValue, Result, Row, TableMeta, TableOptions,
};
use super::cells::{ReadOptions, VersionedCells};

/// Checks a table's defined-column count.
pub fn validate_defined_columns(meta: &TableMeta, config: &StoreConfig) -> Result<()> {
    if meta.defined_columns.len() > config.max_defined_columns {
        return Err(DbError::invalid(format!(
            "The number of defined columns must be in range: [0, {}].",
            config.max_defined_columns
        )));
    }
    Ok(())
}

/// Shape checks run before an index is accepted, in this order: index
/// primary key count, index attribute count, base defined-column count,
/// per-table quota. `existing` is the number of indexes already attached.
pub fn validate_index_shape(
    index: &IndexMeta,
    base: &TableMeta,
    existing: usize,
    config: &StoreConfig,
) -> Result<()> {
    let pk_count = index.primary_key.len();
    if pk_count == 0 || pk_count > config.max_index_primary_key_columns {
        return Err(DbError::invalid(format!(
            "The number of primary key columns must be in range: [1, {}] in index.",
            config.max_index_primary_key_columns
        )));
    }
    if index.defined_columns.len() > config.max_index_attribute_columns {
        return Err(DbError::invalid(format!(
            "The number of attribute columns must be in range: [0, {}] in index.",
            config.max_index_attribute_columns
        )));
    }
    validate_defined_columns(base, config)?;
    if existing + 1 > config.index_quota {
        return Err(DbError::invalid(format!(
            "Number of index per table exceeds the quota:{}.",
            config.index_quota
        )));
    }
    Ok(())
}

/// Derived table kept in sync with its base table.
#[derive(Debug, Clone)]
pub struct IndexTable {
    meta: IndexMeta,
    /// Index key columns followed by the base key columns they don't cover.
    primary_key: Vec<PrimaryKeySchema>,
    cells: VersionedCells,
}

impl IndexTable {
    /// Resolves the index key schema against the base table.
    pub fn new(meta: IndexMeta, base: &TableMeta) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut primary_key = Vec::with_capacity(meta.primary_key.len() + base.primary_key.len());

        for column in &meta.primary_key {
            if !seen.insert(column.as_str()) {
                return Err(DbError::invalid(format!(
                    "Duplicate primary key column '{}' in index.",
                    column
                )));
            }
            let key_type = if let Some(pk) = base.primary_key_column(column) {
                pk.key_type
            } else if let Some(defined) = base.defined_column(column) {
                PrimaryKeyType::from_column_type(defined.column_type).ok_or_else(|| {
                    DbError::invalid(format!(
                        "Column '{}' of type {} cannot be an index primary key.",
                        column, defined.column_type
                    ))
                })?
            } else {
                return Err(DbError::invalid(format!(
                    "Column '{}' in index primary key is neither a primary key nor a defined column.",
                    column
                )));
            };
            primary_key.push(PrimaryKeySchema::new(column.clone(), key_type));
        }

        for column in &meta.defined_columns {
            if base.defined_column(column).is_none() {
                return Err(DbError::invalid(format!(
                    "Attribute column '{}' in index is not a defined column.",
                    column
                )));
            }
        }

        for pk in &base.primary_key {
            if !seen.contains(pk.name.as_str()) {
                primary_key.push(pk.clone());
            }
        }

        Ok(Self {
            meta,
            primary_key,
            cells: VersionedCells::with_empty_rows(),
        })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn primary_key(&self) -> &[PrimaryKeySchema] {
        &self.primary_key
    }

    pub fn cells(&self) -> &VersionedCells {
        &self.cells
    }

    /// Index options: one version, expiry follows the base table.
    pub fn options(base: &TableOptions) -> TableOptions {
        TableOptions::new(base.time_to_live, 1)
    }

    /// Replaces the index entry of one base row. `before` and `after` are
    /// latest-version views of the row around a mutation.
    pub fn apply(&mut self, before: Option<&Row>, after: Option<&Row>, now: i64, base: &TableOptions) {
        let old = before.and_then(|row| self.entry_for(row));
        let new = after.and_then(|row| self.entry_for(row));
        if let Some((old_key, _)) = &old
            && new.as_ref().map(|(k, _)| k) != Some(old_key)
        {
            self.cells.delete_row(old_key);
        }
        if let (Some((new_key, cells)), Some(row)) = (new, after) {
            let stamp = row
                .cells
                .iter()
                .filter_map(|c| c.timestamp)
                .max()
                .unwrap_or(now);
            self.cells
                .put_stamped_row(&new_key, &cells, stamp, now, &Self::options(base));
        }
    }

    /// Builds the index from existing base rows.
    pub fn backfill(&mut self, base: &VersionedCells, base_options: &TableOptions, now: i64) {
        let read = ReadOptions::latest(&[]);
        let rows: Vec<Row> = base
            .keys()
            .filter_map(|pk| base.read_row(pk, &read, base_options, now))
            .collect();
        for row in &rows {
            self.apply(None, Some(row), now, base_options);
        }
    }

    fn entry_for(&self, row: &Row) -> Option<(PrimaryKey, Vec<Cell>)> {
        let mut key = Vec::with_capacity(self.primary_key.len());
        for schema in &self.primary_key {
            let value = match row.primary_key.get(&schema.name) {
                Some(v) => v.clone(),
                None => PrimaryKeyValue::from_column_value(row.latest_value(&schema.name)?)?,
            };
            if !schema.key_type.accepts(&value) {
                return None;
            }
            key.push(PrimaryKeyColumn::new(schema.name.clone(), value));
        }

        let cells = self
            .meta
            .defined_columns
            .iter()
            .filter_map(|name| row.latest(name).cloned())
            .collect();
        Some((PrimaryKey::new(key), cells))
    }
}
