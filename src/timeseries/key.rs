//! Lowering of timeseries rows onto the wide-column row format.
//!
//! A timeseries table is an ordinary table whose primary key is
//! `[_#h, <key parts...>, _time, <field primary keys...>]`. `_#h` buckets
//! series by a hash of the key parts so writes of one measurement spread
//! over the key space.

use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;
use crate::core::{
    Cell, DbError, PrimaryKey, PrimaryKeyColumn, PrimaryKeySchema, PrimaryKeyType,
    PrimaryKeyValue, Result, Row, TableMeta,
};
use super::model::{TimeseriesKey, TimeseriesRow, TimeseriesTableMeta};

pub const HASH_COLUMN: &str = "_#h";
pub const MEASUREMENT_COLUMN: &str = "_m_name";
pub const DATA_SOURCE_COLUMN: &str = "_data_source";
pub const TAGS_COLUMN: &str = "_tags";
pub const TIME_COLUMN: &str = "_time";

const RESERVED: [&str; 5] = [
    HASH_COLUMN,
    MEASUREMENT_COLUMN,
    DATA_SOURCE_COLUMN,
    TAGS_COLUMN,
    TIME_COLUMN,
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyPart {
    Measurement,
    DataSource,
    Tags,
    Tag(String),
}

impl KeyPart {
    fn column(&self) -> &str {
        match self {
            Self::Measurement => MEASUREMENT_COLUMN,
            Self::DataSource => DATA_SOURCE_COLUMN,
            Self::Tags => TAGS_COLUMN,
            Self::Tag(name) => name,
        }
    }
}

/// Key layout of one timeseries table.
#[derive(Debug, Clone)]
pub struct KeyLayout {
    parts: Vec<KeyPart>,
    field_primary_keys: Vec<PrimaryKeySchema>,
    disable_measurement_name: bool,
}

impl KeyLayout {
    pub fn new(meta: &TimeseriesTableMeta) -> Result<Self> {
        if meta.disable_measurement_name && meta.timeseries_keys.is_empty() {
            return Err(DbError::invalid(
                "disable_measurement_name requires custom timeseries keys.",
            ));
        }

        let mut seen = HashSet::new();
        let mut parts = Vec::new();
        if meta.timeseries_keys.is_empty() {
            parts.extend([KeyPart::Measurement, KeyPart::DataSource, KeyPart::Tags]);
        } else {
            if !meta.disable_measurement_name {
                parts.push(KeyPart::Measurement);
            }
            for key in &meta.timeseries_keys {
                if key.is_empty() || !seen.insert(key.as_str()) {
                    return Err(DbError::invalid(format!("Invalid timeseries key: '{}'.", key)));
                }
                if key == DATA_SOURCE_COLUMN {
                    parts.push(KeyPart::DataSource);
                } else if RESERVED.contains(&key.as_str()) {
                    return Err(DbError::invalid(format!("Invalid timeseries key: '{}'.", key)));
                } else {
                    parts.push(KeyPart::Tag(key.clone()));
                }
            }
        }

        for field in &meta.field_primary_keys {
            if field.name.is_empty()
                || RESERVED.contains(&field.name.as_str())
                || !seen.insert(field.name.as_str())
            {
                return Err(DbError::invalid(format!(
                    "Invalid field primary key: '{}'.",
                    field.name
                )));
            }
        }

        Ok(Self {
            parts,
            field_primary_keys: meta.field_primary_keys.clone(),
            disable_measurement_name: meta.disable_measurement_name,
        })
    }

    pub fn primary_key_schema(&self) -> Vec<PrimaryKeySchema> {
        let mut schema = vec![PrimaryKeySchema::new(HASH_COLUMN, PrimaryKeyType::String)];
        schema.extend(
            self.parts
                .iter()
                .map(|p| PrimaryKeySchema::new(p.column(), PrimaryKeyType::String)),
        );
        schema.push(PrimaryKeySchema::new(TIME_COLUMN, PrimaryKeyType::Integer));
        schema.extend(self.field_primary_keys.iter().cloned());
        schema
    }

    /// Backing table definition.
    pub fn table_meta(&self, name: &str) -> TableMeta {
        TableMeta {
            name: name.to_string(),
            primary_key: self.primary_key_schema(),
            defined_columns: Vec::new(),
        }
    }

    /// Key columns up to and excluding `_time`.
    pub fn series_prefix(&self, key: &TimeseriesKey) -> Result<Vec<PrimaryKeyColumn>> {
        validate_key(key, self.disable_measurement_name)?;
        let mut values = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            let value = match part {
                KeyPart::Measurement => key.measurement_name.clone(),
                KeyPart::DataSource => key.data_source.clone(),
                KeyPart::Tags => serialize_tags(&key.tags),
                KeyPart::Tag(name) => key.tags.get(name).cloned().ok_or_else(|| {
                    DbError::invalid(format!("Tag '{}' is required by the timeseries key.", name))
                })?,
            };
            values.push(value);
        }

        let mut prefix = vec![PrimaryKeyColumn::new(HASH_COLUMN, hash_bucket(&values))];
        prefix.extend(
            self.parts
                .iter()
                .zip(values)
                .map(|(part, value)| PrimaryKeyColumn::new(part.column(), value)),
        );
        Ok(prefix)
    }

    /// Key of `key` at `time_in_us` with every field primary key set to
    /// `fill`; used as a range bound.
    pub fn time_bound(
        &self,
        key: &TimeseriesKey,
        time_in_us: i64,
        fill: PrimaryKeyValue,
    ) -> Result<PrimaryKey> {
        let mut columns = self.series_prefix(key)?;
        columns.push(PrimaryKeyColumn::new(TIME_COLUMN, time_in_us));
        columns.extend(
            self.field_primary_keys
                .iter()
                .map(|f| PrimaryKeyColumn::new(&f.name, fill.clone())),
        );
        Ok(PrimaryKey::new(columns))
    }

    /// Primary key and attribute cells of a data point.
    pub fn encode(&self, row: &TimeseriesRow) -> Result<(PrimaryKey, Vec<Cell>)> {
        if row.time_in_us < 0 {
            return Err(DbError::invalid("time_in_us must not be negative."));
        }
        let mut columns = self.series_prefix(&row.key)?;
        columns.push(PrimaryKeyColumn::new(TIME_COLUMN, row.time_in_us));
        for field in &self.field_primary_keys {
            let value = row.fields.get(&field.name).ok_or_else(|| {
                DbError::invalid(format!("Field primary key '{}' is missing.", field.name))
            })?;
            let key_value = PrimaryKeyValue::from_column_value(value)
                .filter(|v| field.key_type.accepts(v))
                .ok_or_else(|| {
                    DbError::invalid(format!(
                        "The type of field primary key '{}' must be {}.",
                        field.name, field.key_type
                    ))
                })?;
            columns.push(PrimaryKeyColumn::new(&field.name, key_value));
        }

        let timestamp = row.time_in_us / 1000;
        let mut cells = Vec::new();
        for (name, value) in &row.fields {
            if self.field_primary_keys.iter().any(|f| &f.name == name) {
                continue;
            }
            if name.is_empty() || RESERVED.contains(&name.as_str()) || self.is_key_column(name) {
                return Err(DbError::invalid(format!("Invalid field name: '{}'.", name)));
            }
            cells.push(Cell::new(name, value.clone()).with_timestamp(timestamp));
        }
        if cells.is_empty() {
            return Err(DbError::invalid("Timeseries row must contain at least one field."));
        }

        if !self.parts.contains(&KeyPart::DataSource) && !row.key.data_source.is_empty() {
            cells.push(Cell::new(DATA_SOURCE_COLUMN, row.key.data_source.as_str()).with_timestamp(timestamp));
        }
        if !self.parts.contains(&KeyPart::Tags) {
            let rest: BTreeMap<String, String> = row
                .key
                .tags
                .iter()
                .filter(|(name, _)| !self.parts.contains(&KeyPart::Tag((*name).clone())))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if !rest.is_empty() {
                cells.push(Cell::new(TAGS_COLUMN, serialize_tags(&rest)).with_timestamp(timestamp));
            }
        }

        Ok((PrimaryKey::new(columns), cells))
    }

    /// Rebuilds a data point from a stored row.
    pub fn decode(&self, row: &Row) -> Result<TimeseriesRow> {
        let mut key = TimeseriesKey::default();
        let mut time_in_us = 0;
        let mut fields = BTreeMap::new();

        for column in row.primary_key.columns() {
            match column.name.as_str() {
                HASH_COLUMN => {}
                MEASUREMENT_COLUMN => key.measurement_name = column.value.as_string()?.to_string(),
                DATA_SOURCE_COLUMN => key.data_source = column.value.as_string()?.to_string(),
                TAGS_COLUMN => key.tags.extend(parse_tags(column.value.as_string()?)?),
                TIME_COLUMN => time_in_us = column.value.as_integer()?,
                name if self.field_primary_keys.iter().any(|f| f.name == name) => {
                    if let Some(value) = column.value.to_column_value() {
                        fields.insert(name.to_string(), value);
                    }
                }
                name => {
                    key.tags
                        .insert(name.to_string(), column.value.as_string()?.to_string());
                }
            }
        }

        for cell in &row.cells {
            match cell.name.as_str() {
                DATA_SOURCE_COLUMN => key.data_source = cell.value.as_string()?.to_string(),
                TAGS_COLUMN => key.tags.extend(parse_tags(cell.value.as_string()?)?),
                name => {
                    // cells are newest first per column
                    fields
                        .entry(name.to_string())
                        .or_insert_with(|| cell.value.clone());
                }
            }
        }

        Ok(TimeseriesRow {
            key,
            time_in_us,
            fields,
        })
    }

    /// Attribute columns that carry key parts outside the primary key.
    pub fn key_attribute_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        if !self.parts.contains(&KeyPart::DataSource) {
            columns.push(DATA_SOURCE_COLUMN.to_string());
        }
        if !self.parts.contains(&KeyPart::Tags) {
            columns.push(TAGS_COLUMN.to_string());
        }
        columns
    }

    fn is_key_column(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.column() == name)
    }
}

fn validate_key(key: &TimeseriesKey, disable_measurement_name: bool) -> Result<()> {
    if disable_measurement_name {
        if !key.measurement_name.is_empty() {
            return Err(DbError::invalid(
                "Measurement name must be empty when it is disabled for the table.",
            ));
        }
    } else if key.measurement_name.is_empty() {
        return Err(DbError::invalid("Measurement name must not be empty."));
    }
    for (name, value) in &key.tags {
        if name.is_empty() || [name, value].iter().any(|s| s.contains(['=', ',', '[', ']'])) {
            return Err(DbError::invalid(format!("Invalid tag: '{}={}'.", name, value)));
        }
    }
    Ok(())
}

/// `[k1=v1,k2=v2]`, sorted by tag name.
pub fn serialize_tags(tags: &BTreeMap<String, String>) -> String {
    let body: Vec<String> = tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("[{}]", body.join(","))
}

pub fn parse_tags(raw: &str) -> Result<BTreeMap<String, String>> {
    let invalid = || DbError::invalid(format!("Invalid tags: '{}'.", raw));
    let body = raw
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(invalid)?;
    let mut tags = BTreeMap::new();
    if body.is_empty() {
        return Ok(tags);
    }
    for pair in body.split(',') {
        let (k, v) = pair.split_once('=').ok_or_else(invalid)?;
        tags.insert(k.to_string(), v.to_string());
    }
    Ok(tags)
}

/// Four hex chars from a name-based UUID of the key parts.
fn hash_bucket(values: &[String]) -> String {
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, values.join("\u{1}").as_bytes());
    let bytes = id.as_bytes();
    format!("{:02x}{:02x}", bytes[0], bytes[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_row() -> TimeseriesRow {
        TimeseriesRow::new(
            TimeseriesKey::new("cpu", "host_0")
                .with_tag("region", "hangzhou")
                .with_tag("vendor", "intel"),
            1_000_000,
        )
        .with_field("cores", 8_i64)
        .with_field("frequency", "2.0GHz")
    }

    #[test]
    fn test_default_layout() {
        let layout = KeyLayout::new(&TimeseriesTableMeta::new("ts")).unwrap();
        let names: Vec<String> = layout.primary_key_schema().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["_#h", "_m_name", "_data_source", "_tags", "_time"]);

        let (pk, cells) = layout.encode(&cpu_row()).unwrap();
        assert_eq!(
            pk.get(TAGS_COLUMN),
            Some(&PrimaryKeyValue::from("[region=hangzhou,vendor=intel]"))
        );
        assert_eq!(pk.get(HASH_COLUMN).unwrap().as_string().unwrap().len(), 4);
        assert!(cells.iter().all(|c| c.timestamp == Some(1000)));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let layout = KeyLayout::new(&TimeseriesTableMeta::new("ts")).unwrap();
        let a = layout.series_prefix(&cpu_row().key).unwrap();
        let b = layout.series_prefix(&cpu_row().key).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_restores_row() {
        let layout = KeyLayout::new(&TimeseriesTableMeta::new("ts")).unwrap();
        let (pk, cells) = layout.encode(&cpu_row()).unwrap();
        let decoded = layout
            .decode(&Row {
                primary_key: pk,
                cells,
            })
            .unwrap();
        assert_eq!(decoded, cpu_row());
    }

    #[test]
    fn test_custom_keys_keep_remaining_tags_as_attribute() {
        let meta = TimeseriesTableMeta::new("ts")
            .with_timeseries_key("region")
            .with_field_primary_key(PrimaryKeySchema::new("cores", PrimaryKeyType::Integer));
        let layout = KeyLayout::new(&meta).unwrap();
        let names: Vec<String> = layout.primary_key_schema().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["_#h", "_m_name", "region", "_time", "cores"]);

        let (pk, cells) = layout.encode(&cpu_row()).unwrap();
        assert_eq!(pk.get("cores"), Some(&PrimaryKeyValue::Integer(8)));
        let attr: Vec<&str> = cells.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(attr, vec!["frequency", "_data_source", "_tags"]);

        let decoded = layout
            .decode(&Row {
                primary_key: pk,
                cells,
            })
            .unwrap();
        assert_eq!(decoded, cpu_row());
    }

    #[test]
    fn test_invalid_layouts_and_rows() {
        let err = KeyLayout::new(&TimeseriesTableMeta::new("ts").without_measurement_name())
            .unwrap_err();
        assert_eq!(err.code(), "OTSParameterInvalid");
        assert!(KeyLayout::new(&TimeseriesTableMeta::new("ts").with_timeseries_key("_time")).is_err());

        let layout = KeyLayout::new(&TimeseriesTableMeta::new("ts")).unwrap();
        let empty = TimeseriesRow::new(TimeseriesKey::new("cpu", "h"), 1);
        assert!(layout.encode(&empty).is_err());
        let bad_tag = TimeseriesRow::new(TimeseriesKey::new("cpu", "h").with_tag("a=b", "c"), 1)
            .with_field("v", 1_i64);
        assert!(layout.encode(&bad_tag).is_err());
    }

    #[test]
    fn test_tags_round_trip_empty() {
        assert_eq!(serialize_tags(&BTreeMap::new()), "[]");
        assert!(parse_tags("[]").unwrap().is_empty());
        assert!(parse_tags("region=x").is_err());
    }
}
