use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::core::{ColumnValue, PrimaryKeySchema};

/// Identity of one series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TimeseriesKey {
    pub measurement_name: String,
    pub data_source: String,
    pub tags: BTreeMap<String, String>,
}

impl TimeseriesKey {
    pub fn new(measurement_name: impl Into<String>, data_source: impl Into<String>) -> Self {
        Self {
            measurement_name: measurement_name.into(),
            data_source: data_source.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }
}

/// One data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesRow {
    pub key: TimeseriesKey,
    pub time_in_us: i64,
    pub fields: BTreeMap<String, ColumnValue>,
}

impl TimeseriesRow {
    pub fn new(key: TimeseriesKey, time_in_us: i64) -> Self {
        Self {
            key,
            time_in_us,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeseriesTableOptions {
    /// Seconds; `-1` keeps data forever.
    pub time_to_live: i64,
}

impl Default for TimeseriesTableOptions {
    fn default() -> Self {
        Self { time_to_live: -1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeseriesMetaOptions {
    /// Seconds since the last update after which a meta entry disappears.
    pub meta_time_to_live: i64,
    pub allow_update_attributes: bool,
}

impl Default for TimeseriesMetaOptions {
    fn default() -> Self {
        Self {
            meta_time_to_live: -1,
            allow_update_attributes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeseriesTableMeta {
    pub name: String,
    pub options: TimeseriesTableOptions,
    pub meta_options: TimeseriesMetaOptions,
    /// Custom key parts: tag names or `_data_source`. Empty selects the
    /// default layout.
    pub timeseries_keys: Vec<String>,
    /// Fields promoted into the primary key after `_time`.
    pub field_primary_keys: Vec<PrimaryKeySchema>,
    pub disable_measurement_name: bool,
}

impl TimeseriesTableMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: TimeseriesTableOptions::default(),
            meta_options: TimeseriesMetaOptions::default(),
            timeseries_keys: Vec::new(),
            field_primary_keys: Vec::new(),
            disable_measurement_name: false,
        }
    }

    pub fn with_time_to_live(mut self, seconds: i64) -> Self {
        self.options.time_to_live = seconds;
        self
    }

    pub fn with_meta_options(mut self, meta_options: TimeseriesMetaOptions) -> Self {
        self.meta_options = meta_options;
        self
    }

    pub fn with_timeseries_key(mut self, key: impl Into<String>) -> Self {
        self.timeseries_keys.push(key.into());
        self
    }

    pub fn with_field_primary_key(mut self, field: PrimaryKeySchema) -> Self {
        self.field_primary_keys.push(field);
        self
    }

    pub fn without_measurement_name(mut self) -> Self {
        self.disable_measurement_name = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncOption {
    #[default]
    Full,
    Incremental,
}

impl SyncOption {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Full => "SYNC_TYPE_FULL",
            Self::Incremental => "SYNC_TYPE_INCR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticalStore {
    pub name: String,
    /// Seconds; `-1` keeps synced data forever.
    pub time_to_live: i64,
    pub sync_option: SyncOption,
}

impl AnalyticalStore {
    pub const DEFAULT_NAME: &'static str = "default_analytical_store";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time_to_live: -1,
            sync_option: SyncOption::Full,
        }
    }

    pub fn with_time_to_live(mut self, seconds: i64) -> Self {
        self.time_to_live = seconds;
        self
    }

    pub fn with_sync_option(mut self, sync_option: SyncOption) -> Self {
        self.sync_option = sync_option;
        self
    }
}

/// Registry entry of a timeseries table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeseriesSchema {
    pub meta: TimeseriesTableMeta,
    pub analytical_stores: Vec<AnalyticalStore>,
}

impl TimeseriesSchema {
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn analytical_store(&self, name: &str) -> Option<&AnalyticalStore> {
        self.analytical_stores.iter().find(|s| s.name == name)
    }
}
