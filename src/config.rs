/// Store configuration
///
/// Limits and quotas enforced by the store. Defaults match the limits
/// clients expect from the service; tests shrink some of them (for example
/// `split_unit_bytes`) to exercise edge cases with small data sets.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum primary key columns of a base table
    pub max_primary_key_columns: usize,

    /// Maximum primary key columns of an index
    pub max_index_primary_key_columns: usize,

    /// Maximum attribute columns of an index
    pub max_index_attribute_columns: usize,

    /// Maximum defined columns of a table
    pub max_defined_columns: usize,

    /// Maximum number of indexes per table
    pub index_quota: usize,

    /// Maximum byte length of a table name
    pub max_table_name_bytes: usize,

    /// Maximum byte length of a column name
    pub max_column_name_bytes: usize,

    /// Longest table name a stream id may carry
    pub max_stream_table_name_bytes: usize,

    /// Maximum rows in one batch write
    pub max_batch_write_rows: usize,

    /// Maximum rows in one batch get
    pub max_batch_get_rows: usize,

    /// Maximum rows returned by one range call
    pub max_range_rows: usize,

    /// Bytes represented by one unit of `split_size_in_100mb`
    pub split_unit_bytes: u64,

    /// Location hints handed out round-robin to computed splits
    pub split_locations: Vec<String>,

    /// Stream retention used when a stream spec omits it
    pub default_stream_expiration_hours: i64,

    /// Whether new timeseries tables get `default_analytical_store`
    pub provision_default_analytical_store: bool,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            max_primary_key_columns: 4,
            max_index_primary_key_columns: 4,
            max_index_attribute_columns: 32,
            max_defined_columns: 32,
            index_quota: 5,
            max_table_name_bytes: 255,
            max_column_name_bytes: 255,
            max_stream_table_name_bytes: 238,
            max_batch_write_rows: 200,
            max_batch_get_rows: 100,
            max_range_rows: 5000,
            split_unit_bytes: 100 * 1024 * 1024,
            split_locations: vec!["local".to_string()],
            default_stream_expiration_hours: 24,
            provision_default_analytical_store: true,
        }
    }

    /// Set the index quota per table
    pub fn index_quota(mut self, quota: usize) -> Self {
        self.index_quota = quota;
        self
    }

    /// Set maximum rows per range call
    pub fn max_range_rows(mut self, rows: usize) -> Self {
        self.max_range_rows = rows.max(1);
        self
    }

    /// Set batch limits
    pub fn batch_limits(mut self, max_write_rows: usize, max_get_rows: usize) -> Self {
        self.max_batch_write_rows = max_write_rows;
        self.max_batch_get_rows = max_get_rows;
        self
    }

    /// Set the size of one split unit
    pub fn split_unit_bytes(mut self, bytes: u64) -> Self {
        self.split_unit_bytes = bytes.max(1);
        self
    }

    /// Set split location hints; empty input keeps the current list
    pub fn split_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let locations: Vec<String> = locations
            .into_iter()
            .map(Into::into)
            .filter(|l: &String| !l.is_empty())
            .collect();
        if !locations.is_empty() {
            self.split_locations = locations;
        }
        self
    }

    /// Set default stream retention
    pub fn default_stream_expiration_hours(mut self, hours: i64) -> Self {
        self.default_stream_expiration_hours = hours;
        self
    }

    /// Enable or disable automatic analytical store provisioning
    pub fn provision_default_analytical_store(mut self, enabled: bool) -> Self {
        self.provision_default_analytical_store = enabled;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
