// ============================================================================
// RustWideDB Library
// ============================================================================

pub mod config;
pub mod core;
pub mod storage;
pub mod timeseries;
pub mod result;
pub mod facade;
mod parser;
mod executor;

// Re-export main types for convenience
pub use config::StoreConfig;
pub use facade::{RangeScanner, WideColumnDB};
pub use core::{
    Cell, ColumnType, ColumnValue, DbError, Direction, IndexMeta, PrimaryKey, PrimaryKeySchema,
    PrimaryKeyType, PrimaryKeyValue, Result, Row, RowExistence, TableMeta, TableOptions, TimeRange,
};
pub use result::QueryResult;
pub use storage::{RowUpdate, Split, StreamSpec};
