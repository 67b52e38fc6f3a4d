pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use types::{
    ALL_VERSIONS, Cell, DefinedColumnSchema, Direction, IndexMeta, PrimaryKey, PrimaryKeyBuilder,
    PrimaryKeyColumn, PrimaryKeySchema, Row, RowExistence, TableMeta, TableOptions, TimeRange,
    now_micros, now_millis,
};
pub use value::{ColumnType, ColumnValue, PrimaryKeyType, PrimaryKeyValue};
