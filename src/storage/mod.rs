pub mod catalog;
pub mod cells;
pub mod index;
pub mod memory;
pub mod split;
pub mod stream;
pub mod table;

pub use catalog::{Catalog, MappingTable};
pub use cells::{ReadOptions, ScanPage, VersionedCells};
pub use index::IndexTable;
pub use memory::InMemoryStorage;
pub use split::{Split, compute_splits};
pub use stream::{
    ColumnOperation, RecordColumn, ShardIterator, StreamDescription, StreamInfo, StreamLog,
    StreamRecord, StreamRecordType, StreamShard, StreamSpec, StreamStatus,
};
pub use table::{RowUpdate, Table, TableKind, TableSchema, TableView};
