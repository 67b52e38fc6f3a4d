pub mod key;
pub mod meta;
pub mod model;

pub use key::{KeyLayout, parse_tags, serialize_tags};
pub use meta::{CompositeOperator, MetaQueryCondition, MetaStore, SingleOperator, TimeseriesMeta};
pub use model::{
    AnalyticalStore, SyncOption, TimeseriesKey, TimeseriesMetaOptions, TimeseriesRow,
    TimeseriesSchema, TimeseriesTableMeta, TimeseriesTableOptions,
};
