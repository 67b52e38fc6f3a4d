pub mod context;
pub mod ddl;
pub mod executor;
pub mod query;

pub use context::ExecutionContext;
pub use ddl::{CreateTableExecutor, DropTableExecutor};
pub use executor::{Executor, ExecutorPipeline};
pub use query::ShowTablesExecutor;
