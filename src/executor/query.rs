use super::{ExecutionContext, Executor};
use crate::core::{ColumnValue, Result};
use crate::parser::ast::Statement;
use crate::result::QueryResult;

use async_trait::async_trait;

/// `SHOW TABLES`: names of the mapping tables.
pub struct ShowTablesExecutor;

#[async_trait]
impl Executor for ShowTablesExecutor {
    fn name(&self) -> &'static str {
        "SHOW_TABLES"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        matches!(stmt, Statement::ShowTables)
    }

    async fn execute(&self, _stmt: &Statement, ctx: &ExecutionContext<'_>) -> Result<QueryResult> {
        let catalog = ctx.catalog.read().await;
        let rows = catalog
            .list_mappings()
            .into_iter()
            .map(|name| vec![ColumnValue::String(name)])
            .collect();

        Ok(QueryResult::new(vec!["Tables".to_string()], rows))
    }
}
