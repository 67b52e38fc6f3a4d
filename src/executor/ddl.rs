use std::collections::HashSet;
use super::{ExecutionContext, Executor};
use crate::core::{DbError, Result};
use crate::parser::ast::{CreateTableStmt, DropTableStmt, Statement};
use crate::result::QueryResult;
use crate::storage::MappingTable;

use async_trait::async_trait;

/// `CREATE TABLE ... ENGINE=AnalyticalStore`: binds a mapping table to an
/// analytical store of a timeseries table.
pub struct CreateTableExecutor;

#[async_trait]
impl Executor for CreateTableExecutor {
    fn name(&self) -> &'static str {
        "CREATE_TABLE"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        matches!(stmt, Statement::CreateTable(_))
    }

    async fn execute(&self, stmt: &Statement, ctx: &ExecutionContext<'_>) -> Result<QueryResult> {
        let Statement::CreateTable(create) = stmt else {
            return Err(DbError::invalid("Expected CREATE TABLE"));
        };

        self.execute_create_table(create, ctx).await
    }
}

impl CreateTableExecutor {
    async fn execute_create_table(
        &self,
        create: &CreateTableStmt,
        ctx: &ExecutionContext<'_>,
    ) -> Result<QueryResult> {
        let mut names = HashSet::new();
        if let Some(dup) = create.columns.iter().find(|c| !names.insert(c.name.as_str())) {
            return Err(DbError::invalid(format!("Duplicate column '{}'.", dup.name)));
        }

        let mut catalog = ctx.catalog.write().await;
        if catalog.get_mapping(&create.table_name).is_some() && create.if_not_exists {
            return Ok(QueryResult::empty());
        }

        let attribute = &create.engine_attribute;
        let timeseries = catalog.get_timeseries(&attribute.timeseries_table_name)?;
        if timeseries
            .analytical_store(&attribute.analytical_store_name)
            .is_none()
        {
            return Err(DbError::NotFound(format!(
                "Analytical store '{}' does not exist.",
                attribute.analytical_store_name
            )));
        }

        let mapping = MappingTable {
            name: create.table_name.clone(),
            timeseries_table: attribute.timeseries_table_name.clone(),
            analytical_store: attribute.analytical_store_name.clone(),
            columns: create
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.column_type))
                .collect(),
        };
        *catalog = catalog.clone().with_mapping(mapping)?;
        log::info!(
            "created mapping table {} on {}.{}",
            create.table_name,
            attribute.timeseries_table_name,
            attribute.analytical_store_name
        );

        Ok(QueryResult::empty())
    }
}

pub struct DropTableExecutor;

#[async_trait]
impl Executor for DropTableExecutor {
    fn name(&self) -> &'static str {
        "DROP_TABLE"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        matches!(stmt, Statement::DropTable(_))
    }

    async fn execute(&self, stmt: &Statement, ctx: &ExecutionContext<'_>) -> Result<QueryResult> {
        let Statement::DropTable(drop) = stmt else {
            return Err(DbError::invalid("Expected DROP TABLE"));
        };

        self.execute_drop_table(drop, ctx).await
    }
}

impl DropTableExecutor {
    async fn execute_drop_table(
        &self,
        drop: &DropTableStmt,
        ctx: &ExecutionContext<'_>,
    ) -> Result<QueryResult> {
        let mut catalog = ctx.catalog.write().await;
        if catalog.get_mapping(&drop.table_name).is_none() && drop.if_exists {
            return Ok(QueryResult::empty());
        }
        *catalog = catalog.clone().without_mapping(&drop.table_name)?;
        log::info!("dropped mapping table {}", drop.table_name);

        Ok(QueryResult::empty())
    }
}
