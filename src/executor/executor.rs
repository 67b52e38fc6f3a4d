use super::ExecutionContext;
use crate::core::{DbError, Result};
use crate::parser::ast::Statement;
use crate::result::QueryResult;

use async_trait::async_trait;

#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, stmt: &Statement) -> bool;
    async fn execute(&self, stmt: &Statement, ctx: &ExecutionContext<'_>) -> Result<QueryResult>;
}

pub struct ExecutorPipeline {
    executors: Vec<Box<dyn Executor>>,
}

impl ExecutorPipeline {
    pub fn new() -> Self {
        Self {
            executors: Vec::new(),
        }
    }

    pub fn register(&mut self, executor: Box<dyn Executor>) {
        self.executors.push(executor);
    }

    pub async fn execute(
        &self,
        stmt: &Statement,
        ctx: &ExecutionContext<'_>,
    ) -> Result<QueryResult> {
        for executor in &self.executors {
            if executor.can_handle(stmt) {
                log::debug!("executing statement with {}", executor.name());
                return executor.execute(stmt, ctx).await;
            }
        }

        Err(DbError::invalid("No executor found for statement"))
    }
}

impl Default for ExecutorPipeline {
    fn default() -> Self {
        Self::new()
    }
}
