use serde::Deserialize;
use crate::core::ColumnType;

/// Statements understood by the mapping-table SQL bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTableStmt),
    ShowTables,
    DropTable(DropTableStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
    pub engine: String,
    pub engine_attribute: EngineAttribute,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

/// JSON payload of `ENGINE_ATTRIBUTE='...'`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineAttribute {
    pub timeseries_table_name: String,
    pub analytical_store_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStmt {
    pub table_name: String,
    pub if_exists: bool,
}
