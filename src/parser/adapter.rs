use regex::Regex;
use sqlparser::ast as sql_ast;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use crate::core::{ColumnType, DbError, Result};
use crate::parser::ast::*;

/// Engine name accepted by `CREATE TABLE`.
pub const ANALYTICAL_STORE_ENGINE: &str = "AnalyticalStore";

/// Parses the SQL subset of the mapping-table bridge.
///
/// `ENGINE=...` and `ENGINE_ATTRIBUTE='...'` are cut out of the text before
/// the rest goes through `sqlparser`, which keeps the table options out of
/// dialect-specific AST shapes.
pub struct SqlParserAdapter {
    dialect: MySqlDialect,
    engine: Regex,
    engine_attribute: Regex,
}

impl SqlParserAdapter {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| DbError::ParseError(e.to_string()))
        };
        Ok(Self {
            dialect: MySqlDialect {},
            engine: compile(r"(?i)\bENGINE\s*=\s*([A-Za-z_][A-Za-z0-9_]*)")?,
            engine_attribute: compile(r"(?i)\bENGINE_ATTRIBUTE\s*=\s*'([^']*)'")?,
        })
    }

    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>> {
        let (sql, engine, attribute) = self.extract_table_options(sql);

        let external_stmts = Parser::parse_sql(&self.dialect, &sql)
            .map_err(|e| DbError::ParseError(e.to_string()))?;

        external_stmts
            .into_iter()
            .map(|stmt| self.convert_statement(stmt, engine.as_deref(), attribute.as_deref()))
            .collect()
    }

    /// Returns the SQL with the engine clauses removed, plus their values.
    fn extract_table_options(&self, sql: &str) -> (String, Option<String>, Option<String>) {
        let attribute = self
            .engine_attribute
            .captures(sql)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        let sql = self.engine_attribute.replace_all(sql, "").into_owned();

        let engine = self
            .engine
            .captures(&sql)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        let sql = self.engine.replace_all(&sql, "").into_owned();

        (sql, engine, attribute)
    }

    fn convert_statement(
        &self,
        stmt: sql_ast::Statement,
        engine: Option<&str>,
        attribute: Option<&str>,
    ) -> Result<Statement> {
        match stmt {
            sql_ast::Statement::CreateTable(create) => Ok(Statement::CreateTable(
                self.convert_create_table(create, engine, attribute)?,
            )),
            sql_ast::Statement::ShowTables { .. } => Ok(Statement::ShowTables),
            sql_ast::Statement::Drop {
                object_type,
                names,
                if_exists,
                ..
            } => {
                if let sql_ast::ObjectType::Table = object_type {
                    Ok(Statement::DropTable(self.convert_drop_table(names, if_exists)?))
                } else {
                    Err(DbError::invalid(format!(
                        "Only DROP TABLE is supported, got: {}",
                        object_type
                    )))
                }
            }
            other => Err(DbError::invalid(format!("Statement type not supported: {}", other))),
        }
    }

    fn convert_create_table(
        &self,
        create: sql_ast::CreateTable,
        engine: Option<&str>,
        attribute: Option<&str>,
    ) -> Result<CreateTableStmt> {
        let table_name = extract_table_name(&create.name)?;

        let engine = engine.unwrap_or_default();
        if !engine.eq_ignore_ascii_case(ANALYTICAL_STORE_ENGINE) {
            return Err(DbError::invalid(format!(
                "Only ENGINE={} tables are supported.",
                ANALYTICAL_STORE_ENGINE
            )));
        }
        let attribute = attribute
            .ok_or_else(|| DbError::invalid("ENGINE_ATTRIBUTE is required."))?;
        let engine_attribute: EngineAttribute = serde_json::from_str(attribute)
            .map_err(|e| DbError::ParseError(format!("Invalid ENGINE_ATTRIBUTE: {}", e)))?;

        let columns = create
            .columns
            .into_iter()
            .map(|col| self.convert_column_def(col))
            .collect::<Result<Vec<_>>>()?;
        if columns.is_empty() {
            return Err(DbError::invalid("A mapping table needs at least one column."));
        }

        Ok(CreateTableStmt {
            table_name,
            columns,
            if_not_exists: create.if_not_exists,
            engine: ANALYTICAL_STORE_ENGINE.to_string(),
            engine_attribute,
        })
    }

    fn convert_drop_table(&self, names: Vec<sql_ast::ObjectName>, if_exists: bool) -> Result<DropTableStmt> {
        let [name] = names.as_slice() else {
            return Err(DbError::invalid("Only single table DROP supported"));
        };

        Ok(DropTableStmt {
            table_name: extract_table_name(name)?,
            if_exists,
        })
    }

    fn convert_column_def(&self, col: sql_ast::ColumnDef) -> Result<ColumnDef> {
        Ok(ColumnDef {
            column_type: self.convert_data_type(&col.data_type)?,
            name: col.name.value,
        })
    }

    fn convert_data_type(&self, dt: &sql_ast::DataType) -> Result<ColumnType> {
        match dt {
            sql_ast::DataType::Int(_)
            | sql_ast::DataType::Integer(_)
            | sql_ast::DataType::BigInt(_) => Ok(ColumnType::Integer),

            sql_ast::DataType::Float(_)
            | sql_ast::DataType::Double(_)
            | sql_ast::DataType::Real => Ok(ColumnType::Double),

            sql_ast::DataType::Text
            | sql_ast::DataType::Varchar(_)
            | sql_ast::DataType::Char(_)
            | sql_ast::DataType::String(_) => Ok(ColumnType::String),

            sql_ast::DataType::Boolean
            | sql_ast::DataType::Bool => Ok(ColumnType::Boolean),

            sql_ast::DataType::Varbinary(_)
            | sql_ast::DataType::Binary(_)
            | sql_ast::DataType::Blob(_)
            | sql_ast::DataType::Bytea => Ok(ColumnType::Binary),

            _ => Err(DbError::TypeMismatch(format!(
                "Unsupported data type: {}",
                dt
            ))),
        }
    }
}

fn extract_table_name(name: &sql_ast::ObjectName) -> Result<String> {
    name.0
        .last()
        .map(|ident| ident.to_string().trim_matches('`').to_string())
        .ok_or_else(|| DbError::ParseError("Invalid table name".into()))
}
