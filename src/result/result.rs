use std::fmt;
use crate::core::ColumnValue;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ColumnValue>>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Vec<ColumnValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column by name.
    pub fn column(&self, name: &str) -> Option<Vec<&ColumnValue>> {
        let i = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().filter_map(|row| row.get(i)).collect())
    }
}

/// Renders an aligned text table.
impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return writeln!(f, "Empty result set");
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (i, value) in row.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(value.to_string().len());
            }
        }

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| format!("{:width$}", col, width = w))
            .collect();
        writeln!(f, "{}", header.join(" | "))?;

        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", separator.join("-+-"))?;

        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(val, w)| format!("{:width$}", val.to_string(), width = w))
                .collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }

        write!(f, "\n{} row(s)", self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_and_column_lookup() {
        let result = QueryResult::new(
            vec!["Tables".into()],
            vec![vec![ColumnValue::from("a")], vec![ColumnValue::from("bb")]],
        );
        let text = result.to_string();
        assert!(text.starts_with("Tables\n------\na"));
        assert!(text.ends_with("2 row(s)"));
        assert_eq!(result.column("Tables").unwrap().len(), 2);
        assert!(result.column("missing").is_none());
    }
}
