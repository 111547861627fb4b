use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Table has no heading row")]
    MissingHeadings,

    #[error("Row {row} has {actual} cells, but the table has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Line {line} is not a table row, expected '| cell | ... |', got '{content}'")]
    NotARow { line: usize, content: String },

    #[error("Table has no column named '{column}'. Available columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
}

/// A table attached to a scenario step, like
///
/// ```text
/// | org id | account number | cluster name                         |
/// | 1      | 1000           | 5d5892d3-1f74-4ccf-91af-548dfc9767aa |
/// ```
///
/// The first row names the columns. Every other row must have exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioTable {
    headings: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ScenarioTable {
    pub fn new(headings: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TableError> {
        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != headings.len())
        {
            return Err(TableError::RowWidth {
                row,
                expected: headings.len(),
                actual: cells.len(),
            });
        }
        Ok(Self { headings, rows })
    }

    /// Parses a table written with pipe-delimited cells. Blank lines are skipped, cells are trimmed.
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let mut parsed: Vec<Vec<String>> = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(inner) = line
                .strip_prefix('|')
                .and_then(|rest| rest.strip_suffix('|'))
            else {
                return Err(TableError::NotARow {
                    line: index + 1,
                    content: line.to_owned(),
                });
            };
            parsed.push(inner.split('|').map(|cell| cell.trim().to_owned()).collect());
        }

        let mut rows = parsed.into_iter();
        let headings = rows.next().ok_or(TableError::MissingHeadings)?;
        Self::new(headings, rows.collect())
    }

    pub fn headings(&self) -> &[String] {
        &self.headings
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|cells| Row { table: self, cells })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row { table: self, cells })
    }

    fn column_index(&self, column: &str) -> Result<usize, TableError> {
        self.headings
            .iter()
            .position(|heading| heading == column)
            .ok_or_else(|| TableError::MissingColumn {
                column: column.to_owned(),
                available: self.headings.clone(),
            })
    }
}

/// One data row of a [ScenarioTable], addressed by column name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'t> {
    table: &'t ScenarioTable,
    cells: &'t [String],
}

impl<'t> Row<'t> {
    pub fn get(&self, column: &str) -> Result<&'t str, TableError> {
        let index = self.table.column_index(column)?;
        Ok(self.cells[index].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertr::prelude::*;

    const CLUSTERS: &str = r#"
        | org id | account number | cluster name |
        | 1      | 1000           | first        |
        | 2      | 2000           | second       |
    "#;

    #[test]
    fn parses_pipe_table() {
        let table = ScenarioTable::parse(CLUSTERS).unwrap();

        assert_that(table.headings().to_vec()).is_equal_to(vec![
            "org id".to_owned(),
            "account number".to_owned(),
            "cluster name".to_owned(),
        ]);
        assert_that(table.len()).is_equal_to(2);

        let second = table.row(1).unwrap();
        assert_that(second.get("account number").unwrap()).is_equal_to("2000");
        assert_that(second.get("cluster name").unwrap()).is_equal_to("second");
    }

    #[test]
    fn headings_only_yield_empty_table() {
        let table = ScenarioTable::parse("| log | contains |").unwrap();
        assert_that(table.is_empty()).is_true();
        assert_that(table.rows().count()).is_equal_to(0);
    }

    #[test]
    fn empty_cells_are_kept() {
        let table = ScenarioTable::parse("| val | var |\n| FOO |  |").unwrap();
        assert_that(table.row(0).unwrap().get("var").unwrap()).is_equal_to("");
    }

    #[test]
    fn unknown_column_is_reported() {
        let table = ScenarioTable::parse(CLUSTERS).unwrap();
        let err = table.row(0).unwrap().get("total risk").unwrap_err();
        assert_that(err.to_string().as_str()).contains("'total risk'");
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = ScenarioTable::parse("| a | b |\n| 1 |").unwrap_err();
        assert_that(err).is_equal_to(TableError::RowWidth {
            row: 0,
            expected: 2,
            actual: 1,
        });
    }

    #[test]
    fn lines_without_pipes_are_rejected() {
        let err = ScenarioTable::parse("| a |\nnot a row").unwrap_err();
        assert_that(err).is_equal_to(TableError::NotARow {
            line: 2,
            content: "not a row".to_owned(),
        });
    }

    #[test]
    fn blank_input_has_no_headings() {
        let err = ScenarioTable::parse("  \n\n").unwrap_err();
        assert_that(err).is_equal_to(TableError::MissingHeadings);
    }
}
