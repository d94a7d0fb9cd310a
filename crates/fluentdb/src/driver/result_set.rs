use crate::error::{DbError, DbResult};
use crate::value::SqlValue;

/// A buffered result cursor.
///
/// Starts before the first row; [`ResultSet::next`] advances. Columns can be
/// read by 1-based position or by label. Label lookup prefers an exact
/// match and falls back to a case-insensitive one, since servers disagree
/// on how they fold unquoted labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    // 0 = before first; n = on row n-1
    position: usize,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows,
            position: 0,
        }
    }

    /// A result with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when positioned before the first row and at least one row exists.
    pub fn is_before_first(&self) -> bool {
        self.position == 0 && !self.rows.is_empty()
    }

    /// Advance to the next row; `false` once past the last row.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if self.position < self.rows.len() {
            self.position += 1;
            true
        } else {
            self.position = self.rows.len() + 1;
            false
        }
    }

    /// 0-based index of a column label.
    pub fn find_column(&self, label: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == label)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(label)))
    }

    fn current(&self) -> DbResult<&[SqlValue]> {
        match self.position {
            0 => Err(DbError::no_data("The result set has no current row")),
            p if p > self.rows.len() => Err(DbError::no_data("The result set has no current row")),
            p => Ok(&self.rows[p - 1]),
        }
    }

    /// Value at a 1-based column position on the current row.
    pub fn get_at(&self, index: usize) -> DbResult<&SqlValue> {
        let row = self.current()?;
        index
            .checked_sub(1)
            .and_then(|i| row.get(i))
            .ok_or_else(|| DbError::decode(index.to_string(), "column index out of range"))
    }

    /// Value of a labelled column on the current row.
    pub fn get(&self, label: &str) -> DbResult<&SqlValue> {
        let row = self.current()?;
        self.find_column(label)
            .and_then(|i| row.get(i))
            .ok_or_else(|| DbError::decode(label, "column not found"))
    }

    pub fn is_null(&self, label: &str) -> DbResult<bool> {
        Ok(self.get(label)?.is_null())
    }

    pub fn get_string(&self, label: &str) -> DbResult<Option<String>> {
        Ok(self.get(label)?.to_text())
    }

    pub fn get_i64(&self, label: &str) -> DbResult<Option<i64>> {
        let value = self.get(label)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_i64()
            .map(Some)
            .ok_or_else(|| DbError::decode(label, format!("not an integer: {value}")))
    }

    /// Borrow a row by 0-based index, independent of the cursor position.
    pub fn row(&self, index: usize) -> Option<&[SqlValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Take ownership of all rows, leaving the cursor exhausted.
    pub fn into_rows(self) -> Vec<Vec<SqlValue>> {
        self.rows
    }
}
