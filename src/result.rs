use std::sync::Arc;

use crate::col::Field;
use crate::error::{Error, Result};
use crate::protocol::response::CommandStatus;
use crate::raw::{FromColumn, decode};
use crate::row::Tuple;

/// One result of an executed statement, in the order the server produced them
#[derive(Debug, Clone)]
pub enum QueryResult {
    Rows(ResultSet),
    Status(CommandStatus),
}

impl QueryResult {
    pub fn as_rows(&self) -> Option<&ResultSet> {
        match self {
            QueryResult::Rows(rs) => Some(rs),
            QueryResult::Status(_) => None,
        }
    }

    pub fn update_count(&self) -> Option<u64> {
        match self {
            QueryResult::Rows(_) => None,
            QueryResult::Status(status) => Some(status.update_count),
        }
    }
}

/// Materialized rows with a forward cursor
///
/// Column indexes are 1-based. Values are decoded when an accessor is called.
#[derive(Debug, Clone)]
pub struct ResultSet {
    query: String,
    fields: Arc<[Field]>,
    rows: Vec<Tuple>,
    /// 0 is before the first row
    position: usize,
}

impl ResultSet {
    pub fn new(query: impl Into<String>, fields: Arc<[Field]>, rows: Vec<Tuple>) -> Self {
        Self {
            query: query.into(),
            fields,
            rows,
            position: 0,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn column_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Tuple] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Tuple> {
        self.rows
    }

    /// Advance to the next row. Returns `false` once past the last row.
    pub fn next(&mut self) -> bool {
        if self.position <= self.rows.len() {
            self.position += 1;
        }
        self.position <= self.rows.len()
    }

    /// Move back before the first row
    pub fn before_first(&mut self) {
        self.position = 0;
    }

    fn current(&self) -> Result<&Tuple> {
        match self.position.checked_sub(1) {
            Some(i) => self.rows.get(i).ok_or(Error::InvalidCursorState),
            None => Err(Error::InvalidCursorState),
        }
    }

    fn column(&self, column: usize) -> Result<&Field> {
        column
            .checked_sub(1)
            .and_then(|i| self.fields.get(i))
            .ok_or(Error::ColumnIndexOutOfRange {
                index: column,
                count: self.fields.len(),
            })
    }

    /// Decode column `column` of the current row, `None` for SQL NULL
    pub fn get<T: FromColumn>(&self, column: usize) -> Result<Option<T>> {
        let field = self.column(column)?;
        let row = self.current()?;
        match row.get(column - 1) {
            Some(data) => decode(field, data).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_string(&self, column: usize) -> Result<Option<String>> {
        self.get(column)
    }

    pub fn get_bytes(&self, column: usize) -> Result<Option<Vec<u8>>> {
        self.column(column)?;
        Ok(self.current()?.get(column - 1).map(<[u8]>::to_vec))
    }

    /// Decode the column named `label`
    pub fn get_by_label<T: FromColumn>(&self, label: &str) -> Result<Option<T>> {
        self.get(self.find_column(label)?)
    }

    /// 1-based index of the first column named `label`, compared case-insensitively
    pub fn find_column(&self, label: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(label))
            .map(|i| i + 1)
            .ok_or_else(|| Error::ColumnNotFound(label.to_string()))
    }
}
