use std::sync::Arc;

use crate::col::Field;
use crate::error::{Error, Result};
use crate::protocol::r#trait::ResultHandler;
use crate::protocol::response::{CommandStatus, Notice};
use crate::result::{QueryResult, ResultSet};
use crate::row::Tuple;

/// Collects every result of a request in order
///
/// Errors reported during the request are raised together by `handle_completion`:
/// the first as the primary error, later ones chained behind it.
#[derive(Debug, Default)]
pub struct StatementResultHandler {
    results: Vec<QueryResult>,
    warnings: Vec<Notice>,
    errors: Vec<Error>,
}

impl StatementResultHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[QueryResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<QueryResult> {
        self.results
    }

    pub fn warnings(&self) -> &[Notice] {
        &self.warnings
    }
}

impl ResultHandler for StatementResultHandler {
    fn handle_result_rows(&mut self, query: &str, fields: Arc<[Field]>, rows: Vec<Tuple>) {
        self.results
            .push(QueryResult::Rows(ResultSet::new(query, fields, rows)));
    }

    fn handle_command_status(&mut self, status: &str, update_count: u64, insert_oid: u64) {
        self.results.push(QueryResult::Status(CommandStatus {
            status: status.to_string(),
            update_count,
            insert_oid,
        }));
    }

    fn handle_warning(&mut self, warning: Notice) {
        self.warnings.push(warning);
    }

    fn handle_error(&mut self, error: Error) {
        self.errors.push(error);
    }

    fn handle_completion(&mut self) -> Result<()> {
        match Error::chain(std::mem::take(&mut self.errors)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// A handler that ignores all rows but captures the update count and inserted id
///
/// Useful for `execute_drop()` and for draining a response nobody is waiting for.
#[derive(Debug, Default)]
pub struct DropHandler {
    update_count: u64,
    insert_oid: u64,
    errors: Vec<Error>,
}

impl DropHandler {
    /// Update count of the last command status
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn insert_oid(&self) -> u64 {
        self.insert_oid
    }
}

impl ResultHandler for DropHandler {
    fn handle_result_rows(&mut self, _: &str, _: Arc<[Field]>, _: Vec<Tuple>) {}

    fn handle_command_status(&mut self, _: &str, update_count: u64, insert_oid: u64) {
        self.update_count = update_count;
        self.insert_oid = insert_oid;
    }

    fn handle_warning(&mut self, warning: Notice) {
        tracing::debug!("ignored warning: {warning}");
    }

    fn handle_error(&mut self, error: Error) {
        self.errors.push(error);
    }

    fn handle_completion(&mut self) -> Result<()> {
        match Error::chain(std::mem::take(&mut self.errors)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
