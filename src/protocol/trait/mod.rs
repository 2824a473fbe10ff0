pub mod params;

use std::sync::Arc;

use auto_impl::auto_impl;

use crate::col::Field;
use crate::error::{Error, Result};
use crate::protocol::response::Notice;
use crate::row::Tuple;

/// Callbacks through which the executor delivers one request's results
///
/// Called synchronously from the receive loop. Implementations must not call back
/// into the executor that is driving them.
#[auto_impl(&mut, Box)]
pub trait ResultHandler {
    /// One complete result set
    fn handle_result_rows(&mut self, query: &str, fields: Arc<[Field]>, rows: Vec<Tuple>);

    /// One result without rows
    fn handle_command_status(&mut self, status: &str, update_count: u64, insert_oid: u64);

    fn handle_warning(&mut self, warning: Notice);

    /// May be called several times per request
    fn handle_error(&mut self, error: Error);

    /// Called once after the receive loop ends. Returns the first recorded error, if any.
    fn handle_completion(&mut self) -> Result<()>;
}
