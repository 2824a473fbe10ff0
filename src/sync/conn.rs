use std::net::TcpStream;

use crate::error::{Error, Result};
use crate::handler::StatementResultHandler;
use crate::opts::Opts;
use crate::protocol::params::ParameterList;
use crate::protocol::r#trait::params::Params;
use crate::result::{QueryResult, ResultSet};
use crate::sync::connect::ConnectionFactory;
use crate::sync::executor::{MoreResults, QueryExecutor};
use crate::sync::stream::{CancelHandle, Transport};
use crate::value::Value;

/// A statement with `?` placeholders and the values bound to them
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    sql: String,
    params: ParameterList,
}

impl PreparedStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let params = ParameterList::new(&sql);
        Self { sql, params }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_count(&self) -> usize {
        self.params.param_count()
    }

    pub fn params(&self) -> &ParameterList {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterList {
        &mut self.params
    }

    /// Bind one value at a 1-based index
    pub fn bind(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.params.bind(index, value)
    }

    /// Replace every binding with `params`, in order
    pub fn bind_all<P: Params + ?Sized>(&mut self, params: &P) -> Result<()> {
        if params.len() != self.params.param_count() {
            return Err(Error::InvalidParameterValue(format!(
                "Statement has {} parameters, got {}",
                self.params.param_count(),
                params.len()
            )));
        }
        self.params.clear();
        params.bind_to(&mut self.params)
    }

    pub fn clear_parameters(&mut self) {
        self.params.clear();
    }
}

/// A synchronous connection
///
/// Every call runs one request on the underlying [`QueryExecutor`]. Results after the
/// first one of a request are fetched with [`Conn::more_results`].
pub struct Conn<S: Transport = TcpStream> {
    executor: QueryExecutor<S>,
}

impl Conn<TcpStream> {
    /// Connect with options or a connection URL
    ///
    /// ```rs
    /// let mut conn = Conn::new("jdbc:traindb://localhost:58000?user=alice")?;
    /// let mut rs = conn.query("SELECT 1")?;
    /// ```
    pub fn new<O>(opts: O) -> Result<Self>
    where
        O: TryInto<Opts>,
        Error: From<O::Error>,
    {
        let opts: Opts = opts.try_into()?;
        let executor = ConnectionFactory::new().open(&opts)?;
        Ok(Self::from_executor(executor))
    }

    pub fn cancel_handle(&self) -> Result<CancelHandle> {
        self.executor.cancel_handle()
    }
}

impl<S: Transport> Conn<S> {
    pub fn from_executor(executor: QueryExecutor<S>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &QueryExecutor<S> {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut QueryExecutor<S> {
        &mut self.executor
    }

    pub fn is_closed(&self) -> bool {
        self.executor.is_closed()
    }

    pub fn close(&mut self) -> Result<()> {
        self.executor.close()
    }

    /// Run `sql` and return its first result
    ///
    /// With `BOTH_ROWS_AND_STATUS` unset a result is either rows or a command status.
    pub fn execute(&mut self, sql: &str) -> Result<Vec<QueryResult>> {
        let mut handler = StatementResultHandler::new();
        self.executor.execute(sql, &mut handler)?;
        Ok(handler.into_results())
    }

    /// Fetch the next result of the last request, `None` once the response is complete
    pub fn more_results(&mut self) -> Result<Option<Vec<QueryResult>>> {
        let mut handler = StatementResultHandler::new();
        let more = self.executor.get_more_result(&mut handler)?;
        let results = handler.into_results();
        match more {
            MoreResults::Result => Ok(Some(results)),
            MoreResults::NoMoreResults if results.is_empty() => Ok(None),
            MoreResults::NoMoreResults => Ok(Some(results)),
        }
    }

    /// Run `sql`, which must produce exactly one result set
    pub fn query(&mut self, sql: &str) -> Result<ResultSet> {
        let results = self.execute(sql)?;
        self.single_result_set(results)
    }

    /// Run `sql`, which must not produce rows, and return its update count
    pub fn execute_update(&mut self, sql: &str) -> Result<u64> {
        let mut update_count = 0;
        for result in self.execute(sql)? {
            match result {
                QueryResult::Rows(_) => return Err(Error::TooManyResults),
                QueryResult::Status(status) => update_count = status.update_count,
            }
        }
        Ok(update_count)
    }

    pub fn prepare(&self, sql: &str) -> PreparedStatement {
        PreparedStatement::new(sql)
    }

    /// SQL text `stmt` would send, with bound values substituted
    pub fn native_sql(&self, stmt: &PreparedStatement) -> Result<String> {
        self.executor.native_sql(&stmt.sql, &stmt.params)
    }

    /// Run a prepared statement and return its first result
    ///
    /// Fails with [`Error::UnboundParameter`] before sending anything if a placeholder
    /// has no value.
    pub fn exec(&mut self, stmt: &PreparedStatement) -> Result<Vec<QueryResult>> {
        let mut handler = StatementResultHandler::new();
        self.executor
            .execute_with_params(&stmt.sql, &stmt.params, &mut handler)?;
        Ok(handler.into_results())
    }

    /// Run a prepared statement, which must produce exactly one result set
    pub fn exec_query(&mut self, stmt: &PreparedStatement) -> Result<ResultSet> {
        let results = self.exec(stmt)?;
        self.single_result_set(results)
    }

    fn single_result_set(&mut self, results: Vec<QueryResult>) -> Result<ResultSet> {
        let mut results = results.into_iter();
        let first = results.next();
        if results.next().is_some() {
            return Err(Error::TooManyResults);
        }
        let Some(QueryResult::Rows(rs)) = first else {
            return Err(Error::NoData);
        };
        if self.more_results()?.is_some() {
            return Err(Error::TooManyResults);
        }
        Ok(rs)
    }
}
