use std::net::TcpStream;
use std::sync::Arc;

use crate::col::{Field, FieldFormat};
use crate::constant::{QueryFlags, SqlType};
use crate::error::{Error, Result};
use crate::handler::DropHandler;
use crate::protocol::packet::{MessageCode, write_query};
use crate::protocol::params::{ParameterList, native_sql};
use crate::protocol::r#trait::ResultHandler;
use crate::protocol::response::{CommandStatus, ServerError, read_command_status};
use crate::row::Tuple;
use crate::sync::stream::{ByteStream, CancelHandle, Transport};

/// Outcome of [`QueryExecutor::get_more_result`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoreResults {
    /// Another result was delivered to the handler
    Result,
    /// Nothing of the last response is left to read
    NoMoreResults,
}

/// Drives one request/response cycle at a time over a [`ByteStream`]
///
/// Every request is a single query message. Parameterized statements are sent with
/// their literals already substituted. A command-complete ends a result and returns
/// the executor to idle; further results of the same request are read with
/// [`QueryExecutor::get_more_result`] if the server has already sent them.
#[derive(Debug)]
pub struct QueryExecutor<S: Transport = TcpStream> {
    stream: ByteStream<S>,
    closed: bool,
    query: String,
    flags: QueryFlags,
}

impl<S: Transport> QueryExecutor<S> {
    pub fn new(stream: ByteStream<S>) -> Self {
        Self {
            stream,
            closed: false,
            query: String::new(),
            flags: QueryFlags::empty(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// `true` if the server has sent bytes that no call has read yet. Never blocks.
    pub fn has_pending_results(&mut self) -> Result<bool> {
        self.check_open()?;
        self.stream.has_pending_input()
    }

    pub fn stream(&self) -> &ByteStream<S> {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut ByteStream<S> {
        &mut self.stream
    }

    /// SQL text with every bound placeholder replaced by its literal
    pub fn native_sql(&self, sql: &str, params: &ParameterList) -> Result<String> {
        native_sql(sql, params)
    }

    pub fn execute<H: ResultHandler>(&mut self, sql: &str, handler: &mut H) -> Result<()> {
        self.execute_with_flags(sql, None, QueryFlags::empty(), handler)
    }

    pub fn execute_with_params<H: ResultHandler>(
        &mut self,
        sql: &str,
        params: &ParameterList,
        handler: &mut H,
    ) -> Result<()> {
        self.execute_with_flags(sql, Some(params), QueryFlags::empty(), handler)
    }

    /// Send one query and read its response up to the end of the first result
    ///
    /// Unread results of the previous request are discarded first. Results after the
    /// first are read with [`QueryExecutor::get_more_result`].
    #[tracing::instrument(skip_all)]
    pub fn execute_with_flags<H: ResultHandler>(
        &mut self,
        sql: &str,
        params: Option<&ParameterList>,
        flags: QueryFlags,
        handler: &mut H,
    ) -> Result<()> {
        self.check_open()?;
        let query = match params {
            Some(params) => {
                params.check_all_bound()?;
                native_sql(sql, params)?
            }
            None => sql.to_string(),
        };

        let drained = self.drain();
        self.fail_if_fatal(drained)?;
        self.end_of_request();

        let sent = self.send_query(&query);
        self.fail_if_fatal(sent)?;
        self.query = query;
        self.flags = flags;

        self.receive(handler).map(|_| ())
    }

    /// Read the next result of the last request without sending anything
    ///
    /// Returns [`MoreResults::NoMoreResults`] without blocking when the server has
    /// sent nothing further.
    #[tracing::instrument(skip_all)]
    pub fn get_more_result<H: ResultHandler>(&mut self, handler: &mut H) -> Result<MoreResults> {
        self.check_open()?;
        let pending = self.stream.has_pending_input();
        if !self.fail_if_fatal(pending)? {
            return Ok(MoreResults::NoMoreResults);
        }
        self.receive(handler)
    }

    /// Close the connection. Later calls fail with [`Error::ConnectionClosed`].
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        tracing::debug!("closing connection");
        self.stream.close()
    }

    /// Shut the socket down without flushing
    pub fn abort(&mut self) {
        self.closed = true;
        self.stream.abort();
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    fn fail_if_fatal<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.as_ref().is_err_and(Error::is_fatal) {
            tracing::debug!("closing connection after fatal error");
            self.closed = true;
            if let Err(e) = self.stream.close() {
                tracing::debug!("error closing stream: {e}");
            }
        }
        result
    }

    /// Run the receive loop, then complete the handler
    ///
    /// A fatal error is raised behind the errors the handler recorded before it.
    fn receive<H: ResultHandler>(&mut self, handler: &mut H) -> Result<MoreResults> {
        let received = self.process_results(handler);
        let received = self.fail_if_fatal(received);
        self.end_of_request();
        match (received, handler.handle_completion()) {
            (Ok(more), Ok(())) => Ok(more),
            (Ok(_), Err(recorded)) => Err(recorded),
            (Err(fatal), Ok(())) => Err(fatal),
            (Err(fatal), Err(recorded)) => Err(recorded.followed_by(fatal)),
        }
    }

    fn end_of_request(&mut self) {
        self.stream.clear_max_row_size_bytes();
        self.stream.clear_result_buffer_count();
    }

    fn send_query(&mut self, query: &str) -> Result<()> {
        tracing::trace!(" FE=> Query(\"{query}\")");
        write_query(self.stream.output_mut(), query)?;
        self.stream.flush()
    }

    /// Discard results of the previous request that are still unread
    fn drain(&mut self) -> Result<()> {
        let mut sink = DropHandler::default();
        self.flags = QueryFlags::NO_RESULTS;
        while self.stream.has_pending_input()? {
            self.process_results(&mut sink)?;
            if let Err(e) = sink.handle_completion() {
                tracing::warn!("discarded error from unread result: {e}");
            }
        }
        Ok(())
    }

    fn process_results<H: ResultHandler>(&mut self, handler: &mut H) -> Result<MoreResults> {
        let no_results = self.flags.contains(QueryFlags::NO_RESULTS);
        let mut fields: Option<Arc<[Field]>> = None;
        let mut rows: Option<Vec<Tuple>> = None;

        loop {
            let code = MessageCode(self.stream.receive_char()?);
            match code {
                MessageCode::ROW_DESCRIPTION => {
                    let received = self.receive_fields()?;
                    tracing::trace!(" <=BE RowDescription({})", received.len());
                    fields = Some(received);
                    rows = Some(Vec::new());
                }
                MessageCode::DATA_ROW => match self.stream.receive_tuple() {
                    Ok(tuple) => {
                        tracing::trace!(" <=BE DataRow(len={})", tuple.byte_size());
                        check_row_width(fields.as_deref(), &tuple)?;
                        if !no_results {
                            rows.get_or_insert_with(Vec::new).push(tuple);
                        }
                    }
                    Err(Error::OutOfMemory) => {
                        if !no_results {
                            handler.handle_error(Error::OutOfMemory);
                        }
                    }
                    Err(e) => return Err(e),
                },
                MessageCode::COMMAND_COMPLETE => {
                    let payload = self.receive_payload()?;
                    let status = read_command_status(&payload)?;
                    tracing::trace!(" <=BE CommandStatus({status})");
                    self.deliver(fields.take(), rows.take(), status, handler)?;
                    return Ok(MoreResults::Result);
                }
                MessageCode::EMPTY_QUERY_RESPONSE => {
                    let len = self.stream.receive_message_length()?;
                    self.stream.skip(len)?;
                    tracing::trace!(" <=BE EmptyQuery");
                    let empty = CommandStatus::empty();
                    handler.handle_command_status(&empty.status, 0, 0);
                    return Ok(MoreResults::Result);
                }
                MessageCode::ERROR_RESPONSE => {
                    let payload = self.receive_payload()?;
                    let error = ServerError::parse(&payload)?;
                    tracing::trace!(" <=BE ErrorMessage({error})");
                    handler.handle_error(Error::ServerError(error));
                }
                MessageCode::NOTICE_RESPONSE => {
                    let payload = self.receive_payload()?;
                    let notice = ServerError::parse(&payload)?;
                    tracing::trace!(" <=BE NoticeResponse({notice})");
                    handler.handle_warning(notice);
                }
                // optional end-of-response marker; never waited for
                MessageCode::READY_FOR_QUERY => {
                    let len = self.stream.receive_message_length()?;
                    self.stream.skip(len)?;
                    tracing::trace!(" <=BE ReadyForQuery");
                    if let Some(fields) = fields.take() {
                        handler.handle_result_rows(&self.query, fields, rows.take().unwrap_or_default());
                        return Ok(MoreResults::Result);
                    }
                    return Ok(MoreResults::NoMoreResults);
                }
                other => {
                    return Err(Error::ProtocolViolation(format!(
                        "Unexpected packet type: {other}"
                    )));
                }
            }
        }
    }

    fn deliver<H: ResultHandler>(
        &self,
        fields: Option<Arc<[Field]>>,
        rows: Option<Vec<Tuple>>,
        status: &str,
        handler: &mut H,
    ) -> Result<()> {
        let Some(fields) = fields else {
            if rows.is_some_and(|rows| !rows.is_empty()) {
                return Err(Error::ProtocolViolation(
                    "Received resultset tuples, but no field structure for them".to_string(),
                ));
            }
            self.interpret_command_status(status, handler);
            return Ok(());
        };

        handler.handle_result_rows(&self.query, fields, rows.unwrap_or_default());
        if self.flags.contains(QueryFlags::BOTH_ROWS_AND_STATUS) {
            self.interpret_command_status(status, handler);
        }
        Ok(())
    }

    fn interpret_command_status<H: ResultHandler>(&self, status: &str, handler: &mut H) {
        match CommandStatus::parse(status) {
            Ok(parsed) => {
                handler.handle_command_status(&parsed.status, parsed.update_count, parsed.insert_oid)
            }
            Err(e) => handler.handle_error(e),
        }
    }

    fn receive_payload(&mut self) -> Result<Vec<u8>> {
        let len = self.stream.receive_message_length()?;
        self.stream.receive(len)
    }

    fn receive_fields(&mut self) -> Result<Arc<[Field]>> {
        let count = self.stream.receive_integer2()?;
        let count = usize::try_from(count)
            .map_err(|_| Error::ProtocolViolation(format!("Negative column count: {count}")))?;
        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            let name = self.stream.receive_canonical_string()?;
            let sql_type = SqlType(self.stream.receive_integer4()?);
            let size = self.stream.receive_integer4()?;
            let format = FieldFormat::try_from(self.stream.receive_integer2()?)?;
            fields.push(Field::new(name, sql_type, size, format));
        }
        Ok(Arc::from(fields))
    }
}

fn check_row_width(fields: Option<&[Field]>, tuple: &Tuple) -> Result<()> {
    match fields {
        Some(fields) if fields.len() != tuple.len() => Err(Error::ProtocolViolation(format!(
            "Data row has {} values but the row description has {} fields",
            tuple.len(),
            fields.len()
        ))),
        _ => Ok(()),
    }
}

impl QueryExecutor<TcpStream> {
    /// A handle that can interrupt a blocked request from another thread
    ///
    /// Cancelling shuts the socket down; the blocked call fails with an I/O error and
    /// the connection is closed.
    pub fn cancel_handle(&self) -> Result<CancelHandle> {
        self.check_open()?;
        self.stream.cancel_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::StatementResultHandler;
    use std::io::{self, Cursor, Read, Write};

    struct Replay(Cursor<Vec<u8>>);

    impl Read for Replay {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Write for Replay {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for Replay {
        fn shutdown(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn input_ready(&mut self) -> io::Result<bool> {
            Ok(self.0.position() < self.0.get_ref().len() as u64)
        }
    }

    fn message(tag: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend_from_slice(&(4 + body.len() as i32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn data_row(value: &[u8]) -> Vec<u8> {
        let mut body = 1_i16.to_be_bytes().to_vec();
        body.extend_from_slice(&(value.len() as i32).to_be_bytes());
        body.extend_from_slice(value);
        message(b'D', &body)
    }

    #[test]
    fn out_of_memory_row_is_reported_and_skipped() {
        let mut input = vec![b'T'];
        input.extend_from_slice(&1_i16.to_be_bytes());
        input.extend_from_slice(b"a\0");
        input.extend_from_slice(&SqlType::VARCHAR.0.to_be_bytes());
        input.extend_from_slice(&(-1_i32).to_be_bytes());
        input.extend_from_slice(&0_i16.to_be_bytes());
        input.extend(data_row(b"ok"));
        input.extend(data_row(b"far too long for the limit"));
        input.extend(data_row(b"ok2"));
        input.extend(message(b'C', b"SELECT 3\0"));

        let mut stream = ByteStream::new(Replay(Cursor::new(input)));
        stream.set_alloc_limit(Some(4));
        let mut executor = QueryExecutor::new(stream);
        let mut handler = StatementResultHandler::new();

        let err = executor
            .execute("SELECT a FROM t", &mut handler)
            .expect_err("out of memory");
        assert!(matches!(err, Error::OutOfMemory));
        assert!(!executor.is_closed());

        let results = handler.into_results();
        assert_eq!(results.len(), 1);
        let rs = results[0].as_rows().expect("rows");
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rows()[1].get(0), Some(&b"ok2"[..]));
        assert_eq!(
            executor.get_more_result(&mut StatementResultHandler::new()).expect("more"),
            MoreResults::NoMoreResults
        );
    }
}
