//! In-memory server for driving `QueryExecutor` without a socket

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use zero_traindb::constant::SqlType;
use zero_traindb::sync::{ByteStream, QueryExecutor, Transport};

/// Print `tracing` output of the crate under `cargo test -- --nocapture`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Replays canned server responses and records everything the client writes
///
/// Each flush of client output releases the next response, as a server would
/// answer one query message.
pub struct MockServer {
    input: Cursor<Vec<u8>>,
    responses: VecDeque<Vec<u8>>,
    pub written: Vec<u8>,
    shut_down: Arc<AtomicBool>,
}

impl MockServer {
    pub fn new(responses: Vec<Vec<u8>>) -> (Self, Arc<AtomicBool>) {
        let shut_down = Arc::new(AtomicBool::new(false));
        let server = Self {
            input: Cursor::new(Vec::new()),
            responses: responses.into(),
            written: Vec::new(),
            shut_down: Arc::clone(&shut_down),
        };
        (server, shut_down)
    }
}

impl Read for MockServer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MockServer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(response) = self.responses.pop_front() {
            self.input.get_mut().extend(response);
        }
        Ok(())
    }
}

impl Transport for MockServer {
    fn shutdown(&mut self) -> io::Result<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn input_ready(&mut self) -> io::Result<bool> {
        Ok(self.input.position() < self.input.get_ref().len() as u64)
    }
}

/// Executor whose first query is answered with `response`
pub fn executor(response: Vec<u8>) -> (QueryExecutor<MockServer>, Arc<AtomicBool>) {
    executor_with(vec![response])
}

/// Executor whose queries are answered with `responses`, one per query
pub fn executor_with(responses: Vec<Vec<u8>>) -> (QueryExecutor<MockServer>, Arc<AtomicBool>) {
    let (server, shut_down) = MockServer::new(responses);
    (QueryExecutor::new(ByteStream::new(server)), shut_down)
}

/// Bytes the client has written so far
pub fn written(executor: &QueryExecutor<MockServer>) -> Vec<u8> {
    executor
        .stream()
        .get_ref()
        .map(|s| s.written.clone())
        .unwrap_or_default()
}

fn message(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&(4 + body.len() as i32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

pub fn row_description(columns: &[(&str, SqlType, i16)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(columns.len() as i16).to_be_bytes());
    for (name, sql_type, format) in columns {
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        body.extend_from_slice(&sql_type.0.to_be_bytes());
        body.extend_from_slice(&(-1_i32).to_be_bytes());
        body.extend_from_slice(&format.to_be_bytes());
    }
    // no length field
    let mut out = vec![b'T'];
    out.extend(body);
    out
}

pub fn data_row(values: &[Option<&[u8]>]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(values.len() as i16).to_be_bytes());
    for value in values {
        match value {
            Some(bytes) => {
                body.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                body.extend_from_slice(bytes);
            }
            None => body.extend_from_slice(&(-1_i32).to_be_bytes()),
        }
    }
    message(b'D', &body)
}

pub fn command_complete(tag: &str) -> Vec<u8> {
    let mut body = tag.as_bytes().to_vec();
    body.push(0);
    message(b'C', &body)
}

fn error_fields(severity: &str, code: &str, text: &str) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, value) in [(b'S', severity), (b'V', severity), (b'C', code), (b'M', text)] {
        body.push(field);
        body.extend_from_slice(value.as_bytes());
        body.push(0);
    }
    body.push(0);
    body
}

pub fn error_response(code: &str, text: &str) -> Vec<u8> {
    message(b'E', &error_fields("ERROR", code, text))
}

pub fn notice_response(code: &str, text: &str) -> Vec<u8> {
    message(b'N', &error_fields("WARNING", code, text))
}

pub fn empty_query() -> Vec<u8> {
    message(b'I', &[])
}

/// End-of-response marker some servers append; never required
pub fn ready_for_query() -> Vec<u8> {
    message(b'Z', b"I")
}

pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

/// Query message the client is expected to send for `sql`
pub fn query_message(sql: &str) -> Vec<u8> {
    message(b'E', sql.as_bytes())
}
