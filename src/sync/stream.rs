use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use simdutf8::basic::from_utf8;

use crate::error::{Error, Result};
use crate::protocol::primitive::write_bytes_padded;
use crate::row::Tuple;

/// Strings longer than this are not interned by `receive_canonical_string`
const CANONICAL_MAX_LEN: usize = 64;
const CANONICAL_MAX_ENTRIES: usize = 1024;

/// Byte transport underneath a [`ByteStream`]
pub trait Transport: Read + Write {
    /// Shut down both directions, unblocking any pending read
    fn shutdown(&mut self) -> io::Result<()>;

    /// `true` if bytes can be read right now without blocking
    fn input_ready(&mut self) -> io::Result<bool>;

    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for TcpStream {
    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }

    fn input_ready(&mut self) -> io::Result<bool> {
        self.set_nonblocking(true)?;
        let mut buf = [0u8; 1];
        let peeked = self.peek(&mut buf);
        self.set_nonblocking(false)?;
        match peeked {
            Ok(n) => Ok(n > 0),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

/// Buffered framed I/O over a socket
///
/// Writes accumulate in an output buffer until [`ByteStream::flush`].
/// Reads go through a `BufReader`. Every short read is reported as [`Error::UnexpectedEof`].
#[derive(Debug)]
pub struct ByteStream<S: Transport = TcpStream> {
    stream: Option<BufReader<S>>,
    output: Vec<u8>,
    canonical: HashMap<Box<[u8]>, Arc<str>>,
    max_result_buffer: Option<u64>,
    result_buffer_byte_count: u64,
    max_row_size_bytes: usize,
    #[cfg(test)]
    alloc_limit: Option<usize>,
}

impl<S: Transport> ByteStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(BufReader::new(stream)),
            output: Vec::new(),
            canonical: HashMap::new(),
            max_result_buffer: None,
            result_buffer_byte_count: 0,
            max_row_size_bytes: 0,
            #[cfg(test)]
            alloc_limit: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn reader(&mut self) -> Result<&mut BufReader<S>> {
        self.stream.as_mut().ok_or(Error::ConnectionClosed)
    }

    pub fn get_ref(&self) -> Option<&S> {
        self.stream.as_ref().map(BufReader::get_ref)
    }

    #[cfg(test)]
    pub(crate) fn set_alloc_limit(&mut self, limit: Option<usize>) {
        self.alloc_limit = limit;
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.reader()?.get_mut().set_read_timeout(timeout)?;
        Ok(())
    }

    // ---- output ----

    pub fn send_char(&mut self, c: u8) {
        self.output.push(c);
    }

    pub fn send_integer2(&mut self, value: i16) {
        self.output.extend_from_slice(&value.to_be_bytes());
    }

    pub fn send_integer4(&mut self, value: i32) {
        self.output.extend_from_slice(&value.to_be_bytes());
    }

    pub fn send(&mut self, buf: &[u8]) {
        self.output.extend_from_slice(buf);
    }

    /// Send exactly `len` bytes: `buf` followed by zero padding
    pub fn send_padded(&mut self, buf: &[u8], len: usize) {
        write_bytes_padded(&mut self.output, buf, len);
    }

    /// Output buffer for encoders that write whole messages
    pub fn output_mut(&mut self) -> &mut Vec<u8> {
        &mut self.output
    }

    #[tracing::instrument(skip_all)]
    pub fn flush(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;
        let out = stream.get_mut();
        out.write_all(&self.output)?;
        out.flush()?;
        self.output.clear();
        Ok(())
    }

    // ---- input ----

    /// `true` if received bytes are waiting to be read. Never blocks.
    pub fn has_pending_input(&mut self) -> Result<bool> {
        let reader = self.reader()?;
        if !reader.buffer().is_empty() {
            return Ok(true);
        }
        Ok(reader.get_mut().input_ready()?)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader()?.read_exact(buf).map_err(eof_or_io)
    }

    pub fn receive_char(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn receive_integer2(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    pub fn receive_integer4(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Read exactly `len` bytes
    pub fn receive(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a message length field and return the remaining payload size
    pub fn receive_message_length(&mut self) -> Result<usize> {
        let length = self.receive_integer4()?;
        length
            .checked_sub(4)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| Error::ProtocolViolation(format!("Invalid message length: {length}")))
    }

    /// Discard exactly `len` bytes
    pub fn skip(&mut self, len: usize) -> Result<()> {
        let reader = self.reader()?;
        let mut remaining = len;
        while remaining > 0 {
            let available = reader.fill_buf().map_err(eof_or_io)?;
            if available.is_empty() {
                return Err(Error::UnexpectedEof);
            }
            let n = available.len().min(remaining);
            reader.consume(n);
            remaining -= n;
        }
        Ok(())
    }

    fn receive_cstring_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader()?.read_until(0, &mut buf).map_err(eof_or_io)?;
        if buf.pop() != Some(0) {
            return Err(Error::UnexpectedEof);
        }
        Ok(buf)
    }

    /// Read a null-terminated UTF-8 string
    pub fn receive_string(&mut self) -> Result<String> {
        let bytes = self.receive_cstring_bytes()?;
        from_utf8(&bytes)
            .map(str::to_string)
            .map_err(|e| Error::ProtocolViolation(format!("Invalid UTF-8 string: {e}")))
    }

    /// Read a null-terminated UTF-8 string, sharing storage with equal short strings seen before
    pub fn receive_canonical_string(&mut self) -> Result<Arc<str>> {
        let bytes = self.receive_cstring_bytes()?;
        if let Some(s) = self.canonical.get(bytes.as_slice()) {
            return Ok(Arc::clone(s));
        }
        let s: Arc<str> = from_utf8(&bytes)
            .map_err(|e| Error::ProtocolViolation(format!("Invalid UTF-8 string: {e}")))?
            .into();
        if bytes.len() <= CANONICAL_MAX_LEN {
            if self.canonical.len() >= CANONICAL_MAX_ENTRIES {
                self.canonical.clear();
            }
            self.canonical.insert(bytes.into_boxed_slice(), Arc::clone(&s));
        }
        Ok(s)
    }

    fn allocate(&self, len: usize) -> Option<Vec<u8>> {
        #[cfg(test)]
        if self.alloc_limit.is_some_and(|limit| len > limit) {
            return None;
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).ok()?;
        buf.resize(len, 0);
        Some(buf)
    }

    /// Read one data-row body: message length, field count, then `{len, bytes}` per field
    ///
    /// A field length of `-1` is SQL NULL. When a field buffer cannot be allocated
    /// the remaining field bytes are skipped and [`Error::OutOfMemory`] is returned,
    /// leaving the stream positioned at the next message.
    #[tracing::instrument(skip_all)]
    pub fn receive_tuple(&mut self) -> Result<Tuple> {
        let message_size = self.receive_integer4()?;
        let num_fields = self.receive_integer2()?;
        let num_fields = usize::try_from(num_fields)
            .map_err(|_| Error::ProtocolViolation(format!("Negative field count: {num_fields}")))?;

        let header_size = 4 + 2 + 4 * num_fields as i64;
        let data_size = u64::try_from(i64::from(message_size) - header_size).map_err(|_| {
            Error::ProtocolViolation(format!(
                "Data row length {message_size} is too small for {num_fields} fields"
            ))
        })?;
        self.set_max_row_size_bytes(data_size);
        self.increase_byte_counter(data_size)?;

        let mut values = Vec::with_capacity(num_fields);
        let mut out_of_memory = false;
        for _ in 0..num_fields {
            let size = self.receive_integer4()?;
            if size == -1 {
                values.push(None);
                continue;
            }
            let size = usize::try_from(size)
                .map_err(|_| Error::ProtocolViolation(format!("Invalid field length: {size}")))?;
            if out_of_memory {
                self.skip(size)?;
                continue;
            }
            match self.allocate(size) {
                Some(mut buf) => {
                    self.read_exact(&mut buf)?;
                    values.push(Some(buf));
                }
                None => {
                    tracing::warn!(size, "failed to allocate field buffer, skipping row");
                    out_of_memory = true;
                    self.skip(size)?;
                }
            }
        }

        if out_of_memory {
            return Err(Error::OutOfMemory);
        }
        Ok(Tuple::new(values))
    }

    fn set_max_row_size_bytes(&mut self, row_size: u64) {
        let row_size = usize::try_from(row_size).unwrap_or(usize::MAX);
        if row_size > self.max_row_size_bytes {
            self.max_row_size_bytes = row_size;
        }
    }

    /// Largest data-row body seen since the last [`ByteStream::clear_max_row_size_bytes`]
    pub fn max_row_size_bytes(&self) -> usize {
        self.max_row_size_bytes
    }

    pub fn clear_max_row_size_bytes(&mut self) {
        self.max_row_size_bytes = 0;
    }

    /// Limit on cumulative data-row bytes per request, `None` for unlimited
    pub fn set_max_result_buffer(&mut self, limit: Option<u64>) {
        self.max_result_buffer = limit;
    }

    pub fn max_result_buffer(&self) -> Option<u64> {
        self.max_result_buffer
    }

    pub fn result_buffer_byte_count(&self) -> u64 {
        self.result_buffer_byte_count
    }

    pub fn clear_result_buffer_count(&mut self) {
        self.result_buffer_byte_count = 0;
    }

    fn increase_byte_counter(&mut self, value: u64) -> Result<()> {
        if let Some(limit) = self.max_result_buffer {
            self.result_buffer_byte_count = self.result_buffer_byte_count.saturating_add(value);
            if self.result_buffer_byte_count > limit {
                return Err(Error::ResultTooLarge {
                    received: self.result_buffer_byte_count,
                    limit,
                });
            }
        }
        Ok(())
    }

    /// Flush pending output and shut the socket down
    ///
    /// Every step is attempted even if an earlier one fails; the first failure is returned.
    /// Calling `close` on a closed stream is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        let mut first_error = None;

        let inner = stream.get_mut();
        if !self.output.is_empty() {
            if let Err(e) = inner.write_all(&self.output).and_then(|()| inner.flush()) {
                tracing::debug!("failed to flush output on close: {e}");
                first_error.get_or_insert(e);
            }
        }
        self.output.clear();

        match inner.shutdown() {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => {
                tracing::debug!("failed to shut down socket on close: {e}");
                first_error.get_or_insert(e);
            }
            _ => {}
        }
        drop(stream);

        self.canonical.clear();
        match first_error {
            Some(e) => Err(Error::IoError(e)),
            None => Ok(()),
        }
    }

    /// Shut the socket down without flushing pending output
    pub fn abort(&mut self) {
        self.output.clear();
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.get_mut().shutdown() {
                tracing::debug!("failed to shut down socket on abort: {e}");
            }
        }
    }
}

impl ByteStream<TcpStream> {
    /// A handle that can shut this stream's socket down from another thread
    pub fn cancel_handle(&self) -> Result<CancelHandle> {
        let socket = self.get_ref().ok_or(Error::ConnectionClosed)?;
        Ok(CancelHandle {
            socket: socket.try_clone()?,
        })
    }
}

/// Interrupts a blocked read on a connection by shutting its socket down
#[derive(Debug)]
pub struct CancelHandle {
    socket: TcpStream,
}

impl CancelHandle {
    pub fn cancel(&self) -> Result<()> {
        self.socket.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

impl<S: Transport> Drop for ByteStream<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::debug!("error closing stream: {e}");
        }
    }
}

fn eof_or_io(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::UnexpectedEof
    } else {
        Error::IoError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Mock {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        shutdown_fails: bool,
        shut_down: bool,
    }

    impl Mock {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
                shutdown_fails: false,
                shut_down: false,
            }
        }
    }

    impl Read for Mock {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Mock {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for Mock {
        fn shutdown(&mut self) -> io::Result<()> {
            self.shut_down = true;
            if self.shutdown_fails {
                return Err(io::Error::other("shutdown failed"));
            }
            Ok(())
        }

        fn input_ready(&mut self) -> io::Result<bool> {
            Ok(self.input.position() < self.input.get_ref().len() as u64)
        }
    }

    fn data_row(fields: &[Option<&[u8]>]) -> Vec<u8> {
        let body: usize = fields.iter().flatten().map(|f| f.len()).sum();
        let mut out = Vec::new();
        out.extend_from_slice(&((4 + 2 + 4 * fields.len() + body) as i32).to_be_bytes());
        out.extend_from_slice(&(fields.len() as i16).to_be_bytes());
        for field in fields {
            match field {
                Some(bytes) => {
                    out.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                    out.extend_from_slice(bytes);
                }
                None => out.extend_from_slice(&(-1_i32).to_be_bytes()),
            }
        }
        out
    }

    #[test]
    fn tuple_with_null() {
        let mut input = data_row(&[Some(&[0, 0, 0, 1]), None, Some(b"hi")]);
        input.push(b'Z');
        let mut stream = ByteStream::new(Mock::new(input));
        let tuple = stream.receive_tuple().unwrap();
        assert_eq!(tuple.len(), 3);
        assert_eq!(tuple.get(0).map(<[u8]>::len), Some(4));
        assert!(tuple.is_null(1));
        assert_eq!(tuple.get(2), Some(&b"hi"[..]));
        assert_eq!(stream.max_row_size_bytes(), 6);
        assert_eq!(stream.receive_char().unwrap(), b'Z');
    }

    #[test]
    fn result_buffer_budget() {
        let mut input = data_row(&[Some(b"abcd")]);
        input.extend(data_row(&[Some(b"efgh")]));
        let mut stream = ByteStream::new(Mock::new(input));
        stream.set_max_result_buffer(Some(6));
        stream.receive_tuple().unwrap();
        assert_eq!(stream.result_buffer_byte_count(), 4);
        let err = stream.receive_tuple().unwrap_err();
        assert!(matches!(err, Error::ResultTooLarge { received: 8, limit: 6 }));
    }

    #[test]
    fn allocation_failure_skips_remaining_fields() {
        let mut input = data_row(&[Some(b"ab"), Some(b"0123456789"), Some(b"xyz")]);
        input.push(b'C');
        let mut stream = ByteStream::new(Mock::new(input));
        stream.alloc_limit = Some(4);
        assert!(matches!(stream.receive_tuple(), Err(Error::OutOfMemory)));
        assert_eq!(stream.receive_char().unwrap(), b'C');
    }

    #[test]
    fn short_read_is_eof() {
        let mut stream = ByteStream::new(Mock::new(vec![0, 1]));
        assert!(matches!(stream.receive_integer4(), Err(Error::UnexpectedEof)));

        let mut stream = ByteStream::new(Mock::new(b"abc".to_vec()));
        assert!(matches!(stream.receive_string(), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn strings() {
        let mut stream = ByteStream::new(Mock::new(b"id\0id\0name\0".to_vec()));
        let a = stream.receive_canonical_string().unwrap();
        let b = stream.receive_canonical_string().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(stream.receive_string().unwrap(), "name");

        let mut stream = ByteStream::new(Mock::new(vec![0xff, 0xfe, 0]));
        assert!(matches!(stream.receive_string(), Err(Error::ProtocolViolation(_))));
    }

    #[test]
    fn pending_input() {
        let mut stream = ByteStream::new(Mock::new(b"ab".to_vec()));
        assert!(stream.has_pending_input().unwrap());
        assert_eq!(stream.receive_char().unwrap(), b'a');
        // the rest sits in the read buffer
        assert!(stream.has_pending_input().unwrap());
        assert_eq!(stream.receive_char().unwrap(), b'b');
        assert!(!stream.has_pending_input().unwrap());
    }

    #[test]
    fn send_pads_with_zeros() {
        let mut stream = ByteStream::new(Mock::new(Vec::new()));
        stream.send_char(b'x');
        stream.send_integer4(7);
        stream.send_padded(b"ab", 4);
        stream.flush().unwrap();
        let out = &stream.get_ref().unwrap().output;
        assert_eq!(out, &[b'x', 0, 0, 0, 7, b'a', b'b', 0, 0]);
    }

    #[test]
    fn close_is_best_effort_and_idempotent() {
        let mut mock = Mock::new(Vec::new());
        mock.shutdown_fails = true;
        let mut stream = ByteStream::new(mock);
        stream.send(b"pending");
        assert!(stream.close().is_err());
        assert!(stream.is_closed());
        assert!(stream.close().is_ok());
        assert!(matches!(stream.receive_char(), Err(Error::ConnectionClosed)));
    }
}
