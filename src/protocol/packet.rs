use std::fmt;

use serde::Serialize;
use zerocopy::byteorder::big_endian::I32 as I32BE;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::primitive::*;

/// Message header (zero-copy)
///
/// Layout:
/// - tag: 1 byte
/// - length: 4 bytes (big-endian, counts itself and the payload)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct MessageHeader {
    pub tag: u8,
    pub length: I32BE,
}

impl MessageHeader {
    pub fn encode(tag: MessageCode, payload_len: usize) -> Result<Self> {
        let length = i32::try_from(payload_len + 4)
            .map_err(|_| Error::InvalidParameterValue(format!("Message too large: {payload_len} bytes")))?;
        Ok(Self {
            tag: tag.0,
            length: I32BE::new(length),
        })
    }

    pub fn code(&self) -> MessageCode {
        MessageCode(self.tag)
    }

    /// Payload length, excluding the length field itself
    pub fn payload_len(&self) -> Result<usize> {
        let length = self.length.get();
        length
            .checked_sub(4)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                Error::ProtocolViolation(format!(
                    "Invalid message length {length} for {}",
                    self.code()
                ))
            })
    }
}

/// Leading byte of a wire message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageCode(pub u8);

impl MessageCode {
    // client
    pub const STARTUP: Self = Self(b'S');
    pub const QUERY: Self = Self(b'E');

    // server
    pub const COMMAND_COMPLETE: Self = Self(b'C');
    pub const DATA_ROW: Self = Self(b'D');
    pub const ERROR_RESPONSE: Self = Self(b'E');
    pub const EMPTY_QUERY_RESPONSE: Self = Self(b'I');
    pub const NOTICE_RESPONSE: Self = Self(b'N');
    pub const READY_FOR_QUERY: Self = Self(b'Z');
    pub const ROW_DESCRIPTION: Self = Self(b'T');
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::COMMAND_COMPLETE => "CommandComplete",
            Self::DATA_ROW => "DataRow",
            Self::ERROR_RESPONSE => "ErrorResponse",
            Self::EMPTY_QUERY_RESPONSE => "EmptyQueryResponse",
            Self::NOTICE_RESPONSE => "NoticeResponse",
            Self::READY_FOR_QUERY => "ReadyForQuery",
            Self::ROW_DESCRIPTION => "RowDescription",
            Self::STARTUP => "Startup",
            _ => return write!(f, "Unknown({:?})", char::from(self.0)),
        };
        f.write_str(name)
    }
}

/// Connection parameters sent in the startup message
#[derive(Debug, Serialize)]
pub struct StartupParams<'a> {
    pub url: &'a str,
    pub user: &'a str,
    pub password: &'a str,
}

/// Write a query message: tag, length, SQL bytes
pub fn write_query(out: &mut Vec<u8>, sql: &str) -> Result<()> {
    let header = MessageHeader::encode(MessageCode::QUERY, sql.len())?;
    write_bytes_fix(out, header.as_bytes());
    write_bytes_fix(out, sql.as_bytes());
    Ok(())
}

/// Write a startup message carrying the JSON-serialized parameters
pub fn write_startup(out: &mut Vec<u8>, params: &StartupParams<'_>) -> Result<()> {
    let body = serde_json::to_vec(params)
        .map_err(|e| Error::BadConfigError(format!("Failed to serialize startup parameters: {e}")))?;
    let header = MessageHeader::encode(MessageCode::STARTUP, body.len())?;
    write_bytes_fix(out, header.as_bytes());
    write_bytes_fix(out, &body);
    Ok(())
}
