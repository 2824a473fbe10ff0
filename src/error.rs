use thiserror::Error;

use crate::constant::SqlState;
use crate::protocol::response::ServerError;

pub use color_eyre::eyre::eyre;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Server Error: {0}")]
    ServerError(#[from] ServerError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Bad config error: {0}")]
    BadConfigError(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Result set exceeded maxResultBuffer limit. Received: {received}; Current limit: {limit}")]
    ResultTooLarge { received: u64, limit: u64 },

    #[error("The column index is out of range: {index}, number of columns: {count}")]
    InvalidParameterIndex { index: usize, count: usize },

    #[error("No value specified for parameter {0}")]
    UnboundParameter(usize),

    #[error("Invalid parameter value: {0}")]
    InvalidParameterValue(String),

    #[error("Ran out of memory retrieving query results")]
    OutOfMemory,

    #[error("Connection attempt failed: {0}")]
    ConnectionUnableToConnect(String),

    #[error("Connection attempt timed out")]
    ConnectTimeout,

    #[error("This connection has been closed")]
    ConnectionClosed,

    #[error("No results were returned by the query")]
    NoData,

    #[error("Multiple results were returned by the query")]
    TooManyResults,

    #[error("ResultSet not positioned properly, perhaps you need to call next")]
    InvalidCursorState,

    #[error("The column index is out of range: {index}, number of columns: {count}")]
    ColumnIndexOutOfRange { index: usize, count: usize },

    #[error("The column name {0} was not found in this ResultSet")]
    ColumnNotFound(String),

    #[error("Cannot decode {sql_type} column to {target}")]
    DataTypeMismatch {
        sql_type: String,
        target: &'static str,
    },

    #[error("Bad value for type {target}: {value}")]
    NumericValueOutOfRange { target: &'static str, value: String },

    #[error("Invalid input syntax for type {target}: {value}")]
    InvalidTextRepresentation { target: &'static str, value: String },

    #[error("{first}")]
    Chained { first: Box<Error>, next: Vec<Error> },

    #[error("Library bug: {0}")]
    LibraryBug(#[from] color_eyre::Report),
}

impl Error {
    /// The SQLSTATE reported for this error
    pub fn sql_state(&self) -> SqlState {
        match self {
            Error::ServerError(e) => SqlState::from_code(&e.sql_state),
            Error::IoError(_) | Error::UnexpectedEof | Error::ResultTooLarge { .. } => {
                SqlState::COMMUNICATION_ERROR
            }
            Error::ProtocolViolation(_) => SqlState::PROTOCOL_VIOLATION,
            Error::ConnectionUnableToConnect(_) | Error::ConnectTimeout => {
                SqlState::CONNECTION_UNABLE_TO_CONNECT
            }
            Error::ConnectionClosed => SqlState::CONNECTION_DOES_NOT_EXIST,
            Error::BadConfigError(_)
            | Error::InvalidParameterIndex { .. }
            | Error::UnboundParameter(_)
            | Error::InvalidParameterValue(_)
            | Error::ColumnIndexOutOfRange { .. } => SqlState::INVALID_PARAMETER_VALUE,
            Error::OutOfMemory => SqlState::OUT_OF_MEMORY,
            Error::NoData => SqlState::NO_DATA,
            Error::TooManyResults => SqlState::TOO_MANY_RESULTS,
            Error::InvalidCursorState => SqlState::INVALID_CURSOR_STATE,
            Error::ColumnNotFound(_) => SqlState::UNDEFINED_COLUMN,
            Error::DataTypeMismatch { .. } => SqlState::DATA_TYPE_MISMATCH,
            Error::NumericValueOutOfRange { .. } => SqlState::NUMERIC_VALUE_OUT_OF_RANGE,
            Error::InvalidTextRepresentation { .. } => SqlState::INVALID_TEXT_REPRESENTATION,
            Error::Chained { first, .. } => first.sql_state(),
            Error::LibraryBug(_) => SqlState::INTERNAL_ERROR,
        }
    }

    /// Returns `true` if the connection must not be used after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::IoError(_)
                | Error::UnexpectedEof
                | Error::ProtocolViolation(_)
                | Error::ResultTooLarge { .. }
                | Error::ConnectionClosed
                | Error::LibraryBug(_)
        )
    }

    /// Combine collected errors: the first is primary, the rest are chained behind it
    pub fn chain(errors: Vec<Error>) -> Option<Error> {
        let mut iter = errors.into_iter();
        let first = iter.next()?;
        let next: Vec<Error> = iter.collect();
        if next.is_empty() {
            return Some(first);
        }
        Some(Error::Chained {
            first: Box::new(first),
            next,
        })
    }

    /// Chain `next` behind this error and any errors already chained to it
    pub fn followed_by(self, next: Error) -> Error {
        match self {
            Error::Chained { first, next: mut rest } => {
                rest.push(next);
                Error::Chained { first, next: rest }
            }
            first => Error::Chained {
                first: Box::new(first),
                next: vec![next],
            },
        }
    }

    /// Iterate over this error and every error chained behind it
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        let (first, next): (&Error, &[Error]) = match self {
            Error::Chained { first, next } => (&**first, next.as_slice()),
            other => (other, &[]),
        };
        std::iter::once(first).chain(next.iter())
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
