use std::sync::Arc;

use crate::constant::SqlType;
use crate::error::{Error, Result};

/// Wire format of a column's values
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldFormat {
    #[default]
    Text = 0,
    Binary = 1,
}

impl TryFrom<i16> for FieldFormat {
    type Error = Error;

    fn try_from(code: i16) -> Result<Self> {
        match code {
            0 => Ok(Self::Text),
            1 => Ok(Self::Binary),
            other => Err(Error::ProtocolViolation(format!(
                "Unknown field format code: {other}"
            ))),
        }
    }
}

/// One result column, decoded from a row description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Arc<str>,
    pub sql_type: SqlType,
    /// Declared byte size, negative when variable
    pub size: i32,
    pub format: FieldFormat,
}

impl Field {
    pub fn new(name: impl Into<Arc<str>>, sql_type: SqlType, size: i32, format: FieldFormat) -> Self {
        Self {
            name: name.into(),
            sql_type,
            size,
            format,
        }
    }

    pub fn is_binary(&self) -> bool {
        self.format == FieldFormat::Binary
    }
}
