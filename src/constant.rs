use std::borrow::Cow;
use std::fmt;

/// Five-character SQLSTATE code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlState(Cow<'static, str>);

impl SqlState {
    pub const TOO_MANY_RESULTS: Self = Self::new("0100E");
    pub const NO_DATA: Self = Self::new("02000");
    pub const CONNECTION_UNABLE_TO_CONNECT: Self = Self::new("08001");
    pub const CONNECTION_DOES_NOT_EXIST: Self = Self::new("08003");
    pub const CONNECTION_REJECTED: Self = Self::new("08004");
    pub const CONNECTION_FAILURE: Self = Self::new("08006");
    pub const PROTOCOL_VIOLATION: Self = Self::new("08P01");
    pub const COMMUNICATION_ERROR: Self = Self::new("08S01");
    pub const NOT_IMPLEMENTED: Self = Self::new("0A000");
    pub const DATA_ERROR: Self = Self::new("22000");
    pub const NUMERIC_VALUE_OUT_OF_RANGE: Self = Self::new("22003");
    pub const BAD_DATETIME_FORMAT: Self = Self::new("22007");
    pub const INVALID_PARAMETER_VALUE: Self = Self::new("22023");
    pub const INVALID_TEXT_REPRESENTATION: Self = Self::new("22P02");
    pub const INVALID_CURSOR_STATE: Self = Self::new("24000");
    pub const SYNTAX_ERROR: Self = Self::new("42601");
    pub const UNDEFINED_COLUMN: Self = Self::new("42703");
    pub const DATA_TYPE_MISMATCH: Self = Self::new("42821");
    pub const OUT_OF_MEMORY: Self = Self::new("53200");
    pub const OBJECT_NOT_IN_STATE: Self = Self::new("55000");
    pub const IO_ERROR: Self = Self::new("58030");
    pub const INTERNAL_ERROR: Self = Self::new("XX000");
    pub const UNEXPECTED_ERROR: Self = Self::new("99999");

    const fn new(code: &'static str) -> Self {
        Self(Cow::Borrowed(code))
    }

    /// Wrap a code received from the server
    pub fn from_code(code: &str) -> Self {
        Self(Cow::Owned(code.to_string()))
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// The two-character class, e.g. `08` for connection exceptions
    pub fn class(&self) -> &str {
        self.0.get(..2).unwrap_or(&self.0)
    }
}

impl fmt::Display for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column type tag carried by a row description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlType(pub i32);

impl SqlType {
    pub const BIT: Self = Self(-7);
    pub const TINYINT: Self = Self(-6);
    pub const SMALLINT: Self = Self(5);
    pub const INTEGER: Self = Self(4);
    pub const BIGINT: Self = Self(-5);
    pub const FLOAT: Self = Self(6);
    pub const REAL: Self = Self(7);
    pub const DOUBLE: Self = Self(8);
    pub const NUMERIC: Self = Self(2);
    pub const DECIMAL: Self = Self(3);
    pub const CHAR: Self = Self(1);
    pub const VARCHAR: Self = Self(12);
    pub const LONGVARCHAR: Self = Self(-1);
    pub const DATE: Self = Self(91);
    pub const TIME: Self = Self(92);
    pub const TIMESTAMP: Self = Self(93);
    pub const BINARY: Self = Self(-2);
    pub const VARBINARY: Self = Self(-3);
    pub const NULL: Self = Self(0);
    pub const BOOLEAN: Self = Self(16);
    pub const TIME_WITH_TIMEZONE: Self = Self(2013);
    pub const TIMESTAMP_WITH_TIMEZONE: Self = Self(2014);

    pub fn name(self) -> &'static str {
        match self {
            Self::BIT => "BIT",
            Self::TINYINT => "TINYINT",
            Self::SMALLINT => "SMALLINT",
            Self::INTEGER => "INTEGER",
            Self::BIGINT => "BIGINT",
            Self::FLOAT => "FLOAT",
            Self::REAL => "REAL",
            Self::DOUBLE => "DOUBLE",
            Self::NUMERIC => "NUMERIC",
            Self::DECIMAL => "DECIMAL",
            Self::CHAR => "CHAR",
            Self::VARCHAR => "VARCHAR",
            Self::LONGVARCHAR => "LONGVARCHAR",
            Self::DATE => "DATE",
            Self::TIME => "TIME",
            Self::TIMESTAMP => "TIMESTAMP",
            Self::BINARY => "BINARY",
            Self::VARBINARY => "VARBINARY",
            Self::NULL => "NULL",
            Self::BOOLEAN => "BOOLEAN",
            Self::TIME_WITH_TIMEZONE => "TIME_WITH_TIMEZONE",
            Self::TIMESTAMP_WITH_TIMEZONE => "TIMESTAMP_WITH_TIMEZONE",
            _ => "OTHER",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of a bound parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Oid(pub u32);

impl Oid {
    pub const UNSPECIFIED: Self = Self(0);
    pub const BOOL: Self = Self(16);
    pub const BYTEA: Self = Self(17);
    pub const INT8: Self = Self(20);
    pub const INT2: Self = Self(21);
    pub const INT4: Self = Self(23);
    pub const TEXT: Self = Self(25);
    pub const FLOAT4: Self = Self(700);
    pub const FLOAT8: Self = Self(701);
    pub const VARCHAR: Self = Self(1043);
    pub const DATE: Self = Self(1082);
    pub const TIME: Self = Self(1083);
    pub const TIMESTAMP: Self = Self(1114);
    pub const TIMESTAMPTZ: Self = Self(1184);
    pub const INTERVAL: Self = Self(1186);
    pub const TIMETZ: Self = Self(1266);
    pub const NUMERIC: Self = Self(1700);

    /// Cast appended to a quoted literal of this type
    pub fn cast_suffix(self) -> &'static str {
        match self {
            Self::TIMESTAMP => "::timestamp",
            Self::TIMESTAMPTZ => "::timestamp with time zone",
            Self::TIME => "::time",
            Self::TIMETZ => "::time with time zone",
            Self::DATE => "::date",
            Self::INTERVAL => "::interval",
            Self::NUMERIC => "::numeric",
            Self::BYTEA => "::bytea",
            _ => "",
        }
    }
}

bitflags::bitflags! {
    /// Per-slot parameter flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParamFlags: u8 {
        const IN = 1;
        const OUT = 2;
        const INOUT = Self::IN.bits() | Self::OUT.bits();
        const BINARY = 4;
    }
}

bitflags::bitflags! {
    /// Flags accepted by `QueryExecutor::execute_with_flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct QueryFlags: u32 {
        /// Rows are decoded and discarded
        const NO_RESULTS = 4;
        /// Report the command status even after a row-returning result
        const BOTH_ROWS_AND_STATUS = 64;
    }
}

/// Default server port
pub const DEFAULT_PORT: u16 = 58000;
