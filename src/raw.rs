//! Typed decoding of column values.
//!
//! Text format is decoded for every type. Binary format is decoded only for the
//! fixed-width numeric types listed in [`BinaryNumber::decode`]; anything else sent in
//! binary is reported as a type mismatch.

use crate::col::{Field, FieldFormat};
use crate::constant::SqlType;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use simdutf8::basic::from_utf8;

/// A fixed-width binary column value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryNumber {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl BinaryNumber {
    pub fn decode(field: &Field, data: &[u8]) -> Result<Self> {
        let exact = |len: usize| -> Result<()> {
            if data.len() != len {
                return Err(Error::ProtocolViolation(format!(
                    "Binary {} column has {} bytes, expected {len}",
                    field.sql_type,
                    data.len()
                )));
            }
            Ok(())
        };
        let value = match field.sql_type {
            SqlType::SMALLINT => {
                exact(2)?;
                Self::Int(i64::from(read_int_2(data)?.0))
            }
            SqlType::INTEGER => {
                exact(4)?;
                Self::Int(i64::from(read_int_4(data)?.0))
            }
            SqlType::BIGINT => {
                exact(8)?;
                Self::Int(read_int_8(data)?.0)
            }
            SqlType::REAL | SqlType::FLOAT => {
                exact(4)?;
                let bits = read_int_4(data)?.0 as u32;
                Self::Float(f64::from(f32::from_bits(bits)))
            }
            SqlType::DOUBLE => {
                exact(8)?;
                Self::Float(f64::from_bits(read_int_8(data)?.0 as u64))
            }
            SqlType::BOOLEAN | SqlType::BIT => {
                exact(1)?;
                Self::Bool(read_int_1(data)?.0 != 0)
            }
            other => {
                return Err(Error::DataTypeMismatch {
                    sql_type: format!("binary {other}"),
                    target: "number",
                });
            }
        };
        Ok(value)
    }
}

/// Types that can be decoded from a non-NULL column value
pub trait FromColumn: Sized {
    fn from_text(text: &str, field: &Field) -> Result<Self>;

    fn from_binary(data: &[u8], field: &Field) -> Result<Self> {
        let _ = data;
        Err(Error::DataTypeMismatch {
            sql_type: format!("binary {}", field.sql_type),
            target: std::any::type_name::<Self>(),
        })
    }
}

/// Decode one non-NULL column value according to its wire format
pub fn decode<T: FromColumn>(field: &Field, data: &[u8]) -> Result<T> {
    match field.format {
        FieldFormat::Text => {
            let text = from_utf8(data).map_err(|_| Error::DataTypeMismatch {
                sql_type: field.sql_type.to_string(),
                target: std::any::type_name::<T>(),
            })?;
            T::from_text(text, field)
        }
        FieldFormat::Binary => T::from_binary(data, field),
    }
}

fn out_of_range<T>(value: impl ToString) -> Error {
    Error::NumericValueOutOfRange {
        target: std::any::type_name::<T>(),
        value: value.to_string(),
    }
}

fn bad_text<T>(value: &str) -> Error {
    Error::InvalidTextRepresentation {
        target: std::any::type_name::<T>(),
        value: value.to_string(),
    }
}

/// Parse an integer, accepting decimal forms such as `1.0` or `1e3` when they fit
fn parse_integer<T: TryFrom<i64> + std::str::FromStr>(text: &str) -> Result<T> {
    let s = text.trim();
    if let Ok(v) = s.parse::<T>() {
        return Ok(v);
    }
    if let Ok(v) = s.parse::<i64>() {
        return T::try_from(v).map_err(|_| out_of_range::<T>(s));
    }
    let f: f64 = s.parse().map_err(|_| bad_text::<T>(s))?;
    if !f.is_finite() {
        return Err(bad_text::<T>(s));
    }
    let truncated = f.trunc();
    let in_i64 = truncated >= i64::MIN as f64 && truncated < i64::MAX as f64;
    if !in_i64 {
        return Err(out_of_range::<T>(s));
    }
    let whole = truncated as i64;
    T::try_from(whole).map_err(|_| out_of_range::<T>(s))
}

macro_rules! impl_from_column_int {
    ($($ty:ty),*) => {
        $(
            impl FromColumn for $ty {
                fn from_text(text: &str, _field: &Field) -> Result<Self> {
                    parse_integer(text)
                }

                fn from_binary(data: &[u8], field: &Field) -> Result<Self> {
                    match BinaryNumber::decode(field, data)? {
                        BinaryNumber::Int(v) => <$ty>::try_from(v).map_err(|_| out_of_range::<$ty>(v)),
                        BinaryNumber::Bool(v) => Ok(<$ty>::from(v)),
                        BinaryNumber::Float(v) => Err(Error::DataTypeMismatch {
                            sql_type: format!("{} ({v})", field.sql_type),
                            target: stringify!($ty),
                        }),
                    }
                }
            }
        )*
    };
}

impl_from_column_int!(i16, i32, i64);

impl FromColumn for f64 {
    fn from_text(text: &str, _field: &Field) -> Result<Self> {
        let s = text.trim();
        s.parse().map_err(|_| bad_text::<f64>(s))
    }

    fn from_binary(data: &[u8], field: &Field) -> Result<Self> {
        match BinaryNumber::decode(field, data)? {
            BinaryNumber::Int(v) => Ok(v as f64),
            BinaryNumber::Float(v) => Ok(v),
            BinaryNumber::Bool(v) => Ok(f64::from(u8::from(v))),
        }
    }
}

impl FromColumn for f32 {
    fn from_text(text: &str, _field: &Field) -> Result<Self> {
        let s = text.trim();
        s.parse().map_err(|_| bad_text::<f32>(s))
    }

    fn from_binary(data: &[u8], field: &Field) -> Result<Self> {
        let v = f64::from_binary(data, field)?;
        if v.is_finite() && (v > f64::from(f32::MAX) || v < f64::from(f32::MIN)) {
            return Err(out_of_range::<f32>(v));
        }
        Ok(v as f32)
    }
}

impl FromColumn for bool {
    fn from_text(text: &str, _field: &Field) -> Result<Self> {
        let s = text.trim();
        match s.to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
            "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
            _ => Err(bad_text::<bool>(s)),
        }
    }

    fn from_binary(data: &[u8], field: &Field) -> Result<Self> {
        match BinaryNumber::decode(field, data)? {
            BinaryNumber::Bool(v) => Ok(v),
            BinaryNumber::Int(v) => Ok(v != 0),
            BinaryNumber::Float(v) => Ok(v != 0.0),
        }
    }
}

impl FromColumn for String {
    fn from_text(text: &str, _field: &Field) -> Result<Self> {
        Ok(text.to_string())
    }

    fn from_binary(data: &[u8], field: &Field) -> Result<Self> {
        match BinaryNumber::decode(field, data) {
            Ok(BinaryNumber::Int(v)) => Ok(v.to_string()),
            Ok(BinaryNumber::Float(v)) => Ok(v.to_string()),
            Ok(BinaryNumber::Bool(v)) => Ok(if v { "t" } else { "f" }.to_string()),
            Err(Error::DataTypeMismatch { .. }) => from_utf8(data)
                .map(ToString::to_string)
                .map_err(|_| Error::DataTypeMismatch {
                    sql_type: format!("binary {}", field.sql_type),
                    target: "String",
                }),
            Err(e) => Err(e),
        }
    }
}

impl FromColumn for Vec<u8> {
    fn from_text(text: &str, _field: &Field) -> Result<Self> {
        Ok(text.as_bytes().to_vec())
    }

    fn from_binary(data: &[u8], _field: &Field) -> Result<Self> {
        Ok(data.to_vec())
    }
}

#[cfg(feature = "with-chrono")]
mod chrono_impl {
    use super::{FromColumn, bad_text};
    use crate::col::Field;
    use crate::error::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    impl FromColumn for NaiveDate {
        fn from_text(text: &str, _field: &Field) -> Result<Self> {
            NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| bad_text::<Self>(text))
        }
    }

    impl FromColumn for NaiveTime {
        fn from_text(text: &str, _field: &Field) -> Result<Self> {
            NaiveTime::parse_from_str(text.trim(), "%H:%M:%S%.f").map_err(|_| bad_text::<Self>(text))
        }
    }

    impl FromColumn for NaiveDateTime {
        fn from_text(text: &str, _field: &Field) -> Result<Self> {
            let s = text.trim();
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map_err(|_| bad_text::<Self>(s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(sql_type: SqlType) -> Field {
        Field::new("c", sql_type, -1, FieldFormat::Text)
    }

    fn binary(sql_type: SqlType) -> Field {
        Field::new("c", sql_type, -1, FieldFormat::Binary)
    }

    #[test]
    fn text_integers() {
        let f = text(SqlType::INTEGER);
        assert_eq!(decode::<i32>(&f, b" 42 ").unwrap(), 42);
        assert_eq!(decode::<i64>(&f, b"1.9").unwrap(), 1);
        assert!(matches!(
            decode::<i16>(&f, b"70000"),
            Err(Error::NumericValueOutOfRange { .. })
        ));
        assert!(matches!(
            decode::<i32>(&f, b"abc"),
            Err(Error::InvalidTextRepresentation { .. })
        ));
    }

    #[test]
    fn binary_fast_path() {
        assert_eq!(
            decode::<i32>(&binary(SqlType::INTEGER), &7_i32.to_be_bytes()).unwrap(),
            7
        );
        assert_eq!(
            decode::<i64>(&binary(SqlType::SMALLINT), &(-3_i16).to_be_bytes()).unwrap(),
            -3
        );
        assert_eq!(
            decode::<f64>(&binary(SqlType::DOUBLE), &2.5_f64.to_be_bytes()).unwrap(),
            2.5
        );
        assert_eq!(
            decode::<f32>(&binary(SqlType::REAL), &1.25_f32.to_be_bytes()).unwrap(),
            1.25
        );
        assert_eq!(
            decode::<String>(&binary(SqlType::BIGINT), &9_i64.to_be_bytes()).unwrap(),
            "9"
        );
        assert!(matches!(
            decode::<i16>(&binary(SqlType::BIGINT), &i64::MAX.to_be_bytes()),
            Err(Error::NumericValueOutOfRange { .. })
        ));
    }

    #[test]
    fn binary_unsupported_type() {
        assert!(matches!(
            decode::<i32>(&binary(SqlType::NUMERIC), b"\x00\x01"),
            Err(Error::DataTypeMismatch { .. })
        ));
        assert_eq!(
            decode::<String>(&binary(SqlType::VARCHAR), b"abc").unwrap(),
            "abc"
        );
    }

    #[test]
    fn binary_wrong_width() {
        assert!(matches!(
            decode::<i32>(&binary(SqlType::INTEGER), b"\x00\x01"),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn text_bool() {
        let f = text(SqlType::BOOLEAN);
        assert!(decode::<bool>(&f, b"t").unwrap());
        assert!(decode::<bool>(&f, b"YES").unwrap());
        assert!(!decode::<bool>(&f, b"off").unwrap());
        assert!(decode::<bool>(&f, b"maybe").is_err());
    }
}
