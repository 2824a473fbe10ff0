//! Placeholder storage and SQL-literal substitution.
//!
//! Parameters never travel out of band: each bound value is rendered as SQL text and
//! spliced into the query in place of its `?` marker before the query is sent.

use std::fmt::Write as _;

use crate::constant::{Oid, ParamFlags};
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::value::Value;

/// Contents of a bound slot
#[derive(Debug, Clone, PartialEq)]
enum Bound {
    Null,
    /// Fixed-width big-endian encoding tagged with the slot's type
    Binary(Vec<u8>),
    Text(String),
}

/// Bound values for the `?` placeholders of one statement
///
/// Indexes are 1-based. The placeholder count is fixed when the list is created.
#[derive(Debug, Clone, Default)]
pub struct ParameterList {
    values: Vec<Option<Bound>>,
    types: Vec<Oid>,
    flags: Vec<ParamFlags>,
}

impl ParameterList {
    /// Create a list sized to the number of `?` characters in `sql`
    pub fn new(sql: &str) -> Self {
        Self::with_count(memchr::memchr_iter(b'?', sql.as_bytes()).count())
    }

    pub fn with_count(count: usize) -> Self {
        Self {
            values: vec![None; count],
            types: vec![Oid::UNSPECIFIED; count],
            flags: vec![ParamFlags::empty(); count],
        }
    }

    pub fn param_count(&self) -> usize {
        self.values.len()
    }

    pub fn param_types(&self) -> &[Oid] {
        &self.types
    }

    pub fn flags(&self) -> &[ParamFlags] {
        &self.flags
    }

    fn slot(&self, index: usize) -> Result<usize> {
        if index < 1 || index > self.values.len() {
            return Err(Error::InvalidParameterIndex {
                index,
                count: self.values.len(),
            });
        }
        Ok(index - 1)
    }

    fn bind_slot(&mut self, index: usize, value: Bound, oid: Oid, binary: bool) -> Result<()> {
        let i = self.slot(index)?;
        let is_null = value == Bound::Null;
        self.values[i] = Some(value);

        let direction = self.flags[i] & ParamFlags::INOUT;
        let format = if binary {
            ParamFlags::BINARY
        } else {
            ParamFlags::empty()
        };
        self.flags[i] = direction | ParamFlags::IN | format;

        // an untyped NULL keeps the type of an earlier binding
        if !(is_null && oid == Oid::UNSPECIFIED && self.types[i] != Oid::UNSPECIFIED) {
            self.types[i] = oid;
        }
        Ok(())
    }

    pub fn set_null(&mut self, index: usize, oid: Oid) -> Result<()> {
        self.bind_slot(index, Bound::Null, oid, false)
    }

    pub fn set_string_parameter(&mut self, index: usize, value: &str, oid: Oid) -> Result<()> {
        check_no_nul(value)?;
        self.bind_slot(index, Bound::Text(value.to_string()), oid, false)
    }

    pub fn set_int_parameter(&mut self, index: usize, value: i32) -> Result<()> {
        let mut data = Vec::with_capacity(4);
        write_int_4(&mut data, value);
        self.bind_slot(index, Bound::Binary(data), Oid::INT4, true)
    }

    pub fn set_literal_parameter(&mut self, index: usize, value: &str, oid: Oid) -> Result<()> {
        check_no_nul(value)?;
        self.bind_slot(index, Bound::Text(value.to_string()), oid, false)
    }

    /// Bind a fixed-width big-endian value of type INT2, INT4, INT8, FLOAT4, FLOAT8 or BOOL
    ///
    /// Any other type, or data of the wrong width, is rejected with
    /// [`Error::InvalidParameterValue`].
    pub fn set_binary_parameter(&mut self, index: usize, data: Vec<u8>, oid: Oid) -> Result<()> {
        let Some(width) = binary_width(oid) else {
            return Err(Error::InvalidParameterValue(format!(
                "Binary format is not supported for type {}",
                oid.0
            )));
        };
        if data.len() != width {
            return Err(Error::InvalidParameterValue(format!(
                "Type {} takes {width} bytes in binary format, got {}",
                oid.0,
                data.len()
            )));
        }
        self.bind_slot(index, Bound::Binary(data), oid, true)
    }

    /// Bind any [`Value`], choosing the encoding and type from its variant
    pub fn bind(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let mut data = Vec::with_capacity(8);
        match value.into() {
            Value::Null => self.set_null(index, Oid::UNSPECIFIED),
            Value::Bool(v) => {
                write_int_1(&mut data, u8::from(v));
                self.set_binary_parameter(index, data, Oid::BOOL)
            }
            Value::Short(v) => {
                write_int_2(&mut data, v);
                self.set_binary_parameter(index, data, Oid::INT2)
            }
            Value::Int(v) => self.set_int_parameter(index, v),
            Value::Long(v) => {
                write_int_8(&mut data, v);
                self.set_binary_parameter(index, data, Oid::INT8)
            }
            Value::Float(v) => {
                write_bytes_fix(&mut data, &v.to_bits().to_be_bytes());
                self.set_binary_parameter(index, data, Oid::FLOAT4)
            }
            Value::Double(v) => {
                write_bytes_fix(&mut data, &v.to_bits().to_be_bytes());
                self.set_binary_parameter(index, data, Oid::FLOAT8)
            }
            Value::Numeric(v) => self.set_string_parameter(index, &v, Oid::NUMERIC),
            Value::Text(v) => self.set_string_parameter(index, &v, Oid::VARCHAR),
            Value::Bytes(v) => {
                let mut hex = String::with_capacity(2 + v.len() * 2);
                hex.push_str("\\x");
                for byte in &v {
                    let _ = write!(hex, "{byte:02x}");
                }
                self.set_string_parameter(index, &hex, Oid::BYTEA)
            }
            Value::Date(v) => self.set_string_parameter(index, &v, Oid::DATE),
            Value::Time(v) => self.set_string_parameter(index, &v, Oid::TIME),
            Value::TimeTz(v) => self.set_string_parameter(index, &v, Oid::TIMETZ),
            Value::Timestamp(v) => self.set_string_parameter(index, &v, Oid::TIMESTAMP),
            Value::TimestampTz(v) => self.set_string_parameter(index, &v, Oid::TIMESTAMPTZ),
            Value::Interval(v) => self.set_string_parameter(index, &v, Oid::INTERVAL),
        }
    }

    pub fn is_bound(&self, index: usize) -> Result<bool> {
        Ok(self.values[self.slot(index)?].is_some())
    }

    /// Fails with the first (1-based) unbound index
    pub fn check_all_bound(&self) -> Result<()> {
        match self.values.iter().position(Option::is_none) {
            Some(i) => Err(Error::UnboundParameter(i + 1)),
            None => Ok(()),
        }
    }

    /// Unbind every slot, keeping the placeholder count
    pub fn clear(&mut self) {
        self.values.fill(None);
        self.types.fill(Oid::UNSPECIFIED);
        self.flags.fill(ParamFlags::empty());
    }

    /// Render slot `index` as SQL text
    ///
    /// Unbound slots render as `?` and NULLs as `NULL`. Text values are quoted and
    /// escaped for the given `standard_conforming_strings` setting, followed by a cast
    /// when the declared type needs one.
    pub fn to_sql_literal(&self, index: usize, standard_conforming_strings: bool) -> Result<String> {
        let i = self.slot(index)?;
        let literal = match &self.values[i] {
            None => "?".to_string(),
            Some(Bound::Null) => "NULL".to_string(),
            Some(Bound::Binary(data)) => render_binary(data, self.types[i])?,
            Some(Bound::Text(text)) => {
                let mut out = String::with_capacity(text.len() + 3);
                out.push('\'');
                escape_literal(&mut out, text, standard_conforming_strings)?;
                out.push('\'');
                out.push_str(self.types[i].cast_suffix());
                out
            }
        };
        Ok(literal)
    }
}

fn binary_width(oid: Oid) -> Option<usize> {
    match oid {
        Oid::BOOL => Some(1),
        Oid::INT2 => Some(2),
        Oid::INT4 | Oid::FLOAT4 => Some(4),
        Oid::INT8 | Oid::FLOAT8 => Some(8),
        _ => None,
    }
}

fn render_binary(data: &[u8], oid: Oid) -> Result<String> {
    let text = match oid {
        Oid::INT2 => read_int_2(data)?.0.to_string(),
        Oid::INT4 => read_int_4(data)?.0.to_string(),
        Oid::INT8 => read_int_8(data)?.0.to_string(),
        Oid::FLOAT4 => {
            let v = f32::from_bits(read_int_4(data)?.0 as u32);
            render_float(v.is_nan(), v.is_infinite(), v.is_sign_negative(), "real")
                .unwrap_or_else(|| format!("{v:?}"))
        }
        Oid::FLOAT8 => {
            let v = f64::from_bits(read_int_8(data)?.0 as u64);
            render_float(v.is_nan(), v.is_infinite(), v.is_sign_negative(), "double precision")
                .unwrap_or_else(|| format!("{v:?}"))
        }
        Oid::BOOL => {
            let (v, _) = read_int_1(data)?;
            let text = if v == 0 { "FALSE" } else { "TRUE" };
            text.to_string()
        }
        other => {
            return Err(Error::InvalidParameterValue(format!(
                "Binary format is not supported for type {}",
                other.0
            )));
        }
    };
    Ok(text)
}

fn render_float(nan: bool, infinite: bool, negative: bool, type_name: &str) -> Option<String> {
    if nan {
        Some(format!("'NaN'::{type_name}"))
    } else if infinite && negative {
        Some(format!("'-Infinity'::{type_name}"))
    } else if infinite {
        Some(format!("'Infinity'::{type_name}"))
    } else {
        None
    }
}

fn check_no_nul(value: &str) -> Result<()> {
    if memchr::memchr(0, value.as_bytes()).is_some() {
        return Err(Error::InvalidParameterValue(
            "Zero bytes may not occur in string parameters".to_string(),
        ));
    }
    Ok(())
}

/// Append `value` escaped for use inside a single-quoted literal
///
/// `'` is always doubled. With `standard_conforming_strings` off, `\` is doubled too.
pub fn escape_literal(out: &mut String, value: &str, standard_conforming_strings: bool) -> Result<()> {
    check_no_nul(value)?;
    out.reserve(value.len());
    for ch in value.chars() {
        if ch == '\'' || (ch == '\\' && !standard_conforming_strings) {
            out.push(ch);
        }
        out.push(ch);
    }
    Ok(())
}

/// Append `value` as a double-quoted identifier
pub fn escape_identifier(out: &mut String, value: &str) -> Result<()> {
    if memchr::memchr(0, value.as_bytes()).is_some() {
        return Err(Error::InvalidParameterValue(
            "Zero bytes may not occur in identifiers".to_string(),
        ));
    }
    out.reserve(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' {
            out.push(ch);
        }
        out.push(ch);
    }
    out.push('"');
    Ok(())
}

/// Byte offsets of every `?` in `sql`
pub fn bind_positions(sql: &str) -> Vec<usize> {
    memchr::memchr_iter(b'?', sql.as_bytes()).collect()
}

/// Substitute each placeholder with its rendered literal
///
/// Text between placeholders is copied verbatim.
pub fn native_sql(sql: &str, params: &ParameterList) -> Result<String> {
    if params.param_count() == 0 {
        return Ok(sql.to_string());
    }
    let positions = bind_positions(sql);
    let mut out = String::with_capacity(sql.len() + positions.len() * 8);
    let mut last = 0;
    for (i, &pos) in positions.iter().enumerate() {
        out.push_str(&sql[last..pos]);
        if i < params.param_count() {
            out.push_str(&params.to_sql_literal(i + 1, true)?);
        } else {
            out.push('?');
        }
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    Ok(out)
}
