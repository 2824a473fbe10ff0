/// A value bound to a statement placeholder
///
/// Temporal and numeric variants carry their text form, which is sent as a quoted
/// literal with a cast (e.g. `'2024-01-01'::date`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Arbitrary-precision decimal text, `NaN` allowed
    Numeric(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(String),
    Time(String),
    TimeTz(String),
    Timestamp(String),
    TimestampTz(String),
    Interval(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i8 => Short,
    i16 => Short,
    u8 => Short,
    i32 => Int,
    u16 => Int,
    i64 => Long,
    u32 => Long,
    f32 => Float,
    f64 => Double,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(feature = "with-chrono")]
mod chrono_impl {
    use super::Value;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    impl From<NaiveDate> for Value {
        fn from(v: NaiveDate) -> Self {
            Value::Date(v.format("%Y-%m-%d").to_string())
        }
    }

    impl From<NaiveTime> for Value {
        fn from(v: NaiveTime) -> Self {
            Value::Time(v.format("%H:%M:%S%.f").to_string())
        }
    }

    impl From<NaiveDateTime> for Value {
        fn from(v: NaiveDateTime) -> Self {
            Value::Timestamp(v.format("%Y-%m-%d %H:%M:%S%.f").to_string())
        }
    }

    impl From<DateTime<Utc>> for Value {
        fn from(v: DateTime<Utc>) -> Self {
            Value::TimestampTz(v.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Value::from(7_i32), Value::Int(7));
        assert_eq!(Value::from(7_u8), Value::Short(7));
        assert_eq!(Value::from(u32::MAX), Value::Long(i64::from(u32::MAX)));
        assert_eq!(Value::from("x"), Value::Text("x".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(1.5_f64)), Value::Double(1.5));
        assert!(Value::from(None::<&str>).is_null());
    }

    #[cfg(feature = "with-chrono")]
    #[test]
    fn chrono_values() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Value::from(date), Value::Date("2024-02-29".to_string()));
        let ts = date.and_hms_opt(13, 5, 0).unwrap();
        assert_eq!(
            Value::from(ts),
            Value::Timestamp("2024-02-29 13:05:00".to_string())
        );
    }
}
