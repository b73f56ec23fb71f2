use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::core::{RedisValue, Result, RomError};
use crate::model::fields::{FieldContext, FieldDescriptor, FieldIo, FieldWrite};

/// Scalar wire codec.
///
/// Numbers and booleans use their JSON text form so the decode side can
/// recover a distinguishable type; strings pass through without quoting.
/// The trait is open: implement it for your own type and wire it into the
/// field layer with [`crate::scalar_field!`].
pub trait ScalarValue: Clone + PartialEq + Send + Sync + Sized + 'static {
    fn encode(&self) -> Result<RedisValue>;
    fn decode(raw: &RedisValue) -> Result<Self>;
}

pub(crate) fn encode_json<T: Serialize>(value: &T) -> Result<RedisValue> {
    serde_json::to_string(value).map_err(|err| RomError::serialization::<T>(err.to_string()))
}

pub(crate) fn decode_json<T: DeserializeOwned>(raw: &RedisValue) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|err| RomError::serialization::<T>(format!("'{}' {}", raw, err)))
}

macro_rules! json_scalar {
    ($($t:ty),+ $(,)?) => {$(
        impl ScalarValue for $t {
            fn encode(&self) -> Result<RedisValue> {
                encode_json(self)
            }

            fn decode(raw: &RedisValue) -> Result<Self> {
                decode_json::<$t>(raw)
            }
        }
    )+};
}

json_scalar!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

// Strings pass through untouched, no JSON quoting.
impl ScalarValue for String {
    fn encode(&self) -> Result<RedisValue> {
        Ok(self.clone())
    }

    fn decode(raw: &RedisValue) -> Result<Self> {
        Ok(raw.clone())
    }
}

impl ScalarValue for Uuid {
    fn encode(&self) -> Result<RedisValue> {
        Ok(self.to_string())
    }

    fn decode(raw: &RedisValue) -> Result<Self> {
        Uuid::parse_str(raw).map_err(|err| RomError::serialization::<Uuid>(err.to_string()))
    }
}

impl ScalarValue for DateTime<Utc> {
    fn encode(&self) -> Result<RedisValue> {
        Ok(self.to_rfc3339())
    }

    fn decode(raw: &RedisValue) -> Result<Self> {
        DateTime::parse_from_rfc3339(raw)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|err| RomError::serialization::<DateTime<Utc>>(err.to_string()))
    }
}

crate::scalar_field!(bool, default);
crate::scalar_field!(i8, default);
crate::scalar_field!(i16, default);
crate::scalar_field!(i32, default);
crate::scalar_field!(i64, default);
crate::scalar_field!(u8, default);
crate::scalar_field!(u16, default);
crate::scalar_field!(u32, default);
crate::scalar_field!(u64, default);
crate::scalar_field!(f32, default);
crate::scalar_field!(f64, default);
crate::scalar_field!(String, default);
crate::scalar_field!(uuid::Uuid, default);
crate::scalar_field!(chrono::DateTime<chrono::Utc>);

#[doc(hidden)]
pub fn __write_scalar_field<T: ScalarValue>(
    value: &T,
    field: &FieldDescriptor,
    default: Option<&T>,
) -> Result<FieldWrite> {
    if field.has_default() {
        if let Some(default) = default {
            if value == default {
                return Ok(FieldWrite::Skip);
            }
        }
    }
    Ok(FieldWrite::Value(value.encode()?))
}

#[doc(hidden)]
pub fn __read_scalar_field<T: ScalarValue + FieldIo>(
    ctx: &FieldContext<'_>,
    raw: Option<&RedisValue>,
) -> Result<T> {
    match raw {
        Some(value) => T::decode(value),
        None => match (ctx.field.has_default(), T::default_value()) {
            (true, Some(value)) => Ok(value),
            _ => Err(RomError::MissingField {
                model: ctx.model,
                field: ctx.field.name,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: ScalarValue + std::fmt::Debug>(value: T) {
        let encoded = value.encode().unwrap();
        let decoded = T::decode(&encoded).unwrap();
        assert_eq!(decoded, value, "wire form was '{}'", encoded);
    }

    #[test]
    fn test_integer_roundtrip() {
        roundtrip(0i64);
        roundtrip(i64::MIN);
        roundtrip(i64::MAX);
        roundtrip(u64::MAX);
        roundtrip(-1i8);
    }

    #[test]
    fn test_float_roundtrip() {
        roundtrip(0.0f64);
        roundtrip(-2.5f64);
        roundtrip(1.0e300f64);
        roundtrip(3.25f32);
    }

    #[test]
    fn test_bool_wire_form() {
        assert_eq!(true.encode().unwrap(), "true");
        assert_eq!(false.encode().unwrap(), "false");
        roundtrip(true);
        roundtrip(false);
    }

    #[test]
    fn test_string_passes_through_unquoted() {
        let value = String::from("hello \"quoted\" world");
        assert_eq!(value.encode().unwrap(), value);
        roundtrip(value);
        roundtrip(String::new());
        roundtrip(String::from("üñïçödé"));
    }

    #[test]
    fn test_uuid_roundtrip() {
        roundtrip(Uuid::new_v4());
    }

    #[test]
    fn test_datetime_roundtrip() {
        roundtrip(Utc::now());
    }

    #[test]
    fn test_decode_type_mismatch() {
        let err = i64::decode(&"not a number".to_string()).unwrap_err();
        assert!(matches!(err, RomError::Serialization { .. }));
        assert!(bool::decode(&"1maybe".to_string()).is_err());
    }
}
