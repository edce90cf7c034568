use chrono::{DateTime, Utc};
use serde_json::{Number, Value as Json};

use crate::error::{Error, Result};
use crate::sddl::{Datatype, VarDef};

/// A Cloud Variable value, tagged by its SDDL datatype.
///
/// The source represents this as a bare `interface{}` and dispatches on
/// Go's dynamic type in every comparison and coercion; here the tag is
/// explicit and every operation matches on it directly instead of a chain
/// of type assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum CloudVarValue {
    Void,
    Str(String),
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    U8(u8),
    U16(u16),
    U32(u32),
    F32(f32),
    F64(f64),
    Datetime(DateTime<Utc>),
}

impl CloudVarValue {
    pub fn datatype(&self) -> Datatype {
        match self {
            Self::Void => Datatype::Void,
            Self::Str(_) => Datatype::String,
            Self::Bool(_) => Datatype::Bool,
            Self::I8(_) => Datatype::Int8,
            Self::I16(_) => Datatype::Int16,
            Self::I32(_) => Datatype::Int32,
            Self::U8(_) => Datatype::Uint8,
            Self::U16(_) => Datatype::Uint16,
            Self::U32(_) => Datatype::Uint32,
            Self::F32(_) => Datatype::Float32,
            Self::F64(_) => Datatype::Float64,
            Self::Datetime(_) => Datatype::Datetime,
        }
    }

    /// Loose numeric coercion used by comparisons; mirrors the source's
    /// `cloudVarValueToFloat64`, including its `bool -> 0.0/1.0` coercion.
    fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
            Self::I8(v) => Some(v as f64),
            Self::I16(v) => Some(v as f64),
            Self::I32(v) => Some(v as f64),
            Self::U8(v) => Some(v as f64),
            Self::U16(v) => Some(v as f64),
            Self::U32(v) => Some(v as f64),
            Self::F32(v) => Some(v as f64),
            Self::F64(v) => Some(v),
            _ => None,
        }
    }
}

/// Decode a JSON value into a `CloudVarValue` for the given `VarDef`,
/// truncating numeric JSON to the variable's native width and parsing
/// `datetime` values as RFC3339 strings. Range is not checked here; call
/// [`check_range`] separately once the value is decoded.
pub fn decode_json(vardef: &VarDef, value: &Json) -> Result<CloudVarValue> {
    match vardef.datatype {
        Datatype::Void => Ok(CloudVarValue::Void),
        Datatype::String => value
            .as_str()
            .map(|s| CloudVarValue::Str(s.to_string()))
            .ok_or_else(|| type_mismatch("string", value)),
        Datatype::Bool => value
            .as_bool()
            .map(CloudVarValue::Bool)
            .ok_or_else(|| type_mismatch("bool", value)),
        Datatype::Int8 => as_f64(value).map(|v| CloudVarValue::I8(v as i8)),
        Datatype::Int16 => as_f64(value).map(|v| CloudVarValue::I16(v as i16)),
        Datatype::Int32 => as_f64(value).map(|v| CloudVarValue::I32(v as i32)),
        Datatype::Uint8 => as_f64(value).map(|v| CloudVarValue::U8(v as u8)),
        Datatype::Uint16 => as_f64(value).map(|v| CloudVarValue::U16(v as u16)),
        Datatype::Uint32 => as_f64(value).map(|v| CloudVarValue::U32(v as u32)),
        Datatype::Float32 => as_f64(value).map(|v| CloudVarValue::F32(v as f32)),
        Datatype::Float64 => as_f64(value).map(CloudVarValue::F64),
        Datatype::Datetime => {
            let s = value.as_str().ok_or_else(|| type_mismatch("datetime string", value))?;
            let dt = DateTime::parse_from_rfc3339(s)
                .map_err(|e| Error::Message(format!("invalid RFC3339 datetime {s}: {e}")))?;
            Ok(CloudVarValue::Datetime(dt.with_timezone(&Utc)))
        }
    }
}

fn as_f64(value: &Json) -> Result<f64> {
    value.as_f64().ok_or_else(|| type_mismatch("number", value))
}

fn type_mismatch(expected: &str, got: &Json) -> Error {
    Error::TypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    }
}

/// Encode a `CloudVarValue` back to JSON. Round-trips `decode_json` for
/// every in-range value.
pub fn encode_json(value: &CloudVarValue) -> Json {
    match value {
        CloudVarValue::Void => Json::Null,
        CloudVarValue::Str(s) => Json::String(s.clone()),
        CloudVarValue::Bool(b) => Json::Bool(*b),
        CloudVarValue::I8(v) => Json::Number(Number::from(*v)),
        CloudVarValue::I16(v) => Json::Number(Number::from(*v)),
        CloudVarValue::I32(v) => Json::Number(Number::from(*v)),
        CloudVarValue::U8(v) => Json::Number(Number::from(*v)),
        CloudVarValue::U16(v) => Json::Number(Number::from(*v)),
        CloudVarValue::U32(v) => Json::Number(Number::from(*v)),
        CloudVarValue::F32(v) => Number::from_f64(*v as f64)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        CloudVarValue::F64(v) => Number::from_f64(*v).map(Json::Number).unwrap_or(Json::Null),
        CloudVarValue::Datetime(dt) => Json::String(dt.to_rfc3339()),
    }
}

/// Explicit post-decode range check against the `VarDef`'s declared
/// `min`/`max`, when present. Not performed automatically by `decode_json`.
pub fn check_range(vardef: &VarDef, value: &CloudVarValue) -> Result<()> {
    let Some(n) = value.as_f64() else {
        return Ok(());
    };
    if let Some(min) = vardef.min {
        if n < min {
            return Err(Error::Message(format!(
                "value {n} below minimum {min} for variable {}",
                vardef.name
            )));
        }
    }
    if let Some(max) = vardef.max {
        if n > max {
            return Err(Error::Message(format!(
                "value {n} above maximum {max} for variable {}",
                vardef.name
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
}

/// Compare two Cloud Variable values. Numeric datatypes and `bool` (coerced
/// to `0.0`/`1.0`) compare via loose f64 coercion; datetimes compare
/// directly; `Void`/`String` are not comparable (mirrors the source's
/// `CompareValues`/`cloudVarValueToFloat64`).
pub fn compare(a: &CloudVarValue, b: &CloudVarValue, op: CompareOp) -> Result<bool> {
    if let (CloudVarValue::Datetime(a), CloudVarValue::Datetime(b)) = (a, b) {
        return Ok(match op {
            CompareOp::Greater => a > b,
            CompareOp::GreaterOrEqual => a >= b,
            CompareOp::Less => a < b,
            CompareOp::LessOrEqual => a <= b,
            CompareOp::Equal => a == b,
        });
    }

    let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
        return Err(Error::NotComparable(a.datatype()));
    };
    Ok(match op {
        CompareOp::Greater => a > b,
        CompareOp::GreaterOrEqual => a >= b,
        CompareOp::Less => a < b,
        CompareOp::LessOrEqual => a <= b,
        CompareOp::Equal => a == b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sddl::Category;

    fn vardef(dt: Datatype) -> VarDef {
        VarDef::new("x", dt, Category::Sensor)
    }

    #[test]
    fn decode_truncates_to_native_width() {
        let v = decode_json(&vardef(Datatype::Int8), &Json::from(300.0)).unwrap();
        assert_eq!(v, CloudVarValue::I8(300i32 as i8));
    }

    #[test]
    fn json_round_trip_float32() {
        let vd = vardef(Datatype::Float32);
        let v = decode_json(&vd, &Json::from(0.5f64)).unwrap();
        let back = decode_json(&vd, &encode_json(&v)).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn json_round_trip_datetime() {
        let vd = vardef(Datatype::Datetime);
        let json = Json::from("2020-01-01T00:00:00Z");
        let v = decode_json(&vd, &json).unwrap();
        let back = decode_json(&vd, &encode_json(&v)).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn range_check_rejects_out_of_range() {
        let mut vd = vardef(Datatype::Float64);
        vd.min = Some(0.0);
        vd.max = Some(1.0);
        let v = decode_json(&vd, &Json::from(1.5)).unwrap();
        assert!(check_range(&vd, &v).is_err());
    }

    #[test]
    fn compare_numeric_cross_width() {
        let a = CloudVarValue::I8(5);
        let b = CloudVarValue::F64(3.0);
        assert!(compare(&a, &b, CompareOp::Greater).unwrap());
    }

    #[test]
    fn compare_bool_coerces_to_zero_one() {
        let a = CloudVarValue::Bool(true);
        let b = CloudVarValue::F64(0.5);
        assert!(compare(&a, &b, CompareOp::Greater).unwrap());
        assert!(compare(&CloudVarValue::Bool(false), &CloudVarValue::Bool(true), CompareOp::Less).unwrap());
    }

    #[test]
    fn compare_non_numeric_is_error() {
        let a = CloudVarValue::Str("a".into());
        let b = CloudVarValue::Str("b".into());
        assert!(compare(&a, &b, CompareOp::Greater).is_err());
    }
}
