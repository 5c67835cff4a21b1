// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bidirectional codec between wire variants and native values.
//!
//! The codec is pure and stateless. Decoding produces the natural native
//! type for each scalar wire value; a single-element array is unwrapped
//! to its scalar (a well-known server idiom) and decoded recursively.
//! Any other array or structured value fails with `UnsupportedType`.
//!
//! Encoding accepts an optional *expected* wire type and performs a
//! best-effort widen/narrow (f32 to f64, i64 to i32 with range check,
//! ...), failing with `TypeMismatch` when the value cannot be
//! represented. Without an expected type the codec auto-detects from the
//! native value; integer promotion picks i32 when the value fits, else
//! i64.
//!
//! # Examples
//!
//! ```
//! use argus_core::types::Value;
//! use argus_opcua::codec::{decode, encode, WireType, WireValue};
//!
//! // Scalar roundtrip.
//! let wire = encode(&Value::Float32(42.0), None).unwrap();
//! assert_eq!(decode(&wire).unwrap(), Value::Float32(42.0));
//!
//! // Single-element arrays unwrap to their scalar.
//! let wrapped = WireValue::Array(vec![WireValue::Double(1.5)]);
//! assert_eq!(decode(&wrapped).unwrap(), Value::Float64(1.5));
//!
//! // Expected-type narrowing with range check.
//! let wire = encode(&Value::Int64(7), Some(WireType::Int16)).unwrap();
//! assert_eq!(wire, WireValue::Int16(7));
//! assert!(encode(&Value::Int64(1 << 40), Some(WireType::Int16)).is_err());
//! ```

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

use argus_core::error::{ProtocolError, ProtocolResult};
use argus_core::types::{Quality, Value};

// =============================================================================
// WireType
// =============================================================================

/// Built-in scalar wire types handled by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Boolean.
    Boolean,
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit IEEE 754 float.
    Float,
    /// 64-bit IEEE 754 double.
    Double,
    /// UTF-8 string.
    String,
    /// Date/time.
    DateTime,
    /// Raw byte string.
    ByteString,
}

impl WireType {
    /// Returns the wire type name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::ByteString => "ByteString",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// WireValue
// =============================================================================

/// A value as delivered by or handed to the session layer.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// Boolean.
    Boolean(bool),
    /// Signed 8-bit integer.
    SByte(i8),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Date/time.
    DateTime(DateTime<Utc>),
    /// Raw byte string.
    ByteString(Vec<u8>),
    /// Array of wire values.
    Array(Vec<WireValue>),
    /// Null/empty variant.
    Null,
}

impl WireValue {
    /// Returns the wire type of this value, if it is a supported scalar.
    pub fn wire_type(&self) -> Option<WireType> {
        match self {
            Self::Boolean(_) => Some(WireType::Boolean),
            Self::SByte(_) => Some(WireType::SByte),
            Self::Byte(_) => Some(WireType::Byte),
            Self::Int16(_) => Some(WireType::Int16),
            Self::UInt16(_) => Some(WireType::UInt16),
            Self::Int32(_) => Some(WireType::Int32),
            Self::UInt32(_) => Some(WireType::UInt32),
            Self::Int64(_) => Some(WireType::Int64),
            Self::UInt64(_) => Some(WireType::UInt64),
            Self::Float(_) => Some(WireType::Float),
            Self::Double(_) => Some(WireType::Double),
            Self::String(_) => Some(WireType::String),
            Self::DateTime(_) => Some(WireType::DateTime),
            Self::ByteString(_) => Some(WireType::ByteString),
            Self::Array(_) | Self::Null => None,
        }
    }

    /// Returns the type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self.wire_type() {
            Some(t) => t.name(),
            None => match self {
                Self::Array(_) => "Array",
                _ => "Null",
            },
        }
    }
}

// =============================================================================
// Decode (wire -> native)
// =============================================================================

/// Decodes a wire value into the natural native type.
pub fn decode(wire: &WireValue) -> ProtocolResult<Value> {
    match wire {
        WireValue::Boolean(v) => Ok(Value::Bool(*v)),
        // Sub-16-bit integers widen to the narrowest native integer.
        WireValue::SByte(v) => Ok(Value::Int16(*v as i16)),
        WireValue::Byte(v) => Ok(Value::UInt16(*v as u16)),
        WireValue::Int16(v) => Ok(Value::Int16(*v)),
        WireValue::UInt16(v) => Ok(Value::UInt16(*v)),
        WireValue::Int32(v) => Ok(Value::Int32(*v)),
        WireValue::UInt32(v) => Ok(Value::UInt32(*v)),
        WireValue::Int64(v) => Ok(Value::Int64(*v)),
        WireValue::UInt64(v) => i64::try_from(*v).map(Value::Int64).map_err(|_| {
            ProtocolError::unsupported_type("UInt64 beyond signed 64-bit range")
        }),
        WireValue::Float(v) => Ok(Value::Float32(*v)),
        WireValue::Double(v) => Ok(Value::Float64(*v)),
        WireValue::String(v) => Ok(Value::String(v.clone())),
        WireValue::DateTime(v) => Ok(Value::DateTime(*v)),
        WireValue::ByteString(v) => Ok(Value::Bytes(v.clone())),
        WireValue::Array(items) => {
            // Single-element arrays stand in for scalars on many servers.
            if items.len() == 1 {
                decode(&items[0])
            } else {
                Err(ProtocolError::unsupported_type(format!(
                    "Array[{}]",
                    items.len()
                )))
            }
        }
        WireValue::Null => Err(ProtocolError::unsupported_type("Null")),
    }
}

// =============================================================================
// Encode (native -> wire)
// =============================================================================

/// Encodes a native value, auto-detecting or coercing to `expected`.
pub fn encode(value: &Value, expected: Option<WireType>) -> ProtocolResult<WireValue> {
    match expected {
        Some(target) => coerce(value, target),
        None => Ok(auto_encode(value)),
    }
}

/// Encodes without an expected type: the wire type follows the native
/// runtime type, except that 64-bit integers promote down to Int32 when
/// the value fits.
fn auto_encode(value: &Value) -> WireValue {
    match value {
        Value::Bool(v) => WireValue::Boolean(*v),
        Value::Int16(v) => WireValue::Int16(*v),
        Value::UInt16(v) => WireValue::UInt16(*v),
        Value::Int32(v) => WireValue::Int32(*v),
        Value::UInt32(v) => WireValue::UInt32(*v),
        Value::Int64(v) => {
            if let Ok(narrow) = i32::try_from(*v) {
                WireValue::Int32(narrow)
            } else {
                WireValue::Int64(*v)
            }
        }
        Value::Float32(v) => WireValue::Float(*v),
        Value::Float64(v) => WireValue::Double(*v),
        Value::String(v) => WireValue::String(v.clone()),
        Value::Bytes(v) => WireValue::ByteString(v.clone()),
        Value::DateTime(v) => WireValue::DateTime(*v),
    }
}

/// Coerces a native value to an expected wire type with range checks.
fn coerce(value: &Value, target: WireType) -> ProtocolResult<WireValue> {
    let mismatch = || ProtocolError::type_mismatch(target.name(), value.type_name());

    match target {
        WireType::Boolean => value.as_bool().map(WireValue::Boolean).ok_or_else(mismatch),
        WireType::SByte => int_in_range(value, i8::MIN as i64, i8::MAX as i64)
            .map(|v| WireValue::SByte(v as i8))
            .ok_or_else(mismatch),
        WireType::Byte => int_in_range(value, 0, u8::MAX as i64)
            .map(|v| WireValue::Byte(v as u8))
            .ok_or_else(mismatch),
        WireType::Int16 => int_in_range(value, i16::MIN as i64, i16::MAX as i64)
            .map(|v| WireValue::Int16(v as i16))
            .ok_or_else(mismatch),
        WireType::UInt16 => int_in_range(value, 0, u16::MAX as i64)
            .map(|v| WireValue::UInt16(v as u16))
            .ok_or_else(mismatch),
        WireType::Int32 => int_in_range(value, i32::MIN as i64, i32::MAX as i64)
            .map(|v| WireValue::Int32(v as i32))
            .ok_or_else(mismatch),
        WireType::UInt32 => int_in_range(value, 0, u32::MAX as i64)
            .map(|v| WireValue::UInt32(v as u32))
            .ok_or_else(mismatch),
        WireType::Int64 => match value {
            Value::DateTime(dt) => Ok(WireValue::Int64(dt.timestamp_millis())),
            _ => integral_value(value).map(WireValue::Int64).ok_or_else(mismatch),
        },
        WireType::UInt64 => integral_value(value)
            .filter(|v| *v >= 0)
            .map(|v| WireValue::UInt64(v as u64))
            .ok_or_else(mismatch),
        WireType::Float => match numeric_value(value) {
            Some(v) if !v.is_finite() || v.abs() <= f32::MAX as f64 => {
                Ok(WireValue::Float(v as f32))
            }
            _ => Err(mismatch()),
        },
        WireType::Double => numeric_value(value).map(WireValue::Double).ok_or_else(mismatch),
        WireType::String => match value {
            Value::String(v) => Ok(WireValue::String(v.clone())),
            _ => Err(mismatch()),
        },
        WireType::DateTime => match value {
            Value::DateTime(v) => Ok(WireValue::DateTime(*v)),
            // Integers are interpreted as millisecond epochs.
            Value::Int64(ms) => Ok(WireValue::DateTime(epoch_millis_to_datetime(*ms)?)),
            _ => Err(mismatch()),
        },
        WireType::ByteString => match value {
            Value::Bytes(v) => Ok(WireValue::ByteString(v.clone())),
            _ => Err(mismatch()),
        },
    }
}

/// Extracts an f64 from a numeric native value. Booleans are not
/// numbers here; they only coerce to the Boolean wire type.
fn numeric_value(value: &Value) -> Option<f64> {
    if value.is_numeric() {
        value.as_f64()
    } else {
        None
    }
}

/// Extracts an integral i64 from a native value, requiring floats to be
/// exactly integral.
fn integral_value(value: &Value) -> Option<i64> {
    match value {
        Value::Int16(v) => Some(*v as i64),
        Value::UInt16(v) => Some(*v as i64),
        Value::Int32(v) => Some(*v as i64),
        Value::UInt32(v) => Some(*v as i64),
        Value::Int64(v) => Some(*v),
        Value::Float32(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
        Value::Float64(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
        _ => None,
    }
}

fn int_in_range(value: &Value, min: i64, max: i64) -> Option<i64> {
    integral_value(value).filter(|v| *v >= min && *v <= max)
}

// =============================================================================
// Timestamps
// =============================================================================

/// Converts a datetime to its millisecond epoch.
#[inline]
pub fn datetime_to_epoch_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Converts a millisecond epoch to a datetime.
pub fn epoch_millis_to_datetime(ms: i64) -> ProtocolResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| ProtocolError::unsupported_type(format!("epoch {} out of range", ms)))
}

// =============================================================================
// Status codes
// =============================================================================

/// Common status codes used by the runtime.
pub mod status {
    /// Operation succeeded.
    pub const GOOD: u32 = 0x0000_0000;
    /// Generic failure.
    pub const BAD: u32 = 0x8000_0000;
    /// Communication with the server failed.
    pub const BAD_COMMUNICATION_ERROR: u32 = 0x8005_0000;
    /// The operation timed out.
    pub const BAD_TIMEOUT: u32 = 0x800C_0000;
    /// No session is established.
    pub const BAD_SERVER_NOT_CONNECTED: u32 = 0x800F_0000;
    /// The identity token was rejected.
    pub const BAD_IDENTITY_TOKEN_REJECTED: u32 = 0x8025_0000;
    /// The user lacks permission.
    pub const BAD_USER_ACCESS_DENIED: u32 = 0x8023_0000;
    /// The subscription id is unknown to the server.
    pub const BAD_SUBSCRIPTION_ID_INVALID: u32 = 0x802C_0000;
    /// The node id is unknown to the server.
    pub const BAD_NODE_ID_UNKNOWN: u32 = 0x8062_0000;
    /// The node is not readable.
    pub const BAD_NOT_READABLE: u32 = 0x8068_0000;
    /// The node is not writable.
    pub const BAD_NOT_WRITABLE: u32 = 0x8069_0000;
    /// The value is outside its permitted range.
    pub const BAD_OUT_OF_RANGE: u32 = 0x806A_0000;
    /// The monitored item id is unknown to the server.
    pub const BAD_MONITORED_ITEM_ID_INVALID: u32 = 0x8070_0000;
    /// The device backing the value has failed.
    pub const BAD_DEVICE_FAILURE: u32 = 0x808B_0000;
    /// The sensor backing the value has failed.
    pub const BAD_SENSOR_FAILURE: u32 = 0x808C_0000;
    /// The value source is out of service.
    pub const BAD_OUT_OF_SERVICE: u32 = 0x808D_0000;
    /// The last usable value is being repeated.
    pub const UNCERTAIN_LAST_USABLE_VALUE: u32 = 0x4090_0000;
    /// Initial value before the first sample.
    pub const UNCERTAIN_INITIAL_VALUE: u32 = 0x4092_0000;
    /// The sensor is out of calibration.
    pub const UNCERTAIN_SENSOR_NOT_ACCURATE: u32 = 0x4093_0000;

    /// Returns `true` if the code reports success.
    #[inline]
    pub fn is_good(code: u32) -> bool {
        code & 0xC000_0000 == 0
    }

    /// Returns `true` if the code reports an uncertain value.
    #[inline]
    pub fn is_uncertain(code: u32) -> bool {
        code & 0x4000_0000 != 0 && code & 0x8000_0000 == 0
    }

    /// Returns `true` if the code reports a failure.
    #[inline]
    pub fn is_bad(code: u32) -> bool {
        code & 0x8000_0000 != 0
    }
}

/// Derives a [`Quality`] from a wire status code via the fixed table.
pub fn quality_from_status(code: u32) -> Quality {
    match code {
        c if status::is_good(c) => Quality::Good,
        status::BAD_COMMUNICATION_ERROR
        | status::BAD_TIMEOUT
        | status::BAD_SERVER_NOT_CONNECTED => Quality::CommFail,
        status::BAD_OUT_OF_RANGE => Quality::OutOfRange,
        status::BAD_SENSOR_FAILURE | status::BAD_DEVICE_FAILURE => Quality::SensorFail,
        status::BAD_OUT_OF_SERVICE => Quality::Maintenance,
        status::UNCERTAIN_LAST_USABLE_VALUE => Quality::Old,
        status::UNCERTAIN_SENSOR_NOT_ACCURATE => Quality::Calibrating,
        c if status::is_uncertain(c) => Quality::Uncertain,
        _ => Quality::Bad,
    }
}

/// Returns the human-readable name for a status code.
pub fn status_name(code: u32) -> &'static str {
    match code {
        status::GOOD => "Good",
        status::BAD => "Bad",
        status::BAD_COMMUNICATION_ERROR => "BadCommunicationError",
        status::BAD_TIMEOUT => "BadTimeout",
        status::BAD_SERVER_NOT_CONNECTED => "BadServerNotConnected",
        status::BAD_IDENTITY_TOKEN_REJECTED => "BadIdentityTokenRejected",
        status::BAD_USER_ACCESS_DENIED => "BadUserAccessDenied",
        status::BAD_SUBSCRIPTION_ID_INVALID => "BadSubscriptionIdInvalid",
        status::BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
        status::BAD_NOT_READABLE => "BadNotReadable",
        status::BAD_NOT_WRITABLE => "BadNotWritable",
        status::BAD_OUT_OF_RANGE => "BadOutOfRange",
        status::BAD_MONITORED_ITEM_ID_INVALID => "BadMonitoredItemIdInvalid",
        status::BAD_DEVICE_FAILURE => "BadDeviceFailure",
        status::BAD_SENSOR_FAILURE => "BadSensorFailure",
        status::BAD_OUT_OF_SERVICE => "BadOutOfService",
        status::UNCERTAIN_LAST_USABLE_VALUE => "UncertainLastUsableValue",
        status::UNCERTAIN_INITIAL_VALUE => "UncertainInitialValue",
        status::UNCERTAIN_SENSOR_NOT_ACCURATE => "UncertainSensorNotAccurate",
        _ => "Unknown",
    }
}

/// Builds a `ServerStatus` protocol error for a bad status code.
pub fn server_status_error(code: u32) -> ProtocolError {
    ProtocolError::server_status(code, status_name(code))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_roundtrip() {
        let cases = vec![
            Value::Bool(true),
            Value::Int16(-123),
            Value::UInt16(456),
            Value::Int32(-70000),
            Value::UInt32(70000),
            Value::Int64(1 << 40),
            Value::Float32(1.5),
            Value::Float64(-2.25),
            Value::String("hello".into()),
            Value::Bytes(vec![1, 2, 3]),
        ];
        for value in cases {
            let wire = encode(&value, None).unwrap();
            assert_eq!(decode(&wire).unwrap(), value, "roundtrip failed for {:?}", value);
        }
    }

    #[test]
    fn test_datetime_roundtrip() {
        let dt = epoch_millis_to_datetime(1_700_000_000_123).unwrap();
        let wire = encode(&Value::DateTime(dt), None).unwrap();
        assert_eq!(decode(&wire).unwrap(), Value::DateTime(dt));
        assert_eq!(datetime_to_epoch_millis(dt), 1_700_000_000_123);
    }

    #[test]
    fn test_single_element_array_unwraps() {
        let wire = WireValue::Array(vec![WireValue::Float(42.0)]);
        assert_eq!(decode(&wire).unwrap(), Value::Float32(42.0));

        // And recursively.
        let nested = WireValue::Array(vec![WireValue::Array(vec![WireValue::Int32(7)])]);
        assert_eq!(decode(&nested).unwrap(), Value::Int32(7));
    }

    #[test]
    fn test_multi_element_array_unsupported() {
        let wire = WireValue::Array(vec![WireValue::Int32(1), WireValue::Int32(2)]);
        assert!(matches!(
            decode(&wire),
            Err(ProtocolError::UnsupportedType { .. })
        ));
        assert!(decode(&WireValue::Null).is_err());
    }

    #[test]
    fn test_small_integers_widen() {
        assert_eq!(decode(&WireValue::SByte(-5)).unwrap(), Value::Int16(-5));
        assert_eq!(decode(&WireValue::Byte(200)).unwrap(), Value::UInt16(200));
    }

    #[test]
    fn test_uint64_decode_range() {
        assert_eq!(
            decode(&WireValue::UInt64(12345)).unwrap(),
            Value::Int64(12345)
        );
        assert!(decode(&WireValue::UInt64(u64::MAX)).is_err());
    }

    #[test]
    fn test_integer_promotion() {
        // i64 within i32 range promotes down.
        assert_eq!(encode(&Value::Int64(1000), None).unwrap(), WireValue::Int32(1000));
        // Outside i32 range it stays i64.
        assert_eq!(
            encode(&Value::Int64(1 << 40), None).unwrap(),
            WireValue::Int64(1 << 40)
        );
    }

    #[test]
    fn test_expected_type_widening() {
        assert_eq!(
            encode(&Value::Float32(1.5), Some(WireType::Double)).unwrap(),
            WireValue::Double(1.5)
        );
        assert_eq!(
            encode(&Value::Int16(7), Some(WireType::Int64)).unwrap(),
            WireValue::Int64(7)
        );
    }

    #[test]
    fn test_expected_type_narrowing_with_range_check() {
        assert_eq!(
            encode(&Value::Int64(100), Some(WireType::SByte)).unwrap(),
            WireValue::SByte(100)
        );
        assert!(encode(&Value::Int64(300), Some(WireType::SByte)).is_err());
        assert!(encode(&Value::Int32(-1), Some(WireType::UInt16)).is_err());
        assert!(encode(&Value::Float64(1.5), Some(WireType::Int32)).is_err());
        assert_eq!(
            encode(&Value::Float64(2.0), Some(WireType::Int32)).unwrap(),
            WireValue::Int32(2)
        );
    }

    #[test]
    fn test_type_mismatch() {
        assert!(encode(&Value::String("x".into()), Some(WireType::Int32)).is_err());
        assert!(encode(&Value::Bool(true), Some(WireType::Double)).is_err());
        assert!(encode(&Value::Int32(1), Some(WireType::String)).is_err());
    }

    #[test]
    fn test_datetime_from_epoch_int() {
        let wire = encode(&Value::Int64(1_700_000_000_000), Some(WireType::DateTime)).unwrap();
        match wire {
            WireValue::DateTime(dt) => assert_eq!(dt.timestamp_millis(), 1_700_000_000_000),
            other => panic!("expected DateTime, got {:?}", other),
        }
    }

    #[test]
    fn test_quality_table() {
        assert_eq!(quality_from_status(status::GOOD), Quality::Good);
        assert_eq!(
            quality_from_status(status::BAD_COMMUNICATION_ERROR),
            Quality::CommFail
        );
        assert_eq!(quality_from_status(status::BAD_TIMEOUT), Quality::CommFail);
        assert_eq!(quality_from_status(status::BAD_OUT_OF_RANGE), Quality::OutOfRange);
        assert_eq!(quality_from_status(status::BAD_SENSOR_FAILURE), Quality::SensorFail);
        assert_eq!(quality_from_status(status::BAD_OUT_OF_SERVICE), Quality::Maintenance);
        assert_eq!(
            quality_from_status(status::UNCERTAIN_LAST_USABLE_VALUE),
            Quality::Old
        );
        assert_eq!(
            quality_from_status(status::UNCERTAIN_SENSOR_NOT_ACCURATE),
            Quality::Calibrating
        );
        assert_eq!(quality_from_status(status::UNCERTAIN_INITIAL_VALUE), Quality::Uncertain);
        assert_eq!(quality_from_status(status::BAD), Quality::Bad);
        assert_eq!(quality_from_status(status::BAD_NODE_ID_UNKNOWN), Quality::Bad);
    }

    #[test]
    fn test_status_predicates() {
        assert!(status::is_good(status::GOOD));
        assert!(!status::is_good(status::BAD));
        assert!(status::is_bad(status::BAD_TIMEOUT));
        assert!(status::is_uncertain(status::UNCERTAIN_INITIAL_VALUE));
        assert!(!status::is_uncertain(status::BAD));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(status_name(status::GOOD), "Good");
        assert_eq!(status_name(status::BAD_NOT_WRITABLE), "BadNotWritable");
        assert_eq!(status_name(0xDEAD_BEEF), "Unknown");
    }
}
