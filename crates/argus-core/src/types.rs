// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for ARGUS.
//!
//! This module provides the foundation types shared by every part of the
//! runtime: tag identifiers, the native value union, quality semantics,
//! alarm levels, and the connection state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// A unique identifier for a process variable ("tag").
///
/// Tag ids are opaque, stable strings unique within one runtime instance.
///
/// # Examples
///
/// ```
/// use argus_core::types::TagId;
///
/// let id = TagId::new("Boiler1.Steam.Pressure.PV");
/// assert_eq!(id.as_str(), "Boiler1.Steam.Pressure.PV");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    /// Creates a new tag ID.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the ID and returns the inner string.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TagId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for TagId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Value
// =============================================================================

/// The native value union for process variables.
///
/// A tagged variant keyed by the wire type keeps the hot path free of
/// boxing; a dynamic [`serde_json::Value`] form is produced lazily only
/// when an event consumer asks for it.
///
/// # Examples
///
/// ```
/// use argus_core::types::Value;
///
/// let pressure = Value::Float32(4.2);
/// assert_eq!(pressure.as_f64(), Some(4.2f32 as f64));
///
/// let running = Value::Bool(true);
/// assert_eq!(running.as_bool(), Some(true));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Boolean value.
    Bool(bool),

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

    /// 32-bit floating point.
    Float32(f32),

    /// 64-bit floating point.
    Float64(f64),

    /// UTF-8 string.
    String(String),

    /// Raw bytes.
    Bytes(Vec<u8>),

    /// Date and time with timezone.
    DateTime(DateTime<Utc>),
}

impl Value {
    /// Returns the type name of this value.
    ///
    /// # Examples
    ///
    /// ```
    /// use argus_core::types::Value;
    ///
    /// assert_eq!(Value::Float64(1.0).type_name(), "float64");
    /// assert_eq!(Value::Bool(true).type_name(), "bool");
    /// ```
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int16(_) => "int16",
            Value::UInt16(_) => "uint16",
            Value::Int32(_) => "int32",
            Value::UInt32(_) => "uint32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::DateTime(_) => "datetime",
        }
    }

    /// Returns `true` if this is a numeric value (integer or float).
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int16(_)
                | Value::UInt16(_)
                | Value::Int32(_)
                | Value::UInt32(_)
                | Value::Int64(_)
                | Value::Float32(_)
                | Value::Float64(_)
        )
    }

    /// Attempts to convert this value to a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(*v as i64),
            Value::UInt16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::UInt32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::Float32(v) => Some(*v as i64),
            Value::Float64(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Attempts to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Int16(v) => Some(*v as f64),
            Value::UInt16(v) => Some(*v as f64),
            Value::Int32(v) => Some(*v as f64),
            Value::UInt32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to get this value as a string reference.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to get this value as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to get this value as a datetime.
    #[inline]
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    /// Converts this value to its dynamic JSON form.
    ///
    /// Used by event consumers that need a type-erased representation;
    /// the hot path never calls this.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Int16(v) => serde_json::json!(*v),
            Value::UInt16(v) => serde_json::json!(*v),
            Value::Int32(v) => serde_json::json!(*v),
            Value::UInt32(v) => serde_json::json!(*v),
            Value::Int64(v) => serde_json::json!(*v),
            Value::Float32(v) => serde_json::json!(*v),
            Value::Float64(v) => serde_json::json!(*v),
            Value::String(v) => serde_json::Value::String(v.clone()),
            Value::Bytes(v) => serde_json::json!(v),
            Value::DateTime(dt) => serde_json::json!(dt.to_rfc3339()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

macro_rules! impl_from_for_value {
    ($variant:ident, $type:ty) => {
        impl From<$type> for Value {
            fn from(v: $type) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_from_for_value!(Bool, bool);
impl_from_for_value!(Int16, i16);
impl_from_for_value!(UInt16, u16);
impl_from_for_value!(Int32, i32);
impl_from_for_value!(UInt32, u32);
impl_from_for_value!(Int64, i64);
impl_from_for_value!(Float32, f32);
impl_from_for_value!(Float64, f64);
impl_from_for_value!(String, String);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

// =============================================================================
// Quality
// =============================================================================

/// The quality of a process value, independent of the raw bits.
///
/// Derived from the wire status code via a fixed table (see the codec),
/// or assigned directly by the runtime (e.g. `CommFail` before the first
/// successful update).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// The value is good and reliable.
    Good,

    /// The value is bad and must not be used.
    Bad,

    /// The value is uncertain but may be usable.
    Uncertain,

    /// The value is stale (no fresh update within the expected cadence).
    Old,

    /// Communication with the server has failed.
    #[default]
    CommFail,

    /// The value is outside its configured engineering range.
    OutOfRange,

    /// The sensor backing this value has failed.
    SensorFail,

    /// The sensor is being calibrated.
    Calibrating,

    /// The point is under maintenance.
    Maintenance,
}

impl Quality {
    /// Returns `true` if the quality is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        matches!(self, Quality::Good)
    }

    /// Returns `true` if the quality is usable (good or uncertain).
    #[inline]
    pub fn is_usable(&self) -> bool {
        matches!(self, Quality::Good | Quality::Uncertain)
    }

    /// Returns `true` if the quality indicates a communication problem.
    #[inline]
    pub fn is_comm_failure(&self) -> bool {
        matches!(self, Quality::CommFail)
    }

    /// Returns the quality name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Good => "Good",
            Quality::Bad => "Bad",
            Quality::Uncertain => "Uncertain",
            Quality::Old => "Old",
            Quality::CommFail => "CommFail",
            Quality::OutOfRange => "OutOfRange",
            Quality::SensorFail => "SensorFail",
            Quality::Calibrating => "Calibrating",
            Quality::Maintenance => "Maintenance",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Alarm Level
// =============================================================================

/// Derived classification of a numeric value against configured thresholds.
///
/// Levels are ordered: `None < Info < Warning < Minor < Major < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AlarmLevel {
    /// No alarm condition.
    #[default]
    None,

    /// Informational.
    Info,

    /// Warning (low / high threshold crossed).
    Warning,

    /// Minor alarm.
    Minor,

    /// Major alarm (low-low / high-high threshold crossed).
    Major,

    /// Critical alarm.
    Critical,
}

impl AlarmLevel {
    /// Returns `true` if this level represents an active alarm.
    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self, AlarmLevel::None)
    }

    /// Returns the level name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmLevel::None => "None",
            AlarmLevel::Info => "Info",
            AlarmLevel::Warning => "Warning",
            AlarmLevel::Minor => "Minor",
            AlarmLevel::Major => "Major",
            AlarmLevel::Critical => "Critical",
        }
    }
}

impl fmt::Display for AlarmLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// The connection state of the client session.
///
/// Only the connection supervisor mutates the state; every other
/// component observes it atomically. Legal transitions:
///
/// ```text
/// Disconnected -> Connecting -> Connected
/// Connected    -> Reconnecting -> Connecting -> Connected
/// any state    -> Error            (unrecoverable failure)
/// Error        -> Connecting       (external connect call)
/// any state    -> Disconnected     (explicit disconnect)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,

    /// Connection attempt in progress.
    Connecting,

    /// Connected and operational.
    Connected,

    /// Connection lost, reconnect scheduled.
    Reconnecting,

    /// Unrecoverable failure; requires an external connect call.
    Error,
}

impl ConnectionState {
    /// Returns `true` if the session is connected.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Returns `true` if the state is transitional.
    #[inline]
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting
        )
    }

    /// Returns `true` if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        if self == &next {
            return false;
        }
        // Error and Disconnected are reachable from everywhere.
        if matches!(next, Error | Disconnected) {
            return true;
        }
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Error, Connecting)
                | (Connecting, Connected)
                | (Connected, Reconnecting)
                | (Reconnecting, Connecting)
                // A failed attempt drops back to backoff.
                | (Connecting, Reconnecting)
        )
    }

    /// Encodes this state as a u8 for atomic storage.
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting => 3,
            ConnectionState::Error => 4,
        }
    }

    /// Decodes a state from its u8 form.
    ///
    /// Unknown values decode to `Disconnected`.
    #[inline]
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            4 => ConnectionState::Error,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Reconnecting => write!(f, "Reconnecting"),
            ConnectionState::Error => write!(f, "Error"),
        }
    }
}

// =============================================================================
// Sample
// =============================================================================

/// A timestamped value with quality and alarm metadata.
///
/// One `Sample` lives in each variable handle's `latest` slot and is the
/// payload of value-change events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// The value.
    pub value: Value,

    /// Quality of the value.
    pub quality: Quality,

    /// Server timestamp of the value (local time when the server did not
    /// supply one).
    pub timestamp: DateTime<Utc>,

    /// Alarm level derived from the definition's limits.
    pub alarm_level: AlarmLevel,
}

impl Sample {
    /// Creates a good-quality sample stamped now.
    pub fn good(value: Value) -> Self {
        Self {
            value,
            quality: Quality::Good,
            timestamp: Utc::now(),
            alarm_level: AlarmLevel::None,
        }
    }

    /// Creates the initial sample for a freshly registered variable:
    /// quality `CommFail` until the first update arrives.
    pub fn initial() -> Self {
        Self {
            value: Value::Bool(false),
            quality: Quality::CommFail,
            timestamp: Utc::now(),
            alarm_level: AlarmLevel::None,
        }
    }

    /// Returns `true` if the sample quality is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.quality.is_good()
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] @ {}",
            self.value,
            self.quality,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f")
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_id() {
        let id = TagId::new("Area1.Pump3.Speed.PV");
        assert_eq!(id.as_str(), "Area1.Pump3.Speed.PV");
        assert_eq!(format!("{}", id), "Area1.Pump3.Speed.PV");
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Value::Bool(true).type_name(), "bool");
        assert_eq!(Value::Int32(42).type_name(), "int32");
        assert_eq!(Value::Float64(3.5).type_name(), "float64");
        assert_eq!(Value::String("test".into()).type_name(), "string");
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Int32(42).as_i64(), Some(42));
        assert_eq!(Value::Int32(42).as_f64(), Some(42.0));
        assert_eq!(Value::Float64(3.5).as_f64(), Some(3.5));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::String("test".into()).as_str(), Some("test"));
        assert_eq!(Value::String("test".into()).as_f64(), None);
    }

    #[test]
    fn test_value_from() {
        let v: Value = 42i32.into();
        assert!(matches!(v, Value::Int32(42)));

        let v: Value = 3.5f64.into();
        assert!(matches!(v, Value::Float64(_)));

        let v: Value = "test".into();
        assert!(matches!(v, Value::String(_)));
    }

    #[test]
    fn test_quality() {
        assert!(Quality::Good.is_good());
        assert!(Quality::Good.is_usable());
        assert!(Quality::Uncertain.is_usable());
        assert!(!Quality::Bad.is_usable());
        assert!(Quality::CommFail.is_comm_failure());
        assert_eq!(Quality::default(), Quality::CommFail);
    }

    #[test]
    fn test_alarm_level_ordering() {
        assert!(AlarmLevel::None < AlarmLevel::Warning);
        assert!(AlarmLevel::Warning < AlarmLevel::Major);
        assert!(AlarmLevel::Major < AlarmLevel::Critical);
        assert!(!AlarmLevel::None.is_active());
        assert!(AlarmLevel::Warning.is_active());
    }

    #[test]
    fn test_connection_state_transitions() {
        use ConnectionState::*;

        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Reconnecting));
        assert!(Reconnecting.can_transition_to(Connecting));
        assert!(Error.can_transition_to(Connecting));
        assert!(Connected.can_transition_to(Error));
        assert!(Connected.can_transition_to(Disconnected));

        assert!(Connecting.can_transition_to(Reconnecting));

        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Reconnecting.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connected));
    }

    #[test]
    fn test_connection_state_atomic_roundtrip() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Error,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_sample_initial() {
        let sample = Sample::initial();
        assert_eq!(sample.quality, Quality::CommFail);
        assert_eq!(sample.alarm_level, AlarmLevel::None);
        assert!(!sample.is_good());
    }

    #[test]
    fn test_value_to_json() {
        let v = Value::Float64(3.5);
        assert_eq!(v.to_json().as_f64(), Some(3.5));

        let v = Value::Bool(true);
        assert_eq!(v.to_json().as_bool(), Some(true));
    }
}
