// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Variable definitions: identity, scaling, alarm limits, and access.
//!
//! A [`VariableDefinition`] is the configuration half of a process
//! variable. It is created once (typically by the external configuration
//! store), validated at registration, and shared read-only with the
//! runtime for the lifetime of the handle.
//!
//! # Examples
//!
//! ```
//! use argus_core::variable::{VariableDefinition, VariableKind, AlarmLimits};
//!
//! let def = VariableDefinition::builder("Boiler1.Steam.Pressure.PV", "ns=2;s=Boiler1.Pressure")
//!     .kind(VariableKind::Ai)
//!     .eng_range(0.0, 16.0)
//!     .deadband(0.05)
//!     .alarm_limits(AlarmLimits::new(1.0, 2.0, 12.0, 14.0))
//!     .build()
//!     .unwrap();
//!
//! assert!(!def.writable);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{AlarmLevel, TagId};

// =============================================================================
// VariableKind
// =============================================================================

/// The kind of a process variable.
///
/// The kind selects the default write permission and tells consumers how
/// to interpret the value (analog vs. discrete vs. derived).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// Analog input.
    #[default]
    Ai,

    /// Analog output.
    Ao,

    /// Digital input.
    Di,

    /// Digital output.
    Do,

    /// Pulse/counter input.
    Pi,

    /// Pulse/counter output.
    Po,

    /// Calculated value (derived in the client, never written to the server).
    Calc,

    /// Status word.
    Status,

    /// Alarm flag.
    Alarm,

    /// Operator setpoint.
    Setpoint,
}

impl VariableKind {
    /// Returns the default write permission for this kind.
    ///
    /// Outputs and setpoints are writable by default; inputs and derived
    /// values are not.
    #[inline]
    pub fn default_writable(&self) -> bool {
        matches!(
            self,
            VariableKind::Ao | VariableKind::Do | VariableKind::Po | VariableKind::Setpoint
        )
    }

    /// Returns `true` if this kind carries an analog (continuous) value.
    #[inline]
    pub fn is_analog(&self) -> bool {
        matches!(
            self,
            VariableKind::Ai | VariableKind::Ao | VariableKind::Calc | VariableKind::Setpoint
        )
    }

    /// Returns `true` if this kind carries a discrete value.
    #[inline]
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            VariableKind::Di | VariableKind::Do | VariableKind::Status | VariableKind::Alarm
        )
    }

    /// Returns the kind name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableKind::Ai => "AI",
            VariableKind::Ao => "AO",
            VariableKind::Di => "DI",
            VariableKind::Do => "DO",
            VariableKind::Pi => "PI",
            VariableKind::Po => "PO",
            VariableKind::Calc => "CALC",
            VariableKind::Status => "STATUS",
            VariableKind::Alarm => "ALARM",
            VariableKind::Setpoint => "SETPOINT",
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// AlarmLimits
// =============================================================================

/// Alarm thresholds for an analog variable.
///
/// Invariant: `lolo <= lo <= hi <= hihi`. Values strictly outside
/// `[lo, hi]` raise a warning-level alarm; values strictly outside
/// `[lolo, hihi]` raise the definition's configured outer level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlarmLimits {
    /// Low-low threshold.
    pub lolo: f64,

    /// Low threshold.
    pub lo: f64,

    /// High threshold.
    pub hi: f64,

    /// High-high threshold.
    pub hihi: f64,
}

impl AlarmLimits {
    /// Creates alarm limits. Ordering is checked at definition validation.
    pub fn new(lolo: f64, lo: f64, hi: f64, hihi: f64) -> Self {
        Self { lolo, lo, hi, hihi }
    }

    /// Validates the threshold ordering.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.lolo <= self.lo && self.lo <= self.hi && self.hi <= self.hihi) {
            return Err(ConfigError::validation(
                "alarm_limits",
                format!(
                    "thresholds must satisfy lolo <= lo <= hi <= hihi, got {} / {} / {} / {}",
                    self.lolo, self.lo, self.hi, self.hihi
                ),
            ));
        }
        Ok(())
    }

    /// Classifies a value against these limits.
    ///
    /// `outer_level` is the level assigned to low-low / high-high
    /// violations; inner violations are always [`AlarmLevel::Warning`].
    pub fn classify(&self, value: f64, outer_level: AlarmLevel) -> AlarmLevel {
        if value < self.lolo || value > self.hihi {
            outer_level
        } else if value < self.lo || value > self.hi {
            AlarmLevel::Warning
        } else {
            AlarmLevel::None
        }
    }
}

// =============================================================================
// ConversionFn
// =============================================================================

/// An explicit engineering-conversion function.
///
/// When present on a definition it takes precedence over the linear
/// `scale`/`offset` path; the choice belongs entirely to the caller.
#[derive(Clone)]
pub struct ConversionFn(Arc<dyn Fn(f64) -> f64 + Send + Sync>);

impl ConversionFn {
    /// Wraps a conversion closure.
    pub fn new(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Applies the conversion.
    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        (self.0)(raw)
    }
}

impl fmt::Debug for ConversionFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConversionFn")
    }
}

// =============================================================================
// VariableDefinition
// =============================================================================

/// Identity and configuration of one process variable.
///
/// The definition is immutable after registration; the runtime holds it
/// behind an `Arc` inside the variable handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDefinition {
    /// Stable unique tag.
    pub tag: TagId,

    /// Textual node address, parsed once at registration.
    pub address: String,

    /// Variable kind.
    #[serde(default)]
    pub kind: VariableKind,

    /// Lower bound of the engineering range.
    #[serde(default = "default_eng_min")]
    pub eng_min: f64,

    /// Upper bound of the engineering range.
    #[serde(default = "default_eng_max")]
    pub eng_max: f64,

    /// Lower bound of the raw range.
    #[serde(default = "default_raw_min")]
    pub raw_min: f64,

    /// Upper bound of the raw range.
    #[serde(default = "default_raw_max")]
    pub raw_max: f64,

    /// Linear scale applied to raw values.
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Linear offset applied after scaling.
    #[serde(default)]
    pub offset: f64,

    /// Minimum change below which an update is treated as unchanged.
    #[serde(default)]
    pub deadband: f64,

    /// Alarm thresholds, if the variable is alarmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_limits: Option<AlarmLimits>,

    /// Level assigned to low-low / high-high violations.
    #[serde(default = "default_alarm_level")]
    pub alarm_level: AlarmLevel,

    /// Whether writes are permitted.
    #[serde(default)]
    pub writable: bool,

    /// Access group for external authorization layers.
    #[serde(default)]
    pub access_group: String,

    /// Requested update cadence.
    #[serde(default = "default_update_rate", with = "humantime_serde")]
    pub update_rate: Duration,

    /// Scheduling priority, 0 (lowest) to 100 (highest).
    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Explicit conversion function; wins over `scale`/`offset`.
    #[serde(skip)]
    pub conversion: Option<ConversionFn>,
}

fn default_eng_min() -> f64 {
    0.0
}

fn default_eng_max() -> f64 {
    100.0
}

fn default_raw_min() -> f64 {
    0.0
}

fn default_raw_max() -> f64 {
    65535.0
}

fn default_scale() -> f64 {
    1.0
}

fn default_alarm_level() -> AlarmLevel {
    AlarmLevel::Major
}

fn default_update_rate() -> Duration {
    Duration::from_secs(1)
}

fn default_priority() -> u8 {
    50
}

impl VariableDefinition {
    /// Creates a definition builder.
    pub fn builder(tag: impl Into<TagId>, address: impl Into<String>) -> VariableDefinitionBuilder {
        VariableDefinitionBuilder::new(tag, address)
    }

    /// Validates every definition invariant.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tag.as_str().is_empty() {
            return Err(ConfigError::validation("tag", "tag must not be empty"));
        }
        if self.address.is_empty() {
            return Err(ConfigError::invalid_address("", "address must not be empty"));
        }
        if !(self.eng_min < self.eng_max) {
            return Err(ConfigError::validation(
                "eng_range",
                format!("eng_min ({}) must be < eng_max ({})", self.eng_min, self.eng_max),
            ));
        }
        if !(self.raw_min < self.raw_max) {
            return Err(ConfigError::validation(
                "raw_range",
                format!("raw_min ({}) must be < raw_max ({})", self.raw_min, self.raw_max),
            ));
        }
        if !self.deadband.is_finite() || self.deadband < 0.0 {
            return Err(ConfigError::validation(
                "deadband",
                format!("deadband must be finite and >= 0, got {}", self.deadband),
            ));
        }
        if self.priority > 100 {
            return Err(ConfigError::validation(
                "priority",
                format!("priority must be in [0, 100], got {}", self.priority),
            ));
        }
        if let Some(limits) = &self.alarm_limits {
            limits.validate()?;
        }
        Ok(())
    }

    /// Converts a raw numeric value to engineering units.
    ///
    /// The explicit conversion function wins when present; otherwise the
    /// linear `raw * scale + offset` transform applies.
    #[inline]
    pub fn raw_to_eng(&self, raw: f64) -> f64 {
        match &self.conversion {
            Some(f) => f.apply(raw),
            None => raw * self.scale + self.offset,
        }
    }

    /// Converts an engineering value back to its raw form.
    ///
    /// Only defined for the linear path; definitions carrying an explicit
    /// conversion function must be written in raw units by the caller.
    #[inline]
    pub fn eng_to_raw(&self, eng: f64) -> f64 {
        (eng - self.offset) / self.scale
    }

    /// Returns `true` if the engineering value is inside the configured
    /// engineering range.
    #[inline]
    pub fn in_eng_range(&self, eng: f64) -> bool {
        eng >= self.eng_min && eng <= self.eng_max
    }

    /// Classifies a value against the definition's alarm limits.
    ///
    /// Definitions without limits never alarm.
    pub fn classify_alarm(&self, value: f64) -> AlarmLevel {
        match &self.alarm_limits {
            Some(limits) => limits.classify(value, self.alarm_level),
            None => AlarmLevel::None,
        }
    }
}

// =============================================================================
// VariableDefinitionBuilder
// =============================================================================

/// Builder for [`VariableDefinition`].
#[derive(Debug)]
pub struct VariableDefinitionBuilder {
    def: VariableDefinition,
    writable_set: bool,
}

impl VariableDefinitionBuilder {
    /// Creates a builder with the two required fields.
    pub fn new(tag: impl Into<TagId>, address: impl Into<String>) -> Self {
        Self {
            def: VariableDefinition {
                tag: tag.into(),
                address: address.into(),
                kind: VariableKind::default(),
                eng_min: default_eng_min(),
                eng_max: default_eng_max(),
                raw_min: default_raw_min(),
                raw_max: default_raw_max(),
                scale: default_scale(),
                offset: 0.0,
                deadband: 0.0,
                alarm_limits: None,
                alarm_level: default_alarm_level(),
                writable: false,
                access_group: String::new(),
                update_rate: default_update_rate(),
                priority: default_priority(),
                conversion: None,
            },
            writable_set: false,
        }
    }

    /// Sets the variable kind.
    pub fn kind(mut self, kind: VariableKind) -> Self {
        self.def.kind = kind;
        self
    }

    /// Sets the engineering range.
    pub fn eng_range(mut self, min: f64, max: f64) -> Self {
        self.def.eng_min = min;
        self.def.eng_max = max;
        self
    }

    /// Sets the raw range.
    pub fn raw_range(mut self, min: f64, max: f64) -> Self {
        self.def.raw_min = min;
        self.def.raw_max = max;
        self
    }

    /// Sets the linear scale and offset.
    pub fn scaling(mut self, scale: f64, offset: f64) -> Self {
        self.def.scale = scale;
        self.def.offset = offset;
        self
    }

    /// Sets the deadband.
    pub fn deadband(mut self, deadband: f64) -> Self {
        self.def.deadband = deadband;
        self
    }

    /// Sets the alarm limits.
    pub fn alarm_limits(mut self, limits: AlarmLimits) -> Self {
        self.def.alarm_limits = Some(limits);
        self
    }

    /// Sets the level assigned to outer-limit violations.
    pub fn alarm_level(mut self, level: AlarmLevel) -> Self {
        self.def.alarm_level = level;
        self
    }

    /// Overrides the kind-derived write permission.
    pub fn writable(mut self, writable: bool) -> Self {
        self.def.writable = writable;
        self.writable_set = true;
        self
    }

    /// Sets the access group.
    pub fn access_group(mut self, group: impl Into<String>) -> Self {
        self.def.access_group = group.into();
        self
    }

    /// Sets the requested update cadence.
    pub fn update_rate(mut self, rate: Duration) -> Self {
        self.def.update_rate = rate;
        self
    }

    /// Sets the scheduling priority (0-100).
    pub fn priority(mut self, priority: u8) -> Self {
        self.def.priority = priority;
        self
    }

    /// Sets the explicit conversion function.
    pub fn conversion(mut self, f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        self.def.conversion = Some(ConversionFn::new(f));
        self
    }

    /// Validates and builds the definition.
    pub fn build(mut self) -> ConfigResult<VariableDefinition> {
        if !self.writable_set {
            self.def.writable = self.def.kind.default_writable();
        }
        self.def.validate()?;
        Ok(self.def)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn analog(tag: &str) -> VariableDefinitionBuilder {
        VariableDefinition::builder(tag, "ns=2;s=Test.Node").kind(VariableKind::Ai)
    }

    #[test]
    fn test_kind_default_writable() {
        assert!(!VariableKind::Ai.default_writable());
        assert!(VariableKind::Ao.default_writable());
        assert!(!VariableKind::Di.default_writable());
        assert!(VariableKind::Do.default_writable());
        assert!(VariableKind::Setpoint.default_writable());
        assert!(!VariableKind::Calc.default_writable());
    }

    #[test]
    fn test_builder_defaults() {
        let def = analog("T1").build().unwrap();
        assert_eq!(def.kind, VariableKind::Ai);
        assert!(!def.writable);
        assert_eq!(def.scale, 1.0);
        assert_eq!(def.deadband, 0.0);
        assert_eq!(def.priority, 50);
    }

    #[test]
    fn test_builder_writable_override() {
        let def = analog("T1").writable(true).build().unwrap();
        assert!(def.writable);

        let def = VariableDefinition::builder("T2", "ns=2;s=X")
            .kind(VariableKind::Ao)
            .writable(false)
            .build()
            .unwrap();
        assert!(!def.writable);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(analog("T1").eng_range(10.0, 5.0).build().is_err());
        assert!(analog("T1").raw_range(1.0, 1.0).build().is_err());
        assert!(analog("T1").deadband(-0.1).build().is_err());
        assert!(analog("T1").priority(101).build().is_err());
        assert!(VariableDefinition::builder("", "ns=2;s=X").build().is_err());
        assert!(VariableDefinition::builder("T1", "").build().is_err());
    }

    #[test]
    fn test_alarm_limits_ordering() {
        assert!(AlarmLimits::new(1.0, 2.0, 3.0, 4.0).validate().is_ok());
        assert!(AlarmLimits::new(2.0, 1.0, 3.0, 4.0).validate().is_err());
        assert!(AlarmLimits::new(1.0, 2.0, 4.0, 3.0).validate().is_err());
    }

    #[test]
    fn test_alarm_classification() {
        let def = analog("T1")
            .alarm_limits(AlarmLimits::new(1.0, 2.0, 12.0, 14.0))
            .build()
            .unwrap();

        assert_eq!(def.classify_alarm(6.0), AlarmLevel::None);
        assert_eq!(def.classify_alarm(12.0), AlarmLevel::None);
        assert_eq!(def.classify_alarm(12.5), AlarmLevel::Warning);
        assert_eq!(def.classify_alarm(15.0), AlarmLevel::Major);
        assert_eq!(def.classify_alarm(1.5), AlarmLevel::Warning);
        assert_eq!(def.classify_alarm(0.5), AlarmLevel::Major);
    }

    #[test]
    fn test_no_limits_never_alarms() {
        let def = analog("T1").build().unwrap();
        assert_eq!(def.classify_alarm(1e9), AlarmLevel::None);
    }

    #[test]
    fn test_linear_scaling() {
        let def = analog("T1").scaling(0.1, -5.0).build().unwrap();
        assert!((def.raw_to_eng(100.0) - 5.0).abs() < 1e-9);
        assert!((def.eng_to_raw(5.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_conversion_fn_wins() {
        let def = analog("T1")
            .scaling(2.0, 0.0)
            .conversion(|raw| raw * raw)
            .build()
            .unwrap();
        assert_eq!(def.raw_to_eng(3.0), 9.0);
    }

    #[test]
    fn test_eng_range_check() {
        let def = analog("T1").eng_range(0.0, 10.0).build().unwrap();
        assert!(def.in_eng_range(0.0));
        assert!(def.in_eng_range(10.0));
        assert!(!def.in_eng_range(10.1));
    }
}
