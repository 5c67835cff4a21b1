// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # argus-core
//!
//! Core abstractions and shared types for the ARGUS OPC UA client runtime.
//!
//! This crate provides the foundation used by the protocol crate and by
//! external consumers (HMI widgets, historians, control logic):
//!
//! - **Types**: `TagId`, the native `Value` union, `Quality`, `AlarmLevel`,
//!   `ConnectionState`, and the timestamped `Sample`
//! - **Variable**: `VariableDefinition` with kinds, scaling, alarm limits,
//!   and the explicit conversion-function slot
//! - **Error**: the unified `RuntimeError` hierarchy
//! - **Policy**: reconnect, subscription, monitored-item, pipeline, and
//!   engine configuration
//! - **Event**: the typed event plane (`RuntimeEvent` over a broadcast bus)
//! - **Diagnostics**: bounded last-errors ring and runtime statistics
//!
//! ## Example
//!
//! ```
//! use argus_core::types::{TagId, Value, Quality};
//! use argus_core::variable::{VariableDefinition, VariableKind};
//!
//! let def = VariableDefinition::builder("Line2.Motor1.Speed.PV", "ns=2;s=Line2.Motor1.Speed")
//!     .kind(VariableKind::Ai)
//!     .deadband(0.5)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(def.tag, TagId::new("Line2.Motor1.Speed.PV"));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod diagnostics;
pub mod error;
pub mod event;
pub mod policy;
pub mod types;
pub mod variable;

// Re-export commonly used types
pub use diagnostics::{ErrorRecord, ErrorRing, RuntimeStats};
pub use error::{
    CapacityError, ConfigError, ConfigResult, ConnectionError, ConnectionResult, ProtocolError,
    ProtocolResult, RuntimeError, RuntimeResult,
};
pub use event::{EventBus, RuntimeEvent};
pub use policy::{
    EngineConfig, MonitoredItemConfig, PipelineConfig, ReconnectPolicy, SubscriptionConfig,
};
pub use types::{AlarmLevel, ConnectionState, Quality, Sample, TagId, Value};
pub use variable::{AlarmLimits, ConversionFn, VariableDefinition, VariableDefinitionBuilder, VariableKind};
