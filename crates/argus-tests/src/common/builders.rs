// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Object Builders
//!
//! Helpers for constructing definitions and runtime configurations with
//! test-friendly defaults.

use std::time::Duration;

use argus_core::policy::{EngineConfig, PipelineConfig, ReconnectPolicy};
use argus_core::variable::{AlarmLimits, VariableDefinition, VariableKind};
use argus_opcua::client::ClientConfig;

/// Builds an analog-input definition addressed at `ns=2;s=<tag>`.
pub fn analog_input(tag: &str) -> VariableDefinition {
    VariableDefinition::builder(tag, format!("ns=2;s={}", tag))
        .kind(VariableKind::Ai)
        .build()
        .expect("valid analog input definition")
}

/// Builds a writable analog-output definition.
pub fn analog_output(tag: &str) -> VariableDefinition {
    VariableDefinition::builder(tag, format!("ns=2;s={}", tag))
        .kind(VariableKind::Ao)
        .build()
        .expect("valid analog output definition")
}

/// Builds an analog input with a deadband.
pub fn analog_input_with_deadband(tag: &str, deadband: f64) -> VariableDefinition {
    VariableDefinition::builder(tag, format!("ns=2;s={}", tag))
        .kind(VariableKind::Ai)
        .deadband(deadband)
        .build()
        .expect("valid deadband definition")
}

/// Builds an analog input with alarm limits.
pub fn alarmed_input(tag: &str, limits: AlarmLimits) -> VariableDefinition {
    VariableDefinition::builder(tag, format!("ns=2;s={}", tag))
        .kind(VariableKind::Ai)
        .eng_range(0.0, 200.0)
        .alarm_limits(limits)
        .build()
        .expect("valid alarmed definition")
}

/// A reconnect policy scaled down for tests: millisecond backoff and a
/// fast keepalive.
pub fn fast_reconnect_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        keepalive_interval: Duration::from_millis(30),
        keepalive_timeout: Duration::from_millis(200),
        ..Default::default()
    }
}

/// A client configuration scaled down for tests.
pub fn fast_client_config() -> ClientConfig {
    ClientConfig {
        reconnect: fast_reconnect_policy(),
        pipeline: PipelineConfig {
            request_timeout: Duration::from_millis(500),
            ..Default::default()
        },
        engine: EngineConfig {
            iterate_interval: Duration::from_millis(10),
            polling_interval: Duration::from_millis(25),
            rebuild_debounce: Duration::from_millis(50),
            executors: 2,
        },
        ..Default::default()
    }
}

/// A client configuration with a slow keepalive, for tests that must
/// not be disturbed by probe traffic.
pub fn quiet_client_config() -> ClientConfig {
    let mut config = fast_client_config();
    config.reconnect.keepalive_interval = Duration::from_secs(60);
    config
}
