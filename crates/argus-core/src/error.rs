// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for ARGUS.
//!
//! This module defines the error types used across the runtime:
//!
//! - Clear, descriptive error messages
//! - Distinction between retryable and non-retryable errors
//! - Stable categories for structured logging and diagnostics
//!
//! # Error Hierarchy
//!
//! ```text
//! RuntimeError (root)
//! ├── Config      - Registration, addressing, and policy validation
//! ├── Connection  - Session lifecycle and transport failures
//! ├── Protocol    - Type codec and server status failures
//! ├── Capacity    - Back-pressure signals from bounded queues
//! └── Internal    - Invariant violations (fatal for the request)
//! ```
//!
//! # Examples
//!
//! ```
//! use argus_core::error::{ConnectionError, RuntimeError};
//! use std::time::Duration;
//!
//! let error = ConnectionError::timeout(Duration::from_secs(5));
//! assert!(error.is_retryable());
//!
//! let runtime_error: RuntimeError = error.into();
//! assert!(runtime_error.is_retryable());
//! ```

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// RuntimeError - Root Error Type
// =============================================================================

/// The root error type for ARGUS.
///
/// Every error surfaced by the runtime converts to this type, giving
/// callers a single error surface regardless of which subsystem failed.
#[derive(Debug, Error, Clone)]
pub enum RuntimeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Capacity error.
    #[error("Capacity error: {0}")]
    Capacity(#[from] CapacityError),

    /// Internal invariant violation. Fatal for the affected request.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Retryable errors are transient conditions that may succeed on a
    /// subsequent attempt. Retry itself is a policy decided above the
    /// runtime; this predicate only classifies.
    pub fn is_retryable(&self) -> bool {
        match self {
            RuntimeError::Connection(e) => e.is_retryable(),
            RuntimeError::Capacity(_) => true,
            RuntimeError::Config(_) | RuntimeError::Protocol(_) | RuntimeError::Internal(_) => {
                false
            }
        }
    }

    /// Returns the error category as a string for logging/metrics.
    pub fn category(&self) -> &'static str {
        match self {
            RuntimeError::Config(_) => "config",
            RuntimeError::Connection(_) => "connection",
            RuntimeError::Protocol(_) => "protocol",
            RuntimeError::Capacity(_) => "capacity",
            RuntimeError::Internal(_) => "internal",
        }
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Registration, addressing, and policy validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The textual node address could not be parsed.
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress {
        /// The offending address string.
        address: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A variable with this tag is already registered.
    #[error("Duplicate tag: {tag}")]
    DuplicateTag {
        /// The duplicated tag.
        tag: String,
    },

    /// No variable with this tag is registered.
    #[error("Unknown tag: {tag}")]
    UnknownTag {
        /// The unknown tag.
        tag: String,
    },

    /// The variable's definition forbids writes.
    #[error("Tag '{tag}' is not writable")]
    NotWritable {
        /// The tag.
        tag: String,
    },

    /// A policy or definition field failed validation.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// What was wrong.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid address error.
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Creates a duplicate tag error.
    pub fn duplicate_tag(tag: impl Into<String>) -> Self {
        Self::DuplicateTag { tag: tag.into() }
    }

    /// Creates an unknown tag error.
    pub fn unknown_tag(tag: impl Into<String>) -> Self {
        Self::UnknownTag { tag: tag.into() }
    }

    /// Creates a not-writable error.
    pub fn not_writable(tag: impl Into<String>) -> Self {
        Self::NotWritable { tag: tag.into() }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ConfigError::InvalidAddress { .. } => "invalid_address",
            ConfigError::DuplicateTag { .. } => "duplicate_tag",
            ConfigError::UnknownTag { .. } => "unknown_tag",
            ConfigError::NotWritable { .. } => "not_writable",
            ConfigError::Validation { .. } => "validation",
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Session lifecycle and transport failures.
#[derive(Debug, Error, Clone)]
pub enum ConnectionError {
    /// No active session.
    #[error("Not connected to OPC UA server")]
    NotConnected,

    /// The operation did not complete within its deadline.
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// The timeout that elapsed.
        duration: Duration,
    },

    /// The server rejected the identity token. Terminal: the supervisor
    /// does not retry authentication failures.
    #[error("Authentication failed: {message}")]
    AuthFailed {
        /// Server-provided detail.
        message: String,
    },

    /// The endpoint could not be reached.
    #[error("Endpoint unreachable: {endpoint}: {message}")]
    EndpointUnreachable {
        /// The endpoint URL.
        endpoint: String,
        /// Underlying transport detail.
        message: String,
    },

    /// The session was closed by the server or the transport.
    #[error("Session closed: {reason}")]
    SessionClosed {
        /// Why the session ended.
        reason: String,
    },
}

impl ConnectionError {
    /// Creates a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Creates an authentication failure.
    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::AuthFailed {
            message: message.into(),
        }
    }

    /// Creates an endpoint-unreachable error.
    pub fn endpoint_unreachable(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EndpointUnreachable {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a session-closed error.
    pub fn session_closed(reason: impl Into<String>) -> Self {
        Self::SessionClosed {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Authentication failures are terminal; everything else at this
    /// layer is a transient wire condition.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ConnectionError::AuthFailed { .. })
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ConnectionError::NotConnected => "not_connected",
            ConnectionError::Timeout { .. } => "timeout",
            ConnectionError::AuthFailed { .. } => "auth_failed",
            ConnectionError::EndpointUnreachable { .. } => "endpoint_unreachable",
            ConnectionError::SessionClosed { .. } => "session_closed",
        }
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// Type codec and server status failures.
#[derive(Debug, Error, Clone)]
pub enum ProtocolError {
    /// The value could not be represented as the expected wire type.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: String,
        /// Actual type name.
        actual: String,
    },

    /// The wire value uses a type the codec does not support.
    #[error("Unsupported type: {type_name}")]
    UnsupportedType {
        /// The unsupported type name.
        type_name: String,
    },

    /// The server returned a bad status code for the operation.
    #[error("Bad server status {status_code:#010x} ({status_name})")]
    ServerStatus {
        /// The raw status code.
        status_code: u32,
        /// Human-readable status name.
        status_name: String,
    },
}

impl ProtocolError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Creates a server status error.
    pub fn server_status(status_code: u32, status_name: impl Into<String>) -> Self {
        Self::ServerStatus {
            status_code,
            status_name: status_name.into(),
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ProtocolError::TypeMismatch { .. } => "type_mismatch",
            ProtocolError::UnsupportedType { .. } => "unsupported_type",
            ProtocolError::ServerStatus { .. } => "server_status",
        }
    }
}

// =============================================================================
// CapacityError
// =============================================================================

/// Back-pressure signals from bounded queues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapacityError {
    /// The request queue is full; the submission was rejected.
    #[error("Request queue full ({depth} pending)")]
    Busy {
        /// Queue depth at the time of rejection.
        depth: usize,
    },

    /// The runtime is shedding load.
    #[error("Runtime overloaded")]
    Overload,
}

impl CapacityError {
    /// Creates a busy error.
    pub fn busy(depth: usize) -> Self {
        Self::Busy { depth }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            CapacityError::Busy { .. } => "busy",
            CapacityError::Overload => "overload",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// A Result type with RuntimeError.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A Result type with ConnectionError.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// A Result type with ProtocolError.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

// =============================================================================
// Tests
// =============================================================================
