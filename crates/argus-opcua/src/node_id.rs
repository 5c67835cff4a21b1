// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA node identifiers and the textual address grammar.
//!
//! A [`NodeId`] uniquely identifies a node within an OPC UA server: a
//! namespace index plus a typed identifier (numeric, string, GUID, or
//! opaque byte string).
//!
//! # Address grammar
//!
//! ```text
//! node-id  := [ "ns=" uint ";" ] ( id-str | id-num | id-guid | id-bytes )
//! id-str   := "s=" utf8
//! id-num   := "i=" uint
//! id-guid  := "g=" hex-guid
//! id-bytes := "b=" base64
//! ```
//!
//! When no identifier prefix is present the whole input is taken as a
//! string identifier in the default application namespace (2) - the
//! common industrial shorthand `PLC1.DB5.Temperature` rather than
//! `ns=2;s=PLC1.DB5.Temperature`. Empty input is rejected with
//! `InvalidAddress`. Parsing is idempotent: formatting a parsed id and
//! re-parsing yields the same id.
//!
//! # Examples
//!
//! ```
//! use argus_opcua::node_id::NodeId;
//!
//! let a: NodeId = "ns=2;s=Sie.S71200.TestDB.Out3".parse().unwrap();
//! let b: NodeId = "Sie.S71200.TestDB.Out3".parse().unwrap();
//! assert_eq!(a, b);
//!
//! let n: NodeId = "ns=3;i=1001".parse().unwrap();
//! assert_eq!(n.to_string(), "ns=3;i=1001");
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use argus_core::error::ConfigError;

/// Namespace assumed for bare-string shorthand addresses.
pub const DEFAULT_NAMESPACE: u16 = 2;

// =============================================================================
// NodeId
// =============================================================================

/// An OPC UA node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The typed identifier.
    pub identifier: Identifier,
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: Identifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: Identifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: Identifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: Identifier::Opaque(value),
        }
    }

    // =========================================================================
    // Well-known nodes
    // =========================================================================

    /// The Server object node (ns=0, i=2253).
    pub const SERVER: NodeId = NodeId {
        namespace_index: 0,
        identifier: Identifier::Numeric(2253),
    };

    /// The server's current-time variable (ns=0, i=2258), read by the
    /// connect probe and every keepalive tick.
    pub const SERVER_TIME: NodeId = NodeId {
        namespace_index: 0,
        identifier: Identifier::Numeric(2258),
    };

    /// The Objects folder (ns=0, i=85), the usual browse entry point.
    pub const OBJECTS_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: Identifier::Numeric(85),
    };

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns `true` if this is the null node id (ns=0, i=0).
    #[inline]
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, Identifier::Numeric(0))
    }

    /// Returns the null node id (ns=0, i=0).
    #[inline]
    pub const fn null() -> Self {
        Self {
            namespace_index: 0,
            identifier: Identifier::Numeric(0),
        }
    }

    /// Returns `true` if this is a string identifier.
    #[inline]
    pub const fn is_string(&self) -> bool {
        matches!(self.identifier, Identifier::String(_))
    }

    /// Returns `true` if this is a numeric identifier.
    #[inline]
    pub const fn is_numeric(&self) -> bool {
        matches!(self.identifier, Identifier::Numeric(_))
    }

    /// Returns the string value if this is a string identifier.
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match &self.identifier {
            Identifier::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the numeric value if this is a numeric identifier.
    #[inline]
    pub fn as_numeric(&self) -> Option<u32> {
        match &self.identifier {
            Identifier::Numeric(v) => Some(*v),
            _ => None,
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    /// Formats in the canonical `ns=<n>;<prefix>=<id>` form.
    ///
    /// Namespace 0 is elided, matching the common server notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index != 0 {
            write!(f, "ns={};", self.namespace_index)?;
        }
        write!(f, "{}", self.identifier)
    }
}

impl FromStr for NodeId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::invalid_address(s, "empty address"));
        }

        // Optional namespace prefix.
        let (namespace, id_part, had_ns) = if let Some(rest) = trimmed.strip_prefix("ns=") {
            let (ns_str, id_part) = rest.split_once(';').ok_or_else(|| {
                ConfigError::invalid_address(s, "missing identifier after namespace")
            })?;
            let ns: u16 = ns_str.parse().map_err(|_| {
                ConfigError::invalid_address(s, format!("invalid namespace index '{}'", ns_str))
            })?;
            (ns, id_part, true)
        } else {
            (0, trimmed, false)
        };

        let identifier = if let Some(id) = id_part.strip_prefix("s=") {
            Identifier::String(id.to_string())
        } else if let Some(id) = id_part.strip_prefix("i=") {
            let value: u32 = id.parse().map_err(|_| {
                ConfigError::invalid_address(s, format!("invalid numeric identifier '{}'", id))
            })?;
            Identifier::Numeric(value)
        } else if let Some(id) = id_part.strip_prefix("g=") {
            let uuid = Uuid::parse_str(id).map_err(|e| {
                ConfigError::invalid_address(s, format!("invalid GUID: {}", e))
            })?;
            Identifier::Guid(uuid)
        } else if let Some(id) = id_part.strip_prefix("b=") {
            let bytes = BASE64.decode(id).map_err(|e| {
                ConfigError::invalid_address(s, format!("invalid base64: {}", e))
            })?;
            Identifier::Opaque(bytes)
        } else if had_ns {
            return Err(ConfigError::invalid_address(
                s,
                "unknown identifier type; expected s=, i=, g=, or b=",
            ));
        } else {
            // Bare-string shorthand: the whole input is a string identifier
            // in the default application namespace.
            return Ok(Self::string(DEFAULT_NAMESPACE, trimmed));
        };

        Ok(Self {
            namespace_index: namespace,
            identifier,
        })
    }
}

// =============================================================================
// Identifier
// =============================================================================

/// The four identifier kinds defined by the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Identifier {
    /// Numeric identifier.
    Numeric(u32),

    /// String identifier.
    String(String),

    /// GUID identifier.
    Guid(Uuid),

    /// Opaque identifier (application-specific bytes).
    Opaque(Vec<u8>),
}

impl Identifier {
    /// Returns the textual prefix character for this identifier kind.
    pub const fn type_prefix(&self) -> char {
        match self {
            Self::Numeric(_) => 'i',
            Self::String(_) => 's',
            Self::Guid(_) => 'g',
            Self::Opaque(_) => 'b',
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
