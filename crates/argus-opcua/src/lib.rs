// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # argus-opcua
//!
//! The OPC UA connection and variable runtime for ARGUS.
//!
//! This crate maintains a durable session with one OPC UA server,
//! registers named process variables, and exposes a uniform interface
//! for reading, writing, browsing, and subscribing to value changes with
//! quality and timestamp metadata:
//!
//! - **node_id**: node identifiers and the textual address grammar
//! - **codec**: wire variant <-> native value conversion and the status
//!   code -> quality table
//! - **transport**: the `UaSession` abstraction over the protocol stack
//! - **supervisor**: connection state machine, keepalive, and
//!   backoff reconnect
//! - **registry**: stable per-tag handles under a read-heavy lock
//! - **pipeline**: the bounded async request pipeline and worker pool
//! - **subscription**: monitored-item and polling delivery with per-tag
//!   ordered ingest executors
//! - **client**: the `OpcUaClient` facade consumed by HMIs, historians,
//!   and control logic
//!
//! # Example
//!
//! ```rust,ignore
//! use argus_opcua::client::{ClientConfig, OpcUaClient};
//! use argus_opcua::transport::Identity;
//!
//! let client = OpcUaClient::new(session, ClientConfig::default());
//! client.connect("opc.tcp://127.0.0.1:4840", Identity::Anonymous).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod codec;
pub mod node_id;
pub mod pipeline;
pub mod registry;
pub mod subscription;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use client::{ClientConfig, OpcUaClient};
pub use codec::{decode, encode, quality_from_status, status_name, WireType, WireValue};
pub use node_id::{Identifier, NodeId, DEFAULT_NAMESPACE};
pub use pipeline::{BatchWriteResult, RequestOutcome, RequestPipeline};
pub use registry::{VariableHandle, VariableRegistry};
pub use subscription::{SubscriptionEngine, SubscriptionMode};
pub use supervisor::ConnectionSupervisor;
pub use transport::{
    BrowseRef, Identity, ReadOutcome, SessionEvent, UaSession, ValueNotification, WriteOutcome,
};
