// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session transport abstraction.
//!
//! [`UaSession`] is the seam between the runtime and the underlying OPC
//! UA stack: connect/disconnect, attribute reads and writes, browsing,
//! subscription management, and the cooperative `iterate` call that
//! lets the session deliver pending notifications.
//!
//! # Thread safety
//!
//! A session object is **not** thread-safe. The runtime funnels every
//! call through a single `tokio::sync::Mutex`; the `&mut self` receivers
//! here make that contract explicit. Implementations must never invoke
//! the session from inside a notification they are delivering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

use argus_core::error::ConnectionResult;
use argus_core::policy::{MonitoredItemConfig, SubscriptionConfig};

use crate::codec::{status, WireValue};
use crate::node_id::NodeId;

// =============================================================================
// Identity
// =============================================================================

/// Client identity presented during session activation.
///
/// Only anonymous and username/password tokens are supported; all other
/// token types are out of scope for this runtime.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    /// Anonymous authentication.
    #[default]
    Anonymous,

    /// Username/password authentication (the `username` policy id).
    UserName {
        /// The username.
        username: String,
        /// The password.
        password: String,
    },
}

impl Identity {
    /// Creates a username/password identity.
    pub fn user(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserName {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns `true` if this is the anonymous identity.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::UserName { username, .. } => write!(f, "UserName({})", username),
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of one attribute read.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    /// The node that was read.
    pub node_id: NodeId,

    /// The delivered value, when the status permits one.
    pub value: Option<WireValue>,

    /// Wire status code of the read.
    pub status_code: u32,

    /// Server timestamp, if supplied.
    pub server_timestamp: Option<DateTime<Utc>>,

    /// Source timestamp, if supplied.
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl ReadOutcome {
    /// Creates a good outcome stamped now.
    pub fn good(node_id: NodeId, value: WireValue) -> Self {
        Self {
            node_id,
            value: Some(value),
            status_code: status::GOOD,
            server_timestamp: Some(Utc::now()),
            source_timestamp: None,
        }
    }

    /// Creates a failed outcome.
    pub fn failed(node_id: NodeId, status_code: u32) -> Self {
        Self {
            node_id,
            value: None,
            status_code,
            server_timestamp: Some(Utc::now()),
            source_timestamp: None,
        }
    }

    /// Returns `true` if the read succeeded.
    #[inline]
    pub fn is_good(&self) -> bool {
        status::is_good(self.status_code)
    }
}

/// Result of one attribute write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// The node that was written.
    pub node_id: NodeId,

    /// Wire status code of the write.
    pub status_code: u32,
}

impl WriteOutcome {
    /// Creates a good outcome.
    pub fn good(node_id: NodeId) -> Self {
        Self {
            node_id,
            status_code: status::GOOD,
        }
    }

    /// Creates a failed outcome.
    pub fn failed(node_id: NodeId, status_code: u32) -> Self {
        Self {
            node_id,
            status_code,
        }
    }

    /// Returns `true` if the write succeeded.
    #[inline]
    pub fn is_good(&self) -> bool {
        status::is_good(self.status_code)
    }
}

/// One reference discovered by a browse.
#[derive(Debug, Clone)]
pub struct BrowseRef {
    /// The target node.
    pub node_id: NodeId,

    /// Browse name of the target.
    pub browse_name: String,

    /// Display name of the target.
    pub display_name: String,

    /// `true` when the target is a variable node.
    pub is_variable: bool,
}

// =============================================================================
// Session events
// =============================================================================

/// A data-change notification delivered by the server.
///
/// The value is owned: the session layer must copy out of any reused
/// server buffer before handing the notification to the runtime.
#[derive(Debug, Clone)]
pub struct ValueNotification {
    /// The subscription that produced the notification.
    pub subscription_id: u32,

    /// The monitored item that changed.
    pub monitored_item_id: u32,

    /// The new value.
    pub value: WireValue,

    /// Wire status code attached to the sample.
    pub status_code: u32,

    /// Server timestamp, if supplied.
    pub server_timestamp: Option<DateTime<Utc>>,

    /// Source timestamp, if supplied.
    pub source_timestamp: Option<DateTime<Utc>>,
}

/// Events surfaced by [`UaSession::iterate`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A monitored item delivered a new sample.
    Notification(ValueNotification),

    /// The server deleted a subscription (timeout or administrative).
    SubscriptionDropped {
        /// The deleted subscription.
        subscription_id: u32,
    },
}

// =============================================================================
// UaSession
// =============================================================================

/// Low-level session operations against one OPC UA server.
///
/// Implementations wrap a concrete protocol stack; the runtime only ever
/// talks to this trait, which keeps the supervisor, pipeline, and
/// subscription engine testable against scripted sessions.
#[async_trait]
pub trait UaSession: Send + Sync {
    /// Establishes and activates a session against `endpoint`.
    ///
    /// Implementations resolve the endpoint, apply the identity token,
    /// and complete the handshake. They do not probe the session; the
    /// supervisor issues the probe read so that a half-open session
    /// counts as a failed attempt.
    async fn connect(&mut self, endpoint: &str, identity: &Identity) -> ConnectionResult<()>;

    /// Closes the session.
    async fn disconnect(&mut self) -> ConnectionResult<()>;

    /// Returns `true` while a session is established.
    fn is_connected(&self) -> bool;

    /// Reads the value attribute of one node.
    async fn read_value(&mut self, node_id: &NodeId) -> ConnectionResult<ReadOutcome>;

    /// Reads the value attribute of several nodes.
    ///
    /// The default implementation loops over [`read_value`]; stacks with
    /// a native bulk read should override it.
    ///
    /// [`read_value`]: UaSession::read_value
    async fn read_values(&mut self, node_ids: &[NodeId]) -> ConnectionResult<Vec<ReadOutcome>> {
        let mut outcomes = Vec::with_capacity(node_ids.len());
        for node_id in node_ids {
            outcomes.push(self.read_value(node_id).await?);
        }
        Ok(outcomes)
    }

    /// Writes the value attribute of one node.
    async fn write_value(
        &mut self,
        node_id: &NodeId,
        value: WireValue,
    ) -> ConnectionResult<WriteOutcome>;

    /// Browses the forward references of one node.
    async fn browse(&mut self, node_id: &NodeId) -> ConnectionResult<Vec<BrowseRef>>;

    /// Creates a server-side subscription and returns its id.
    async fn create_subscription(&mut self, config: &SubscriptionConfig)
        -> ConnectionResult<u32>;

    /// Deletes a server-side subscription.
    async fn delete_subscription(&mut self, subscription_id: u32) -> ConnectionResult<()>;

    /// Creates a monitored item on the value attribute of `node_id`.
    ///
    /// The returned id is server-assigned; the runtime never mints item
    /// ids itself.
    async fn create_monitored_item(
        &mut self,
        subscription_id: u32,
        node_id: &NodeId,
        config: &MonitoredItemConfig,
    ) -> ConnectionResult<u32>;

    /// Deletes monitored items from a subscription.
    async fn delete_monitored_items(
        &mut self,
        subscription_id: u32,
        item_ids: &[u32],
    ) -> ConnectionResult<()>;

    /// Lets the session process background work for up to `budget` and
    /// returns the events that became ready.
    ///
    /// Called by the engine's single-threaded iterate driver on a fixed
    /// cadence; nothing else may touch the session concurrently.
    async fn iterate(&mut self, budget: Duration) -> ConnectionResult<Vec<SessionEvent>>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert!(Identity::Anonymous.is_anonymous());
        let id = Identity::user("operator", "secret");
        assert!(!id.is_anonymous());
        // Display never leaks the password.
        assert!(!format!("{}", id).contains("secret"));
    }

    #[test]
    fn test_read_outcome() {
        let good = ReadOutcome::good(NodeId::numeric(2, 1), WireValue::Int32(5));
        assert!(good.is_good());
        assert!(good.value.is_some());

        let failed = ReadOutcome::failed(NodeId::numeric(2, 1), status::BAD_NODE_ID_UNKNOWN);
        assert!(!failed.is_good());
        assert!(failed.value.is_none());
    }

    #[test]
    fn test_write_outcome() {
        assert!(WriteOutcome::good(NodeId::numeric(2, 1)).is_good());
        assert!(!WriteOutcome::failed(NodeId::numeric(2, 1), status::BAD_NOT_WRITABLE).is_good());
    }
}
