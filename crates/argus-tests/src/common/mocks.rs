// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! A scriptable [`MockSession`] implementing the runtime's session
//! abstraction.
//!
//! ## Design Principles
//!
//! - Configurable behavior for different test scenarios
//! - Recording of interactions for verification
//! - Thread-safe: clones share one scripted state
//! - Easy error and latency injection

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use argus_core::error::{ConnectionError, ConnectionResult};
use argus_core::policy::{MonitoredItemConfig, SubscriptionConfig};
use argus_opcua::codec::{status, WireValue};
use argus_opcua::node_id::NodeId;
use argus_opcua::transport::{
    BrowseRef, Identity, ReadOutcome, SessionEvent, UaSession, ValueNotification, WriteOutcome,
};

// =============================================================================
// MockSession
// =============================================================================

#[derive(Default)]
struct MockState {
    connected: AtomicBool,
    reject_identity: AtomicBool,
    wire_failures: AtomicU32,
    latency: Mutex<Option<Duration>>,
    values: Mutex<HashMap<NodeId, WireValue>>,
    read_status: Mutex<HashMap<NodeId, u32>>,
    writes: Mutex<Vec<(NodeId, WireValue)>>,
    browse_results: Mutex<HashMap<NodeId, Vec<BrowseRef>>>,
    pending: Mutex<VecDeque<SessionEvent>>,
    subscriptions: Mutex<HashSet<u32>>,
    items: Mutex<HashMap<u32, NodeId>>,
    next_subscription_id: AtomicU32,
    next_item_id: AtomicU32,
    connects: AtomicU32,
    disconnects: AtomicU32,
}

/// A scriptable in-memory OPC UA session.
///
/// Clones share the same state, so tests keep one clone as a control
/// handle while the runtime owns the other.
#[derive(Clone, Default)]
pub struct MockSession {
    state: Arc<MockState>,
}

impl MockSession {
    /// Creates a healthy session: connects, probes, reads, and writes
    /// succeed.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Rejects every subsequent connect with an authentication failure.
    pub fn reject_identity(&self) {
        self.state.reject_identity.store(true, Ordering::SeqCst);
    }

    /// Injects `n` wire failures into upcoming reads and writes.
    /// `u32::MAX` fails forever (until cleared with 0).
    pub fn sever_wire(&self, n: u32) {
        self.state.wire_failures.store(n, Ordering::SeqCst);
    }

    /// Restores a severed wire.
    pub fn heal_wire(&self) {
        self.state.wire_failures.store(0, Ordering::SeqCst);
    }

    /// Adds artificial latency to every read.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.state.latency.lock() = latency;
    }

    /// Seeds the server-side value of a node.
    pub fn set_value(&self, node_id: NodeId, value: WireValue) {
        self.state.values.lock().insert(node_id, value);
    }

    /// Forces reads of `node_id` to report `status_code`.
    pub fn set_read_status(&self, node_id: NodeId, status_code: u32) {
        self.state.read_status.lock().insert(node_id, status_code);
    }

    /// Seeds the browse result of a node.
    pub fn set_browse_result(&self, node_id: NodeId, refs: Vec<BrowseRef>) {
        self.state.browse_results.lock().insert(node_id, refs);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns every write performed against the session.
    pub fn writes(&self) -> Vec<(NodeId, WireValue)> {
        self.state.writes.lock().clone()
    }

    /// Returns the number of completed connects.
    pub fn connect_count(&self) -> u32 {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Returns the number of disconnects.
    pub fn disconnect_count(&self) -> u32 {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    /// Returns the ids of live server-side subscriptions.
    pub fn live_subscriptions(&self) -> Vec<u32> {
        self.state.subscriptions.lock().iter().copied().collect()
    }

    /// Returns the monitored item id attached to `node_id`, if any.
    pub fn item_for_node(&self, node_id: &NodeId) -> Option<u32> {
        self.state
            .items
            .lock()
            .iter()
            .find(|(_, n)| *n == node_id)
            .map(|(id, _)| *id)
    }

    // =========================================================================
    // Server-driven behavior
    // =========================================================================

    /// Queues a data-change notification for the item attached to
    /// `node_id`.
    pub fn push_change(&self, node_id: &NodeId, value: WireValue) {
        self.push_change_with_status(node_id, value, status::GOOD);
    }

    /// Queues a data-change notification with an explicit status code.
    pub fn push_change_with_status(&self, node_id: &NodeId, value: WireValue, status_code: u32) {
        let item = self
            .item_for_node(node_id)
            .expect("node has no monitored item");
        let subscription = *self
            .state
            .subscriptions
            .lock()
            .iter()
            .next()
            .expect("no live subscription");
        self.state
            .pending
            .lock()
            .push_back(SessionEvent::Notification(ValueNotification {
                subscription_id: subscription,
                monitored_item_id: item,
                value,
                status_code,
                server_timestamp: Some(Utc::now()),
                source_timestamp: None,
            }));
    }

    /// Simulates the server deleting a subscription.
    pub fn delete_subscription_server_side(&self, subscription_id: u32) {
        self.state.subscriptions.lock().remove(&subscription_id);
        self.state.items.lock().clear();
        self.state
            .pending
            .lock()
            .push_back(SessionEvent::SubscriptionDropped { subscription_id });
    }

    fn ensure_connected(&self) -> ConnectionResult<()> {
        if self.state.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected)
        }
    }

    fn take_wire_failure(&self) -> bool {
        self.state
            .wire_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n == 0 {
                    None
                } else if n == u32::MAX {
                    Some(n)
                } else {
                    Some(n - 1)
                }
            })
            .is_ok()
    }
}

#[async_trait]
impl UaSession for MockSession {
    async fn connect(&mut self, _endpoint: &str, _identity: &Identity) -> ConnectionResult<()> {
        if self.state.reject_identity.load(Ordering::SeqCst) {
            return Err(ConnectionError::auth_failed("identity token rejected"));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> ConnectionResult<()> {
        self.state.connected.store(false, Ordering::SeqCst);
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    async fn read_value(&mut self, node_id: &NodeId) -> ConnectionResult<ReadOutcome> {
        self.ensure_connected()?;
        let latency = *self.state.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.take_wire_failure() {
            return Err(ConnectionError::session_closed("wire severed"));
        }
        if let Some(code) = self.state.read_status.lock().get(node_id) {
            return Ok(ReadOutcome::failed(node_id.clone(), *code));
        }
        if *node_id == NodeId::SERVER_TIME {
            return Ok(ReadOutcome::good(
                node_id.clone(),
                WireValue::DateTime(Utc::now()),
            ));
        }
        match self.state.values.lock().get(node_id) {
            Some(value) => Ok(ReadOutcome::good(node_id.clone(), value.clone())),
            None => Ok(ReadOutcome::failed(
                node_id.clone(),
                status::BAD_NODE_ID_UNKNOWN,
            )),
        }
    }

    async fn write_value(
        &mut self,
        node_id: &NodeId,
        value: WireValue,
    ) -> ConnectionResult<WriteOutcome> {
        self.ensure_connected()?;
        if self.take_wire_failure() {
            return Err(ConnectionError::session_closed("wire severed"));
        }
        self.state
            .values
            .lock()
            .insert(node_id.clone(), value.clone());
        self.state.writes.lock().push((node_id.clone(), value));
        Ok(WriteOutcome::good(node_id.clone()))
    }

    async fn browse(&mut self, node_id: &NodeId) -> ConnectionResult<Vec<BrowseRef>> {
        self.ensure_connected()?;
        Ok(self
            .state
            .browse_results
            .lock()
            .get(node_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_subscription(
        &mut self,
        _config: &SubscriptionConfig,
    ) -> ConnectionResult<u32> {
        self.ensure_connected()?;
        let id = self
            .state
            .next_subscription_id
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        self.state.subscriptions.lock().insert(id);
        Ok(id)
    }

    async fn delete_subscription(&mut self, subscription_id: u32) -> ConnectionResult<()> {
        self.state.subscriptions.lock().remove(&subscription_id);
        self.state.items.lock().clear();
        Ok(())
    }

    async fn create_monitored_item(
        &mut self,
        subscription_id: u32,
        node_id: &NodeId,
        _config: &MonitoredItemConfig,
    ) -> ConnectionResult<u32> {
        self.ensure_connected()?;
        if !self.state.subscriptions.lock().contains(&subscription_id) {
            return Err(ConnectionError::session_closed("unknown subscription"));
        }
        let id = self.state.next_item_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.items.lock().insert(id, node_id.clone());
        Ok(id)
    }

    async fn delete_monitored_items(
        &mut self,
        _subscription_id: u32,
        item_ids: &[u32],
    ) -> ConnectionResult<()> {
        let mut items = self.state.items.lock();
        for id in item_ids {
            items.remove(id);
        }
        Ok(())
    }

    async fn iterate(&mut self, _budget: Duration) -> ConnectionResult<Vec<SessionEvent>> {
        self.ensure_connected()?;
        Ok(self.state.pending.lock().drain(..).collect())
    }
}
