// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Scripted session shared by the unit tests in this crate.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use argus_core::error::{ConnectionError, ConnectionResult};
use argus_core::policy::{MonitoredItemConfig, SubscriptionConfig};

use crate::codec::{status, WireValue};
use crate::node_id::NodeId;
use crate::transport::{
    BrowseRef, Identity, ReadOutcome, SessionEvent, UaSession, ValueNotification, WriteOutcome,
};

#[derive(Default)]
struct Inner {
    connected: AtomicBool,
    fail_connect_auth: AtomicBool,
    fail_reads: AtomicU32,
    fail_writes: AtomicU32,
    read_delay: Mutex<Option<Duration>>,
    values: Mutex<HashMap<NodeId, WireValue>>,
    writes: Mutex<Vec<(NodeId, WireValue)>>,
    pending: Mutex<VecDeque<SessionEvent>>,
    subscriptions: Mutex<HashSet<u32>>,
    items: Mutex<HashMap<u32, NodeId>>,
    item_intervals: Mutex<Vec<Duration>>,
    next_subscription_id: AtomicU32,
    next_item_id: AtomicU32,
}

/// A clonable scripted session. Clones share state, so a test can keep a
/// control handle while the runtime owns the session.
#[derive(Clone, Default)]
pub(crate) struct ScriptedSession {
    inner: Arc<Inner>,
}

impl ScriptedSession {
    /// A session that connects and probes successfully.
    pub fn healthy() -> Self {
        Self::default()
    }

    /// Makes every subsequent connect fail authentication.
    pub fn fail_connect_with_auth(&self) {
        self.inner.fail_connect_auth.store(true, Ordering::SeqCst);
    }

    /// Injects `n` wire failures into upcoming reads.
    pub fn fail_next_reads(&self, n: u32) {
        self.inner.fail_reads.store(n, Ordering::SeqCst);
    }

    /// Injects `n` wire failures into upcoming writes.
    pub fn fail_next_writes(&self, n: u32) {
        self.inner.fail_writes.store(n, Ordering::SeqCst);
    }

    /// Adds artificial latency to every read; `None` removes it.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.inner.read_delay.lock() = delay;
    }

    /// Seeds the server-side value of a node.
    pub fn set_value(&self, node_id: NodeId, value: WireValue) {
        self.inner.values.lock().insert(node_id, value);
    }

    /// Returns every write performed against the session.
    pub fn writes(&self) -> Vec<(NodeId, WireValue)> {
        self.inner.writes.lock().clone()
    }

    /// Returns the monitored item id registered for a node, if any.
    pub fn item_for_node(&self, node_id: &NodeId) -> Option<u32> {
        self.inner
            .items
            .lock()
            .iter()
            .find(|(_, n)| *n == node_id)
            .map(|(id, _)| *id)
    }

    /// Returns the ids of live subscriptions.
    pub fn live_subscriptions(&self) -> Vec<u32> {
        self.inner.subscriptions.lock().iter().copied().collect()
    }

    /// Returns the sampling interval of every monitored item created,
    /// in creation order.
    pub fn item_sampling_intervals(&self) -> Vec<Duration> {
        self.inner.item_intervals.lock().clone()
    }

    /// Queues a data-change notification for the next iterate call.
    pub fn push_notification(
        &self,
        subscription_id: u32,
        monitored_item_id: u32,
        value: WireValue,
        status_code: u32,
    ) {
        self.inner
            .pending
            .lock()
            .push_back(SessionEvent::Notification(ValueNotification {
                subscription_id,
                monitored_item_id,
                value,
                status_code,
                server_timestamp: Some(Utc::now()),
                source_timestamp: None,
            }));
    }

    /// Queues a notification for the item currently attached to `node_id`.
    pub fn push_value_for_node(&self, node_id: &NodeId, value: WireValue) {
        let item = self
            .item_for_node(node_id)
            .expect("node has no monitored item");
        let subscription = *self
            .inner
            .subscriptions
            .lock()
            .iter()
            .next()
            .expect("no live subscription");
        self.push_notification(subscription, item, value, status::GOOD);
    }

    /// Simulates the server deleting a subscription: all its items vanish
    /// and the deletion callback is queued.
    pub fn drop_subscription(&self, subscription_id: u32) {
        self.inner.subscriptions.lock().remove(&subscription_id);
        self.inner.items.lock().clear();
        self.inner
            .pending
            .lock()
            .push_back(SessionEvent::SubscriptionDropped { subscription_id });
    }

    fn ensure_connected(&self) -> ConnectionResult<()> {
        if self.inner.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected)
        }
    }

    fn take_read_failure(&self) -> bool {
        self.inner
            .fail_reads
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

    fn take_write_failure(&self) -> bool {
        self.inner
            .fail_writes
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
impl UaSession for ScriptedSession {
    async fn connect(&mut self, _endpoint: &str, _identity: &Identity) -> ConnectionResult<()> {
        if self.inner.fail_connect_auth.load(Ordering::SeqCst) {
            return Err(ConnectionError::auth_failed("identity token rejected"));
        }
        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> ConnectionResult<()> {
        self.inner.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn read_value(&mut self, node_id: &NodeId) -> ConnectionResult<ReadOutcome> {
        self.ensure_connected()?;
        let delay = *self.inner.read_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.take_read_failure() {
            return Err(ConnectionError::session_closed("injected wire failure"));
        }
        if *node_id == NodeId::SERVER_TIME {
            return Ok(ReadOutcome::good(
                node_id.clone(),
                WireValue::DateTime(Utc::now()),
            ));
        }
        match self.inner.values.lock().get(node_id) {
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
        if self.take_write_failure() {
            return Err(ConnectionError::session_closed("injected wire failure"));
        }
        self.inner
            .values
            .lock()
            .insert(node_id.clone(), value.clone());
        self.inner.writes.lock().push((node_id.clone(), value));
        Ok(WriteOutcome::good(node_id.clone()))
    }

    async fn browse(&mut self, node_id: &NodeId) -> ConnectionResult<Vec<BrowseRef>> {
        self.ensure_connected()?;
        Ok(vec![BrowseRef {
            node_id: node_id.clone(),
            browse_name: "Child".to_string(),
            display_name: "Child".to_string(),
            is_variable: true,
        }])
    }

    async fn create_subscription(
        &mut self,
        _config: &SubscriptionConfig,
    ) -> ConnectionResult<u32> {
        self.ensure_connected()?;
        let id = self.inner.next_subscription_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.subscriptions.lock().insert(id);
        Ok(id)
    }

    async fn delete_subscription(&mut self, subscription_id: u32) -> ConnectionResult<()> {
        self.inner.subscriptions.lock().remove(&subscription_id);
        self.inner.items.lock().clear();
        Ok(())
    }

    async fn create_monitored_item(
        &mut self,
        subscription_id: u32,
        node_id: &NodeId,
        config: &MonitoredItemConfig,
    ) -> ConnectionResult<u32> {
        self.ensure_connected()?;
        if !self.inner.subscriptions.lock().contains(&subscription_id) {
            return Err(ConnectionError::session_closed("unknown subscription"));
        }
        let id = self.inner.next_item_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.items.lock().insert(id, node_id.clone());
        self.inner
            .item_intervals
            .lock()
            .push(config.sampling_interval);
        Ok(id)
    }

    async fn delete_monitored_items(
        &mut self,
        _subscription_id: u32,
        item_ids: &[u32],
    ) -> ConnectionResult<()> {
        let mut items = self.inner.items.lock();
        for id in item_ids {
            items.remove(id);
        }
        Ok(())
    }

    async fn iterate(&mut self, _budget: Duration) -> ConnectionResult<Vec<SessionEvent>> {
        self.ensure_connected()?;
        Ok(self.inner.pending.lock().drain(..).collect())
    }
}
