// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The client runtime facade.
//!
//! [`OpcUaClient`] wires the supervisor, registry, pipeline, and
//! subscription engine together behind one API surface. Consumers never
//! touch the network: they register definitions, submit requests, and
//! subscribe to the event plane.
//!
//! # Example
//!
//! ```rust,ignore
//! use argus_opcua::client::{ClientConfig, OpcUaClient};
//! use argus_opcua::subscription::SubscriptionMode;
//! use argus_opcua::transport::Identity;
//! use argus_core::variable::VariableDefinition;
//!
//! let client = OpcUaClient::new(session, ClientConfig::default());
//! client.connect("opc.tcp://plc:4840", Identity::Anonymous).await?;
//!
//! client.register(VariableDefinition::builder("T1", "ns=2;s=Line1.Temp").build()?)?;
//! client.start_subscription(SubscriptionMode::Monitored).await?;
//!
//! let mut events = client.subscribe_events();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use argus_core::diagnostics::{ErrorRecord, ErrorRing, RuntimeStats};
use argus_core::error::{ConfigError, RuntimeError, RuntimeResult};
use argus_core::event::{EventBus, RuntimeEvent};
use argus_core::policy::{
    EngineConfig, MonitoredItemConfig, PipelineConfig, ReconnectPolicy, SubscriptionConfig,
};
use argus_core::types::{ConnectionState, Sample, TagId, Value};
use argus_core::variable::VariableDefinition;

use crate::pipeline::{BatchWriteResult, RequestPipeline};
use crate::registry::{VariableHandle, VariableRegistry};
use crate::subscription::{SubscriptionEngine, SubscriptionMode};
use crate::supervisor::ConnectionSupervisor;
use crate::transport::{Identity, UaSession};

// =============================================================================
// ClientConfig
// =============================================================================

/// Top-level configuration for the client runtime.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Reconnect and keepalive policy.
    pub reconnect: ReconnectPolicy,

    /// Worker pool and queue sizing.
    pub pipeline: PipelineConfig,

    /// Engine cadences and executor sizing.
    pub engine: EngineConfig,

    /// Event bus capacity (0 selects the default).
    pub event_capacity: usize,

    /// Last-errors ring capacity (0 selects the default).
    pub error_ring_capacity: usize,
}

impl ClientConfig {
    /// Validates every nested policy.
    pub fn validate(&self) -> RuntimeResult<()> {
        self.reconnect.validate()?;
        self.pipeline.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

// =============================================================================
// OpcUaClient
// =============================================================================

/// The connection and variable runtime for one OPC UA server.
pub struct OpcUaClient<S: UaSession + 'static> {
    supervisor: Arc<ConnectionSupervisor<S>>,
    registry: Arc<VariableRegistry>,
    pipeline: Arc<RequestPipeline<S>>,
    engine: Arc<SubscriptionEngine<S>>,
    events: Arc<EventBus>,
    stats: Arc<RuntimeStats>,
    errors: Arc<ErrorRing>,
}

impl<S: UaSession + 'static> OpcUaClient<S> {
    /// Builds the runtime around a session implementation.
    pub fn new(session: S, config: ClientConfig) -> Self {
        let events = Arc::new(EventBus::new(if config.event_capacity == 0 {
            1024
        } else {
            config.event_capacity
        }));
        let stats = Arc::new(RuntimeStats::new());
        let errors = Arc::new(ErrorRing::new(if config.error_ring_capacity == 0 {
            ErrorRing::DEFAULT_CAPACITY
        } else {
            config.error_ring_capacity
        }));
        let registry = Arc::new(VariableRegistry::new());

        let supervisor = ConnectionSupervisor::new(
            session,
            config.reconnect,
            Arc::clone(&events),
            Arc::clone(&stats),
            Arc::clone(&errors),
        );
        let pipeline = Arc::new(RequestPipeline::new(
            Arc::clone(&supervisor),
            Arc::clone(&registry),
            Arc::clone(&events),
            Arc::clone(&stats),
            Arc::clone(&errors),
            config.pipeline,
        ));
        let engine = SubscriptionEngine::new(
            Arc::clone(&supervisor),
            Arc::clone(&registry),
            Arc::clone(&pipeline),
            Arc::clone(&events),
            Arc::clone(&stats),
            Arc::clone(&errors),
            config.engine,
        );

        Self {
            supervisor,
            registry,
            pipeline,
            engine,
            events,
            stats,
            errors,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects to the server.
    pub async fn connect(
        &self,
        endpoint: impl Into<String>,
        identity: Identity,
    ) -> RuntimeResult<()> {
        self.supervisor.connect(endpoint, identity).await?;
        Ok(())
    }

    /// Disconnects from the server.
    pub async fn disconnect(&self) -> RuntimeResult<()> {
        self.engine.stop().await;
        self.supervisor.disconnect().await?;
        Ok(())
    }

    /// Forces a disconnect/connect cycle against the stored endpoint.
    pub async fn reconnect(&self) -> RuntimeResult<()> {
        self.supervisor.reconnect().await?;
        Ok(())
    }

    /// Returns the connection state.
    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Replaces the reconnect policy.
    pub fn set_reconnect_policy(&self, policy: ReconnectPolicy) -> RuntimeResult<()> {
        policy.validate()?;
        self.supervisor.set_policy(policy);
        Ok(())
    }

    /// Replaces the subscription configuration (applies on next build).
    pub fn set_subscription_config(&self, config: SubscriptionConfig) -> RuntimeResult<()> {
        config.validate()?;
        self.engine.set_subscription_config(config);
        Ok(())
    }

    /// Replaces the monitored-item configuration (applies on next build).
    pub fn set_monitored_item_config(&self, config: MonitoredItemConfig) {
        self.engine.set_item_config(config);
    }

    /// Replaces the request timeout for wire operations.
    pub fn set_request_timeout(&self, timeout: Duration) -> RuntimeResult<()> {
        if timeout.is_zero() {
            return Err(ConfigError::validation(
                "request_timeout",
                "request timeout must be greater than zero",
            )
            .into());
        }
        self.pipeline.set_request_timeout(timeout);
        Ok(())
    }

    /// Resizes the pipeline worker pool (clamped to 1-20).
    pub fn set_max_threads(&self, workers: usize) {
        self.pipeline.set_workers(workers);
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Registers one variable definition.
    ///
    /// When monitored mode is live, a monitored item is created for the
    /// new variable immediately.
    pub async fn register(&self, def: VariableDefinition) -> RuntimeResult<()> {
        let handle = self.registry.register(def)?;
        if self.engine.mode() == Some(SubscriptionMode::Monitored) {
            self.engine.add_item(handle.tag()).await?;
        }
        Ok(())
    }

    /// Registers many definitions, stopping at the first failure.
    ///
    /// Definitions registered before the failure stay registered.
    pub async fn register_many(
        &self,
        defs: impl IntoIterator<Item = VariableDefinition>,
    ) -> RuntimeResult<usize> {
        let mut registered = 0;
        for def in defs {
            self.register(def).await?;
            registered += 1;
        }
        Ok(registered)
    }

    /// Unregisters a tag.
    ///
    /// A live monitored item is deleted first, so a subscribed handle is
    /// never destroyed with its item still attached.
    pub async fn unregister(&self, tag: &TagId) -> RuntimeResult<()> {
        if self.registry.get(tag).is_none() {
            return Err(ConfigError::unknown_tag(tag.as_str()).into());
        }
        self.engine.remove_item(tag).await?;
        self.registry.remove(tag);
        Ok(())
    }

    /// Unregisters every tag.
    pub async fn clear(&self) -> RuntimeResult<()> {
        for tag in self.registry.list_tags() {
            self.engine.remove_item(&tag).await?;
        }
        self.registry.clear();
        Ok(())
    }

    /// Returns the handle for a tag.
    pub fn get(&self, tag: &TagId) -> Option<Arc<VariableHandle>> {
        self.registry.get(tag)
    }

    /// Returns the latest sample for a tag.
    pub fn latest(&self, tag: &TagId) -> Option<Sample> {
        self.registry.get(tag).map(|handle| handle.latest())
    }

    /// Returns every registered tag.
    pub fn list_tags(&self) -> Vec<TagId> {
        self.registry.list_tags()
    }

    // =========================================================================
    // I/O
    // =========================================================================

    /// Submits an async read; the completion arrives on the event plane
    /// keyed by the returned id.
    pub fn read_async(&self, tag: TagId) -> RuntimeResult<u64> {
        self.pipeline.read_async(tag)
    }

    /// Submits an async batch read of every registered tag.
    pub fn read_all_async(&self) -> RuntimeResult<u64> {
        self.pipeline.read_all_async()
    }

    /// Submits an async write.
    pub fn write_async(&self, tag: TagId, value: Value) -> RuntimeResult<u64> {
        self.pipeline.write_async(tag, value)
    }

    /// Submits an async browse of one tag's node.
    pub fn browse_async(&self, tag: TagId) -> RuntimeResult<u64> {
        self.pipeline.browse_async(tag)
    }

    /// Reads one tag, waiting up to `timeout`.
    pub async fn read_sync(&self, tag: TagId, timeout: Duration) -> RuntimeResult<Value> {
        self.pipeline.read_sync(tag, timeout).await
    }

    /// Writes one tag, waiting up to `timeout`.
    pub async fn write_sync(
        &self,
        tag: TagId,
        value: Value,
        timeout: Duration,
    ) -> RuntimeResult<()> {
        self.pipeline.write_sync(tag, value, timeout).await
    }

    /// Reads a set of tags as one batch, returning the per-tag map.
    pub async fn batch_read(
        &self,
        tags: Vec<TagId>,
        timeout: Duration,
    ) -> RuntimeResult<HashMap<TagId, Result<Value, RuntimeError>>> {
        self.pipeline.batch_read(tags, timeout).await
    }

    /// Writes a set of tags as one batch; partial success is failure.
    pub async fn batch_write(
        &self,
        values: Vec<(TagId, Value)>,
        timeout: Duration,
    ) -> RuntimeResult<BatchWriteResult> {
        self.pipeline.batch_write(values, timeout).await
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Starts the subscription engine in the given mode.
    pub async fn start_subscription(&self, mode: SubscriptionMode) -> RuntimeResult<()> {
        self.engine.start(mode).await
    }

    /// Stops the subscription engine.
    pub async fn stop_subscription(&self) {
        self.engine.stop().await
    }

    /// Adjusts the polling-mode cadence.
    pub fn set_polling_interval(&self, interval: Duration) {
        self.engine.set_polling_interval(interval);
    }

    /// Returns the active subscription mode, if any.
    pub fn subscription_mode(&self) -> Option<SubscriptionMode> {
        self.engine.mode()
    }

    // =========================================================================
    // Events & diagnostics
    // =========================================================================

    /// Subscribes to the runtime event plane.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events.subscribe()
    }

    /// Returns a snapshot of the last-errors ring, oldest first.
    pub fn last_errors(&self) -> Vec<ErrorRecord> {
        self.errors.snapshot()
    }

    /// Returns the runtime statistics counters.
    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Two-phase teardown.
    ///
    /// Phase one stops accepting new work and drains the worker pool
    /// with a short bound; phase two stops the subscription driver,
    /// deletes the subscription, closes the session, and clears the
    /// handles.
    pub async fn shutdown(&self, drain: Duration) {
        self.pipeline.shutdown(drain).await;

        self.engine.stop().await;
        self.engine.shutdown_executors();
        let _ = self.supervisor.disconnect().await;
        self.supervisor.stop_tasks();
        self.registry.clear();
        info!("client runtime shut down");
    }
}

impl<S: UaSession + 'static> std::fmt::Debug for OpcUaClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcUaClient")
            .field("state", &self.state())
            .field("tags", &self.registry.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireValue;
    use crate::testing::ScriptedSession;
    use argus_core::error::ConnectionError;
    use argus_core::variable::VariableKind;

    fn client() -> (OpcUaClient<ScriptedSession>, ScriptedSession) {
        let session = ScriptedSession::healthy();
        let control = session.clone();
        let config = ClientConfig {
            reconnect: ReconnectPolicy {
                keepalive_interval: Duration::from_secs(60),
                ..Default::default()
            },
            pipeline: PipelineConfig {
                request_timeout: Duration::from_millis(500),
                ..Default::default()
            },
            engine: EngineConfig {
                iterate_interval: Duration::from_millis(10),
                rebuild_debounce: Duration::from_millis(40),
                executors: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        (OpcUaClient::new(session, config), control)
    }

    fn def(tag: &str, writable: bool) -> VariableDefinition {
        VariableDefinition::builder(tag, format!("ns=2;s={}", tag))
            .kind(VariableKind::Ai)
            .writable(writable)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_before_connect_then_read() {
        let (client, control) = client();
        client.register(def("T1", false)).await.unwrap();
        control.set_value("ns=2;s=T1".parse().unwrap(), WireValue::Float(1.5));

        // Not connected: pipeline fails fast.
        let err = client
            .read_sync(TagId::new("T1"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Connection(ConnectionError::NotConnected)
        ));

        client
            .connect("opc.tcp://127.0.0.1:49320", Identity::Anonymous)
            .await
            .unwrap();
        let value = client
            .read_sync(TagId::new("T1"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(value, Value::Float32(1.5));

        client.shutdown(Duration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn test_register_while_monitored_adds_item() {
        let (client, _control) = client();
        client
            .connect("opc.tcp://127.0.0.1:49320", Identity::Anonymous)
            .await
            .unwrap();
        client.register(def("T1", false)).await.unwrap();
        client
            .start_subscription(SubscriptionMode::Monitored)
            .await
            .unwrap();

        client.register(def("T2", false)).await.unwrap();
        assert!(client.get(&TagId::new("T2")).unwrap().is_subscribed());

        client.shutdown(Duration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn test_unregister_removes_item_first() {
        let (client, control) = client();
        client
            .connect("opc.tcp://127.0.0.1:49320", Identity::Anonymous)
            .await
            .unwrap();
        client.register(def("T1", false)).await.unwrap();
        client
            .start_subscription(SubscriptionMode::Monitored)
            .await
            .unwrap();

        let node = client.get(&TagId::new("T1")).unwrap().node_id().clone();
        assert!(control.item_for_node(&node).is_some());

        client.unregister(&TagId::new("T1")).await.unwrap();
        assert!(control.item_for_node(&node).is_none());
        assert!(client.get(&TagId::new("T1")).is_none());

        // Unknown afterwards.
        assert!(client.unregister(&TagId::new("T1")).await.is_err());

        client.shutdown(Duration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn test_latest_and_list_tags() {
        let (client, _control) = client();
        client.register(def("T1", false)).await.unwrap();
        client.register(def("T2", false)).await.unwrap();

        let mut tags = client.list_tags();
        tags.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(tags, vec![TagId::new("T1"), TagId::new("T2")]);

        let sample = client.latest(&TagId::new("T1")).unwrap();
        assert!(!sample.is_good()); // CommFail until the first update

        client.clear().await.unwrap();
        assert!(client.list_tags().is_empty());
    }

    #[tokio::test]
    async fn test_config_setters_validate() {
        let (client, _control) = client();

        assert!(client.set_request_timeout(Duration::ZERO).is_err());
        assert!(client.set_request_timeout(Duration::from_secs(5)).is_ok());

        let bad_policy = ReconnectPolicy {
            multiplier: 0.1,
            ..Default::default()
        };
        assert!(client.set_reconnect_policy(bad_policy).is_err());

        let bad_subscription = SubscriptionConfig {
            lifetime_count: 1,
            max_keepalive_count: 10,
            ..Default::default()
        };
        assert!(client.set_subscription_config(bad_subscription).is_err());

        client.set_max_threads(50);
        // Clamped to the supported maximum.
        client.set_max_threads(2);
    }

    #[tokio::test]
    async fn test_write_failure_lands_in_error_ring() {
        let (client, control) = client();
        client
            .connect("opc.tcp://127.0.0.1:49320", Identity::Anonymous)
            .await
            .unwrap();
        client.register(def("SP", true)).await.unwrap();

        control.fail_next_writes(1);
        let err = client
            .write_sync(TagId::new("SP"), Value::Int32(1), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let errors = client.last_errors();
        assert!(!errors.is_empty());
        assert_eq!(errors.last().unwrap().category, "connection");

        client.shutdown(Duration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn test_stats_observe_traffic() {
        let (client, control) = client();
        client
            .connect("opc.tcp://127.0.0.1:49320", Identity::Anonymous)
            .await
            .unwrap();
        client.register(def("T1", true)).await.unwrap();
        control.set_value("ns=2;s=T1".parse().unwrap(), WireValue::Int32(9));

        client
            .read_sync(TagId::new("T1"), Duration::from_secs(1))
            .await
            .unwrap();
        client
            .write_sync(TagId::new("T1"), Value::Int32(10), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(client.stats().reads().0, 1);
        assert_eq!(client.stats().writes().0, 1);
        assert_eq!(client.stats().connects(), 1);
        assert!(client.stats().last_connect().is_some());
        assert_eq!(client.stats().last_disconnect(), None);

        client.shutdown(Duration::from_millis(200)).await;
        assert!(client.stats().last_disconnect().is_some());
    }

    #[tokio::test]
    async fn test_shutdown_is_two_phase() {
        let (client, _control) = client();
        client
            .connect("opc.tcp://127.0.0.1:49320", Identity::Anonymous)
            .await
            .unwrap();
        client.register(def("T1", false)).await.unwrap();
        client
            .start_subscription(SubscriptionMode::Monitored)
            .await
            .unwrap();

        client.shutdown(Duration::from_millis(200)).await;

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.list_tags().is_empty());
        assert!(client.read_async(TagId::new("T1")).is_err());
    }
}
