// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The subscription engine.
//!
//! Two exclusive modes deliver value changes to consumers:
//!
//! - **Monitored**: one server-side subscription with one monitored item
//!   per registered variable. A single-threaded cooperative driver calls
//!   the session's iterate routine on a fixed cadence; delivered
//!   notifications are validated, copied, and dispatched by stable tag
//!   hash to a small fixed pool of single-worker executors. Per-tag
//!   order is preserved while unrelated tags process in parallel.
//! - **Polling**: a periodic task submits a batch read of every
//!   registered tag through the request pipeline and routes the results
//!   into the same executors, so deadband and alarm semantics are
//!   uniform across both modes.
//!
//! If the server deletes the subscription (timeout or administrative),
//! the engine clears all handle linkage and schedules a rebuild after a
//! short debounce, provided the connection is still up. The same path
//! re-establishes the subscription after a reconnect.
//!
//! Executors carry the tag key between hops, not a handle pointer: the
//! handle is re-looked-up under the registry read lock immediately
//! before mutation, so a concurrent unregister is always safe.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use argus_core::diagnostics::{ErrorRing, RuntimeStats};
use argus_core::error::{ConfigError, ConnectionError, RuntimeResult};
use argus_core::event::{EventBus, RuntimeEvent};
use argus_core::policy::{EngineConfig, MonitoredItemConfig, SubscriptionConfig};
use argus_core::types::{AlarmLevel, Quality, Sample, TagId, Value};

use crate::codec::{self, quality_from_status, WireValue};
use crate::pipeline::RequestPipeline;
use crate::registry::VariableRegistry;
use crate::supervisor::ConnectionSupervisor;
use crate::transport::{SessionEvent, UaSession};

// =============================================================================
// Mode
// =============================================================================

/// Delivery mode of the subscription engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// Pull: periodic batch reads through the pipeline.
    Polling,

    /// Push: server-side subscription with monitored items.
    Monitored,
}

impl std::fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionMode::Polling => write!(f, "Polling"),
            SubscriptionMode::Monitored => write!(f, "Monitored"),
        }
    }
}

// =============================================================================
// Ingest jobs
// =============================================================================

/// Value payload of one ingest job.
enum JobValue {
    /// Raw wire value from a monitored-item notification.
    Wire(WireValue),

    /// Already-decoded value from the polling path.
    Native(Value),
}

/// One (tag, value) hop dispatched to an executor.
struct IngestJob {
    tag: TagId,
    value: JobValue,
    quality: Quality,
    timestamp: DateTime<Utc>,
    /// Whether the executor owns the `latest` update (monitored path) or
    /// the pipeline already stored it (polling path).
    store_latest: bool,
}

/// Per-tag state kept inside one executor. Tags are stably partitioned
/// across executors, so this state needs no lock.
#[derive(Default)]
struct IngestState {
    last_value: Option<Value>,
    last_alarm: AlarmLevel,
}

// =============================================================================
// SubscriptionEngine
// =============================================================================

/// Owns subscription state and the ingest executor pool.
pub struct SubscriptionEngine<S: UaSession + 'static> {
    supervisor: Arc<ConnectionSupervisor<S>>,
    registry: Arc<VariableRegistry>,
    pipeline: Arc<RequestPipeline<S>>,
    events: Arc<EventBus>,
    stats: Arc<RuntimeStats>,
    errors: Arc<ErrorRing>,

    subscription_config: RwLock<SubscriptionConfig>,
    item_config: RwLock<MonitoredItemConfig>,
    engine_config: RwLock<EngineConfig>,

    mode: Mutex<Option<SubscriptionMode>>,
    subscription_id: AtomicU32,
    item_map: Mutex<HashMap<u32, TagId>>,
    rebuild_pending: AtomicBool,

    executors: Vec<mpsc::UnboundedSender<IngestJob>>,
    executor_tasks: Mutex<Vec<JoinHandle<()>>>,
    driver_task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: UaSession + 'static> SubscriptionEngine<S> {
    /// Creates the engine and spawns its executor pool.
    pub fn new(
        supervisor: Arc<ConnectionSupervisor<S>>,
        registry: Arc<VariableRegistry>,
        pipeline: Arc<RequestPipeline<S>>,
        events: Arc<EventBus>,
        stats: Arc<RuntimeStats>,
        errors: Arc<ErrorRing>,
        engine_config: EngineConfig,
    ) -> Arc<Self> {
        let executor_count = engine_config.resolved_executors();
        let mut executors = Vec::with_capacity(executor_count);
        let mut executor_tasks = Vec::with_capacity(executor_count);

        for _ in 0..executor_count {
            let (tx, mut rx) = mpsc::unbounded_channel::<IngestJob>();
            let registry = Arc::clone(&registry);
            let events = Arc::clone(&events);
            let stats = Arc::clone(&stats);
            executor_tasks.push(tokio::spawn(async move {
                let mut states: HashMap<TagId, IngestState> = HashMap::new();
                while let Some(job) = rx.recv().await {
                    let state = states.entry(job.tag.clone()).or_default();
                    Self::run_job(&registry, &events, &stats, state, job);
                }
            }));
            executors.push(tx);
        }

        Arc::new(Self {
            supervisor,
            registry,
            pipeline,
            events,
            stats,
            errors,
            subscription_config: RwLock::new(SubscriptionConfig::default()),
            item_config: RwLock::new(MonitoredItemConfig::default()),
            engine_config: RwLock::new(engine_config),
            mode: Mutex::new(None),
            subscription_id: AtomicU32::new(0),
            item_map: Mutex::new(HashMap::new()),
            rebuild_pending: AtomicBool::new(false),
            executors,
            executor_tasks: Mutex::new(executor_tasks),
            driver_task: Mutex::new(None),
        })
    }

    /// Returns the active mode, if any.
    pub fn mode(&self) -> Option<SubscriptionMode> {
        *self.mode.lock()
    }

    /// Returns the live server-side subscription id, if any.
    pub fn subscription_id(&self) -> Option<u32> {
        match self.subscription_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    /// Replaces the subscription configuration (used on next build).
    pub fn set_subscription_config(&self, config: SubscriptionConfig) {
        *self.subscription_config.write() = config;
    }

    /// Replaces the monitored-item configuration (used on next build).
    pub fn set_item_config(&self, config: MonitoredItemConfig) {
        *self.item_config.write() = config;
    }

    /// Adjusts the polling cadence; takes effect on the next tick cycle.
    pub fn set_polling_interval(&self, interval: std::time::Duration) {
        self.engine_config.write().polling_interval = interval;
    }

    // =========================================================================
    // Start / stop
    // =========================================================================

    /// Starts the engine in the given mode.
    ///
    /// Modes are exclusive: starting while active is an error; stop
    /// first. Polling mode never creates a server-side subscription.
    pub async fn start(self: &Arc<Self>, mode: SubscriptionMode) -> RuntimeResult<()> {
        {
            let mut active = self.mode.lock();
            if let Some(current) = *active {
                return Err(ConfigError::validation(
                    "subscription",
                    format!("engine already active in {} mode", current),
                )
                .into());
            }
            *active = Some(mode);
        }

        if !self.supervisor.is_connected() {
            *self.mode.lock() = None;
            return Err(ConnectionError::NotConnected.into());
        }

        let result = match mode {
            SubscriptionMode::Monitored => {
                self.subscription_config.read().validate()?;
                match self.build_subscription().await {
                    Ok(count) => {
                        info!(items = count, "monitored subscription established");
                        self.spawn_iterate_driver();
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            SubscriptionMode::Polling => {
                self.spawn_polling_driver();
                Ok(())
            }
        };

        if result.is_err() {
            *self.mode.lock() = None;
        }
        result
    }

    /// Stops the engine: tears down the driver and, in monitored mode,
    /// deletes the server-side subscription.
    pub async fn stop(&self) {
        let was = self.mode.lock().take();
        if let Some(handle) = self.driver_task.lock().take() {
            handle.abort();
        }

        let subscription_id = self.subscription_id.swap(0, Ordering::AcqRel);
        if subscription_id != 0 {
            let session = self.supervisor.session();
            let mut session = session.lock().await;
            if let Err(e) = session.delete_subscription(subscription_id).await {
                debug!(error = %e, "subscription delete during stop failed");
            }
        }
        self.clear_linkage();
        self.rebuild_pending.store(false, Ordering::Release);

        if was.is_some() {
            info!(mode = ?was, "subscription engine stopped");
        }
    }

    /// Shuts down the executor pool. Called once at runtime teardown,
    /// after [`stop`](Self::stop).
    pub fn shutdown_executors(&self) {
        for handle in self.executor_tasks.lock().drain(..) {
            handle.abort();
        }
    }

    // =========================================================================
    // Item management (registry coupling)
    // =========================================================================

    /// Creates a monitored item for a newly registered handle when
    /// monitored mode is live.
    pub async fn add_item(&self, tag: &TagId) -> RuntimeResult<()> {
        let Some(subscription_id) = self.subscription_id() else {
            return Ok(());
        };
        let Some(handle) = self.registry.get(tag) else {
            return Err(ConfigError::unknown_tag(tag.as_str()).into());
        };

        let item_config = self.item_config.read().clamped();
        let session = self.supervisor.session();
        let mut session = session.lock().await;
        let item_id = session
            .create_monitored_item(subscription_id, handle.node_id(), &item_config)
            .await?;
        drop(session);

        handle.set_monitored_item(item_id);
        self.item_map.lock().insert(item_id, tag.clone());
        Ok(())
    }

    /// Deletes the monitored item backing `tag`, if one exists.
    ///
    /// Must run before the registry entry is removed, so a subscribed
    /// handle is never destroyed while its item is live.
    pub async fn remove_item(&self, tag: &TagId) -> RuntimeResult<()> {
        let Some(handle) = self.registry.get(tag) else {
            return Ok(());
        };
        let Some(item_id) = handle.monitored_item_id() else {
            return Ok(());
        };
        let Some(subscription_id) = self.subscription_id() else {
            handle.clear_subscription();
            return Ok(());
        };

        let session = self.supervisor.session();
        let mut session = session.lock().await;
        session
            .delete_monitored_items(subscription_id, &[item_id])
            .await?;
        drop(session);

        handle.clear_subscription();
        self.item_map.lock().remove(&item_id);
        Ok(())
    }

    // =========================================================================
    // Monitored mode internals
    // =========================================================================

    /// Creates the server-side subscription and one monitored item per
    /// registered variable. Returns the item count.
    async fn build_subscription(self: &Arc<Self>) -> RuntimeResult<usize> {
        let subscription_config = self.subscription_config.read().clone();
        // Items are always created from the clamped sampling interval.
        let item_config = self.item_config.read().clamped();
        let handles = self.registry.snapshot();

        let session = self.supervisor.session();
        let mut session = session.lock().await;
        let subscription_id = session.create_subscription(&subscription_config).await?;

        let mut item_map = HashMap::new();
        let mut count = 0usize;
        for handle in &handles {
            match session
                .create_monitored_item(subscription_id, handle.node_id(), &item_config)
                .await
            {
                Ok(item_id) => {
                    handle.set_monitored_item(item_id);
                    item_map.insert(item_id, handle.tag().clone());
                    count += 1;
                }
                Err(e) => {
                    warn!(tag = %handle.tag(), error = %e, "monitored item creation failed");
                    self.errors.record(&e.into());
                }
            }
        }
        drop(session);

        self.subscription_id
            .store(subscription_id, Ordering::Release);
        *self.item_map.lock() = item_map;
        Ok(count)
    }

    /// Spawns the cooperative iterate driver.
    ///
    /// Single-threaded with respect to the session: each tick takes the
    /// session lock, lets the session deliver pending notifications, and
    /// returns promptly. The driver also re-establishes the subscription
    /// after a loss once the connection is back.
    fn spawn_iterate_driver(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let interval = engine.engine_config.read().iterate_interval;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if engine.mode() != Some(SubscriptionMode::Monitored) {
                    return;
                }
                if !engine.supervisor.is_connected() {
                    continue;
                }
                if engine.subscription_id().is_none() {
                    engine.schedule_rebuild();
                    continue;
                }

                let session_events = {
                    let session = engine.supervisor.session();
                    let mut session = session.lock().await;
                    match session.iterate(interval / 2).await {
                        Ok(events) => events,
                        Err(e) => {
                            // Wire trouble is the supervisor's problem;
                            // the driver just skips the tick.
                            debug!(error = %e, "iterate failed");
                            continue;
                        }
                    }
                };

                for event in session_events {
                    engine.handle_session_event(event);
                }
            }
        });
        *self.driver_task.lock() = Some(handle);
    }

    /// The ingest callback: validate, copy, hand off, return promptly.
    /// Never calls back into the session.
    fn handle_session_event(self: &Arc<Self>, event: SessionEvent) {
        match event {
            SessionEvent::Notification(notification) => {
                // Non-Good samples are dropped at the door.
                if !codec::status::is_good(notification.status_code) {
                    self.stats.record_notification_dropped();
                    return;
                }
                let tag = {
                    let items = self.item_map.lock();
                    items.get(&notification.monitored_item_id).cloned()
                };
                let Some(tag) = tag else {
                    debug!(
                        item = notification.monitored_item_id,
                        "notification for unknown monitored item"
                    );
                    self.stats.record_notification_dropped();
                    return;
                };

                self.stats.record_notification();
                // The notification value is an owned deep copy; the
                // session buffer is free to be reused after iterate.
                self.dispatch(IngestJob {
                    tag,
                    value: JobValue::Wire(notification.value),
                    quality: quality_from_status(notification.status_code),
                    timestamp: notification
                        .server_timestamp
                        .or(notification.source_timestamp)
                        .unwrap_or_else(Utc::now),
                    store_latest: true,
                });
            }
            SessionEvent::SubscriptionDropped { subscription_id } => {
                let current = self.subscription_id.load(Ordering::Acquire);
                if current != subscription_id {
                    return;
                }
                warn!(subscription_id, "server deleted the subscription");
                self.subscription_id.store(0, Ordering::Release);
                self.clear_linkage();
                self.events.publish(RuntimeEvent::SubscriptionLost);
                self.schedule_rebuild();
            }
        }
    }

    /// Schedules a debounced subscription rebuild, once.
    fn schedule_rebuild(self: &Arc<Self>) {
        if self.rebuild_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let debounce = engine.engine_config.read().rebuild_debounce;
            tokio::time::sleep(debounce).await;

            let still_monitored = engine.mode() == Some(SubscriptionMode::Monitored);
            if still_monitored && engine.supervisor.is_connected() {
                match engine.build_subscription().await {
                    Ok(item_count) => {
                        info!(items = item_count, "subscription rebuilt");
                        engine
                            .events
                            .publish(RuntimeEvent::SubscriptionRestored { item_count });
                    }
                    Err(e) => {
                        warn!(error = %e, "subscription rebuild failed");
                        engine.errors.record(&e);
                    }
                }
            }
            engine.rebuild_pending.store(false, Ordering::Release);
        });
    }

    /// Clears subscription linkage on every handle.
    fn clear_linkage(&self) {
        for handle in self.registry.snapshot() {
            handle.clear_subscription();
        }
        self.item_map.lock().clear();
    }

    // =========================================================================
    // Polling mode internals
    // =========================================================================

    /// Spawns the polling driver: periodic batch reads through the
    /// pipeline, results routed into the executor pool.
    fn spawn_polling_driver(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let interval = engine.engine_config.read().polling_interval;
                tokio::time::sleep(interval).await;
                if engine.mode() != Some(SubscriptionMode::Polling) {
                    return;
                }
                if !engine.supervisor.is_connected() {
                    continue;
                }

                let tags = engine.registry.list_tags();
                if tags.is_empty() {
                    continue;
                }
                let timeout = engine.pipeline.request_timeout();
                match engine.pipeline.batch_read(tags, timeout).await {
                    Ok(results) => {
                        let now = Utc::now();
                        for (tag, result) in results {
                            if let Ok(value) = result {
                                engine.stats.record_notification();
                                engine.dispatch(IngestJob {
                                    tag,
                                    value: JobValue::Native(value),
                                    quality: Quality::Good,
                                    timestamp: now,
                                    store_latest: false,
                                });
                            }
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "polling batch read failed");
                    }
                }
            }
        });
        *self.driver_task.lock() = Some(handle);
    }

    // =========================================================================
    // Executor pool
    // =========================================================================

    /// Routes a job to its tag's executor. The mapping is a stable hash,
    /// so one tag always lands on the same single-worker executor and
    /// its updates stay serialized.
    fn dispatch(&self, job: IngestJob) {
        let mut hasher = DefaultHasher::new();
        job.tag.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.executors.len();
        if self.executors[index].send(job).is_err() {
            self.stats.record_notification_dropped();
            warn!("ingest executor gone, notification dropped");
        }
    }

    /// Executor body: decode, deadband, update `latest`, alarm edges,
    /// emit the value-change event.
    fn run_job(
        registry: &VariableRegistry,
        events: &EventBus,
        stats: &RuntimeStats,
        state: &mut IngestState,
        job: IngestJob,
    ) {
        // Re-look-up by tag key: the handle may have been unregistered
        // between the hop and now.
        let Some(handle) = registry.get(&job.tag) else {
            debug!(tag = %job.tag, "tag unregistered before ingest");
            return;
        };

        let value = match job.value {
            JobValue::Native(value) => value,
            JobValue::Wire(wire) => match codec::decode(&wire) {
                Ok(value) => value,
                Err(e) => {
                    warn!(tag = %job.tag, error = %e, "undecodable notification");
                    stats.record_notification_dropped();
                    return;
                }
            },
        };

        let def = Arc::clone(handle.definition());

        // Deadband: a change smaller than the threshold is no change.
        if def.deadband > 0.0 {
            if let (Some(prev), Some(next)) = (
                state.last_value.as_ref().and_then(Value::as_f64),
                value.as_f64(),
            ) {
                if (next - prev).abs() < def.deadband {
                    return;
                }
            }
        }

        let alarm_level = value
            .as_f64()
            .map(|v| def.classify_alarm(v))
            .unwrap_or_default();

        if job.store_latest {
            handle.with_latest(|latest| {
                *latest = Sample {
                    value: value.clone(),
                    quality: job.quality,
                    timestamp: job.timestamp,
                    alarm_level,
                };
            });
        }

        let prev_alarm = state.last_alarm;
        state.last_value = Some(value.clone());
        state.last_alarm = alarm_level;

        events.publish(RuntimeEvent::ValueChanged {
            tag: job.tag.clone(),
            value: value.clone(),
            timestamp: job.timestamp,
            quality: job.quality,
        });

        // Exactly one event per alarm edge.
        if alarm_level != prev_alarm {
            if alarm_level.is_active() {
                events.publish(RuntimeEvent::AlarmRaised {
                    tag: job.tag,
                    level: alarm_level,
                    value,
                });
            } else {
                events.publish(RuntimeEvent::AlarmCleared { tag: job.tag });
            }
        }
    }
}

impl<S: UaSession + 'static> std::fmt::Debug for SubscriptionEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionEngine")
            .field("mode", &self.mode())
            .field("subscription_id", &self.subscription_id())
            .field("executors", &self.executors.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSession;
    use crate::transport::Identity;
    use argus_core::policy::{PipelineConfig, ReconnectPolicy};
    use argus_core::variable::{AlarmLimits, VariableDefinition, VariableKind};
    use std::time::Duration;

    struct Harness {
        session: ScriptedSession,
        engine: Arc<SubscriptionEngine<ScriptedSession>>,
        registry: Arc<VariableRegistry>,
        events: Arc<EventBus>,
    }

    async fn harness() -> Harness {
        let session = ScriptedSession::healthy();
        let control = session.clone();
        let events = Arc::new(EventBus::new(1024));
        let stats = Arc::new(RuntimeStats::new());
        let errors = Arc::new(ErrorRing::default());
        let supervisor = ConnectionSupervisor::new(
            session,
            ReconnectPolicy {
                keepalive_interval: Duration::from_secs(60),
                ..Default::default()
            },
            Arc::clone(&events),
            Arc::clone(&stats),
            Arc::clone(&errors),
        );
        supervisor
            .connect("opc.tcp://127.0.0.1:49320", Identity::Anonymous)
            .await
            .unwrap();

        let registry = Arc::new(VariableRegistry::new());
        let pipeline = Arc::new(RequestPipeline::new(
            Arc::clone(&supervisor),
            Arc::clone(&registry),
            Arc::clone(&events),
            Arc::clone(&stats),
            Arc::clone(&errors),
            PipelineConfig {
                request_timeout: Duration::from_millis(500),
                ..Default::default()
            },
        ));
        let engine = SubscriptionEngine::new(
            supervisor,
            Arc::clone(&registry),
            pipeline,
            Arc::clone(&events),
            stats,
            errors,
            EngineConfig {
                iterate_interval: Duration::from_millis(10),
                polling_interval: Duration::from_millis(25),
                rebuild_debounce: Duration::from_millis(40),
                executors: 2,
            },
        );
        Harness {
            session: control,
            engine,
            registry,
            events,
        }
    }

    fn register(h: &Harness, tag: &str, deadband: f64, limits: Option<AlarmLimits>) {
        let mut builder = VariableDefinition::builder(tag, format!("ns=2;s={}", tag))
            .kind(VariableKind::Ai)
            .deadband(deadband);
        if let Some(limits) = limits {
            builder = builder.alarm_limits(limits);
        }
        h.registry.register(builder.build().unwrap()).unwrap();
    }

    async fn recv_value_change(
        rx: &mut tokio::sync::broadcast::Receiver<RuntimeEvent>,
        within: Duration,
    ) -> Option<(TagId, Value, Quality)> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Ok(RuntimeEvent::ValueChanged {
                    tag, value, quality, ..
                })) => return Some((tag, value, quality)),
                Ok(Ok(_)) => continue,
                _ => return None,
            }
        }
    }

    #[tokio::test]
    async fn test_monitored_mode_delivers_change() {
        let h = harness().await;
        register(&h, "T1", 0.0, None);
        let mut rx = h.events.subscribe();

        h.engine.start(SubscriptionMode::Monitored).await.unwrap();
        let handle = h.registry.get(&TagId::new("T1")).unwrap();
        assert!(handle.is_subscribed());
        assert!(handle.monitored_item_id().is_some());

        let node = handle.node_id().clone();
        h.session.push_value_for_node(&node, WireValue::Float(42.0));

        let (tag, value, quality) = recv_value_change(&mut rx, Duration::from_millis(1500))
            .await
            .expect("expected a value change within 1.5s");
        assert_eq!(tag, TagId::new("T1"));
        assert_eq!(value, Value::Float32(42.0));
        assert_eq!(quality, Quality::Good);

        // The handle's latest slot was updated with good quality.
        let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
        while !h.registry.get(&TagId::new("T1")).unwrap().latest().is_good()
            && tokio::time::Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(h.registry.get(&TagId::new("T1")).unwrap().latest().is_good());

        h.engine.stop().await;
    }

    #[tokio::test]
    async fn test_modes_are_exclusive() {
        let h = harness().await;
        h.engine.start(SubscriptionMode::Polling).await.unwrap();
        assert!(h.engine.start(SubscriptionMode::Monitored).await.is_err());
        h.engine.stop().await;
        // After stop the other mode may start.
        h.engine.start(SubscriptionMode::Monitored).await.unwrap();
        h.engine.stop().await;
    }

    #[tokio::test]
    async fn test_polling_mode_creates_no_server_subscription() {
        let h = harness().await;
        register(&h, "T1", 0.0, None);
        h.session
            .set_value("ns=2;s=T1".parse().unwrap(), WireValue::Int32(5));
        let mut rx = h.events.subscribe();

        h.engine.start(SubscriptionMode::Polling).await.unwrap();
        assert!(h.session.live_subscriptions().is_empty());
        assert_eq!(h.engine.subscription_id(), None);

        let (tag, value, _) = recv_value_change(&mut rx, Duration::from_millis(1000))
            .await
            .expect("polling should deliver a value change");
        assert_eq!(tag, TagId::new("T1"));
        assert_eq!(value, Value::Int32(5));

        h.engine.stop().await;
    }

    #[tokio::test]
    async fn test_deadband_suppression() {
        let h = harness().await;
        register(&h, "T1", 0.5, None);
        let mut rx = h.events.subscribe();

        h.engine.start(SubscriptionMode::Monitored).await.unwrap();
        let node = h.registry.get(&TagId::new("T1")).unwrap().node_id().clone();

        h.session.push_value_for_node(&node, WireValue::Float(42.0));
        let first = recv_value_change(&mut rx, Duration::from_millis(1000)).await;
        assert_eq!(first.map(|(_, v, _)| v), Some(Value::Float32(42.0)));

        // Within the deadband: suppressed.
        h.session.push_value_for_node(&node, WireValue::Float(42.2));
        assert!(
            recv_value_change(&mut rx, Duration::from_millis(200)).await.is_none(),
            "change inside the deadband must not emit"
        );

        // Outside the deadband: emitted.
        h.session.push_value_for_node(&node, WireValue::Float(42.7));
        let third = recv_value_change(&mut rx, Duration::from_millis(1000)).await;
        assert_eq!(third.map(|(_, v, _)| v), Some(Value::Float32(42.7)));

        h.engine.stop().await;
    }

    #[tokio::test]
    async fn test_alarm_edges_emit_once() {
        let h = harness().await;
        register(&h, "T1", 0.0, Some(AlarmLimits::new(0.0, 10.0, 50.0, 90.0)));
        let mut rx = h.events.subscribe();

        h.engine.start(SubscriptionMode::Monitored).await.unwrap();
        let node = h.registry.get(&TagId::new("T1")).unwrap().node_id().clone();

        // Normal, then cross hi, stay crossed, then return.
        for v in [30.0f32, 55.0, 60.0, 30.0] {
            h.session.push_value_for_node(&node, WireValue::Float(v));
        }

        let mut raised = 0;
        let mut cleared = 0;
        let deadline = tokio::time::Instant::now() + Duration::from_millis(1000);
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
                Ok(Ok(RuntimeEvent::AlarmRaised { level, .. })) => {
                    assert_eq!(level, AlarmLevel::Warning);
                    raised += 1;
                }
                Ok(Ok(RuntimeEvent::AlarmCleared { .. })) => cleared += 1,
                Ok(Ok(_)) => continue,
                _ => break,
            }
        }
        assert_eq!(raised, 1, "crossing hi must raise exactly once");
        assert_eq!(cleared, 1, "returning to band must clear exactly once");

        h.engine.stop().await;
    }

    #[tokio::test]
    async fn test_server_side_deletion_rebuilds() {
        let h = harness().await;
        register(&h, "T1", 0.0, None);
        register(&h, "T2", 0.0, None);
        let mut rx = h.events.subscribe();

        h.engine.start(SubscriptionMode::Monitored).await.unwrap();
        let first_subscription = h.engine.subscription_id().unwrap();

        h.session.drop_subscription(first_subscription);

        // Lost, then restored with fresh item ids, within the debounce
        // window plus slack.
        let mut saw_lost = false;
        let mut saw_restored = false;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while tokio::time::Instant::now() < deadline && !(saw_lost && saw_restored) {
            match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
                Ok(Ok(RuntimeEvent::SubscriptionLost)) => saw_lost = true,
                Ok(Ok(RuntimeEvent::SubscriptionRestored { item_count })) => {
                    assert_eq!(item_count, 2);
                    saw_restored = true;
                }
                _ => {}
            }
        }
        assert!(saw_lost && saw_restored);

        let rebuilt = h.engine.subscription_id().unwrap();
        assert_ne!(rebuilt, first_subscription);
        for tag in ["T1", "T2"] {
            let handle = h.registry.get(&TagId::new(tag)).unwrap();
            assert!(handle.is_subscribed());
            assert!(handle.monitored_item_id().is_some());
        }

        h.engine.stop().await;
    }

    #[tokio::test]
    async fn test_remove_item_clears_linkage() {
        let h = harness().await;
        register(&h, "T1", 0.0, None);
        h.engine.start(SubscriptionMode::Monitored).await.unwrap();

        let handle = h.registry.get(&TagId::new("T1")).unwrap();
        assert!(handle.is_subscribed());

        h.engine.remove_item(&TagId::new("T1")).await.unwrap();
        assert!(!handle.is_subscribed());
        assert_eq!(handle.monitored_item_id(), None);

        h.engine.stop().await;
    }

    #[tokio::test]
    async fn test_sampling_interval_clamped_at_item_creation() {
        let h = harness().await;
        register(&h, "T1", 0.0, None);
        h.engine.set_item_config(MonitoredItemConfig {
            sampling_interval: Duration::from_millis(10),
            ..Default::default()
        });

        h.engine.start(SubscriptionMode::Monitored).await.unwrap();
        assert_eq!(
            h.session.item_sampling_intervals(),
            vec![MonitoredItemConfig::MIN_SAMPLING]
        );

        // The late-add path clamps the same way, upper bound included.
        h.engine.set_item_config(MonitoredItemConfig {
            sampling_interval: Duration::from_secs(5),
            ..Default::default()
        });
        register(&h, "Late", 0.0, None);
        h.engine.add_item(&TagId::new("Late")).await.unwrap();
        assert_eq!(
            h.session.item_sampling_intervals().last(),
            Some(&MonitoredItemConfig::MAX_SAMPLING)
        );

        h.engine.stop().await;
    }

    #[tokio::test]
    async fn test_add_item_after_start() {
        let h = harness().await;
        h.engine.start(SubscriptionMode::Monitored).await.unwrap();

        register(&h, "Late", 0.0, None);
        h.engine.add_item(&TagId::new("Late")).await.unwrap();
        assert!(h.registry.get(&TagId::new("Late")).unwrap().is_subscribed());

        h.engine.stop().await;
    }

    #[tokio::test]
    async fn test_non_good_notifications_dropped() {
        let h = harness().await;
        register(&h, "T1", 0.0, None);
        let mut rx = h.events.subscribe();

        h.engine.start(SubscriptionMode::Monitored).await.unwrap();
        let handle = h.registry.get(&TagId::new("T1")).unwrap();
        let item = handle.monitored_item_id().unwrap();
        let subscription = h.engine.subscription_id().unwrap();

        h.session.push_notification(
            subscription,
            item,
            WireValue::Float(13.0),
            codec::status::BAD_SENSOR_FAILURE,
        );
        assert!(
            recv_value_change(&mut rx, Duration::from_millis(200)).await.is_none(),
            "non-good notifications must be dropped"
        );

        h.engine.stop().await;
    }
}
