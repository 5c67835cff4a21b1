// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The asynchronous request pipeline.
//!
//! Every external read, write, and browse becomes a [`PendingRequest`]
//! with a fresh monotonic id, enqueued on a bounded queue and processed
//! by a small worker pool. Within one worker operations are serialized;
//! across workers there is no ordering guarantee - callers that need
//! per-tag ordering use the subscription engine.
//!
//! Back-pressure is explicit: a full queue rejects the submission with
//! `Busy` instead of blocking the caller. Synchronous variants register
//! a completion slot keyed by the request id and block on it up to a
//! timeout; a timed-out slot is simply removed, and the late completion
//! no-ops against the absent slot (fire-and-forget semantics).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use argus_core::diagnostics::{ErrorRing, RuntimeStats};
use argus_core::error::{
    CapacityError, ConfigError, ConnectionError, RuntimeError, RuntimeResult,
};
use argus_core::event::{EventBus, RuntimeEvent};
use argus_core::policy::PipelineConfig;
use argus_core::types::{Quality, TagId, Value};

use crate::codec::{self, quality_from_status};
use crate::registry::{VariableHandle, VariableRegistry};
use crate::supervisor::ConnectionSupervisor;
use crate::transport::UaSession;

// =============================================================================
// Requests
// =============================================================================

/// Payload of one pipeline request.
#[derive(Debug, Clone)]
pub enum RequestPayload {
    /// Read one tag.
    ReadSingle {
        /// The tag to read.
        tag: TagId,
    },

    /// Read a set of tags as one request.
    ReadBatch {
        /// The tags to read.
        tags: Vec<TagId>,
    },

    /// Write one tag.
    WriteSingle {
        /// The tag to write.
        tag: TagId,
        /// The value to write.
        value: Value,
    },

    /// Write a set of tags as one request.
    WriteBatch {
        /// Tag/value pairs to write.
        values: Vec<(TagId, Value)>,
    },

    /// Browse the references of one tag's node.
    Browse {
        /// The tag whose node is browsed.
        tag: TagId,
    },
}

impl RequestPayload {
    /// Returns the request kind for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestPayload::ReadSingle { .. } => "read_single",
            RequestPayload::ReadBatch { .. } => "read_batch",
            RequestPayload::WriteSingle { .. } => "write_single",
            RequestPayload::WriteBatch { .. } => "write_batch",
            RequestPayload::Browse { .. } => "browse",
        }
    }
}

/// A request in flight through the pipeline.
#[derive(Debug)]
pub struct PendingRequest {
    /// Monotonic request id.
    pub id: u64,

    /// What to do.
    pub payload: RequestPayload,

    /// When the request was accepted.
    pub submitted_at: Instant,

    /// Deadline after which a still-queued request is expired instead
    /// of executed. Sync submissions set it to their wait timeout.
    pub deadline: Option<Instant>,
}

impl PendingRequest {
    /// Returns `true` if the deadline passed while the request was
    /// still queued.
    fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() > deadline)
    }

    /// Builds the expired completion matching this request's shape.
    fn expired_outcome(&self) -> RequestOutcome {
        let timeout = || -> RuntimeError {
            ConnectionError::timeout(self.submitted_at.elapsed()).into()
        };
        match &self.payload {
            RequestPayload::ReadSingle { tag } => RequestOutcome::Read {
                tag: tag.clone(),
                result: Err(timeout()),
            },
            RequestPayload::ReadBatch { tags } => RequestOutcome::ReadBatch {
                results: tags.iter().map(|t| (t.clone(), Err(timeout()))).collect(),
            },
            RequestPayload::WriteSingle { tag, .. } => RequestOutcome::Write {
                tag: tag.clone(),
                result: Err(timeout()),
            },
            RequestPayload::WriteBatch { values } => RequestOutcome::WriteBatch {
                ok: false,
                diagnostics: values.iter().map(|(t, _)| (t.clone(), timeout())).collect(),
            },
            RequestPayload::Browse { tag } => RequestOutcome::Browse {
                tag: tag.clone(),
                result: Err(timeout()),
            },
        }
    }
}

/// Completion of one request, delivered to sync waiters.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// A single read finished.
    Read {
        /// The tag.
        tag: TagId,
        /// Decoded value or failure.
        result: Result<Value, RuntimeError>,
    },

    /// A batch read finished.
    ReadBatch {
        /// Per-tag results.
        results: HashMap<TagId, Result<Value, RuntimeError>>,
    },

    /// A single write finished.
    Write {
        /// The tag.
        tag: TagId,
        /// Success or failure.
        result: Result<(), RuntimeError>,
    },

    /// A batch write finished.
    WriteBatch {
        /// `true` only if every element succeeded.
        ok: bool,
        /// Per-tag diagnostics for failed elements.
        diagnostics: HashMap<TagId, RuntimeError>,
    },

    /// A browse finished.
    Browse {
        /// The tag.
        tag: TagId,
        /// Number of references found, or the failure.
        result: Result<usize, RuntimeError>,
    },
}

/// Result of a synchronous batch write.
#[derive(Debug, Clone, Default)]
pub struct BatchWriteResult {
    /// `true` only if every element succeeded.
    pub ok: bool,

    /// Per-tag diagnostics for failed elements.
    pub diagnostics: HashMap<TagId, RuntimeError>,
}

// =============================================================================
// Pipeline
// =============================================================================

struct PipelineShared<S: UaSession + 'static> {
    supervisor: Arc<ConnectionSupervisor<S>>,
    registry: Arc<VariableRegistry>,
    events: Arc<EventBus>,
    stats: Arc<RuntimeStats>,
    errors: Arc<ErrorRing>,
    config: PipelineConfig,
    request_timeout: RwLock<Duration>,
    desired_workers: AtomicUsize,
    live_workers: AtomicUsize,
    waiters: Mutex<HashMap<u64, oneshot::Sender<RequestOutcome>>>,
}

impl<S: UaSession + 'static> PipelineShared<S> {
    fn request_timeout(&self) -> Duration {
        *self.request_timeout.read()
    }

    /// One worker deregisters itself when the pool shrank below its
    /// membership.
    fn should_exit(&self) -> bool {
        loop {
            let live = self.live_workers.load(Ordering::Acquire);
            if live <= self.desired_workers.load(Ordering::Acquire) {
                return false;
            }
            if self
                .live_workers
                .compare_exchange(live, live - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }
}

/// The bounded request pipeline and its worker pool.
pub struct RequestPipeline<S: UaSession + 'static> {
    shared: Arc<PipelineShared<S>>,
    queue: Mutex<Option<mpsc::Sender<PendingRequest>>>,
    receiver: Arc<AsyncMutex<mpsc::Receiver<PendingRequest>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
    accepting: AtomicBool,
}

impl<S: UaSession + 'static> RequestPipeline<S> {
    /// Creates the pipeline and spawns its workers.
    pub fn new(
        supervisor: Arc<ConnectionSupervisor<S>>,
        registry: Arc<VariableRegistry>,
        events: Arc<EventBus>,
        stats: Arc<RuntimeStats>,
        errors: Arc<ErrorRing>,
        config: PipelineConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let worker_count = config.clamped_workers();
        let request_timeout = config.request_timeout;
        let shared = Arc::new(PipelineShared {
            supervisor,
            registry,
            events,
            stats,
            errors,
            config,
            request_timeout: RwLock::new(request_timeout),
            desired_workers: AtomicUsize::new(worker_count),
            live_workers: AtomicUsize::new(0),
            waiters: Mutex::new(HashMap::new()),
        });

        let pipeline = Self {
            shared,
            queue: Mutex::new(Some(tx)),
            receiver: Arc::new(AsyncMutex::new(rx)),
            workers: Mutex::new(Vec::with_capacity(worker_count)),
            next_id: AtomicU64::new(0),
            accepting: AtomicBool::new(true),
        };
        for _ in 0..worker_count {
            pipeline.spawn_worker();
        }
        pipeline
    }

    fn spawn_worker(&self) {
        let shared = Arc::clone(&self.shared);
        let receiver = Arc::clone(&self.receiver);
        shared.live_workers.fetch_add(1, Ordering::AcqRel);
        let handle = tokio::spawn(async move {
            loop {
                if shared.should_exit() {
                    break;
                }
                let request = {
                    let mut rx = receiver.lock().await;
                    rx.recv().await
                };
                let Some(request) = request else { break };
                debug!(
                    id = request.id,
                    kind = request.payload.kind(),
                    "processing request"
                );
                Self::process(&shared, request).await;
            }
        });
        self.workers.lock().push(handle);
    }

    /// Returns the active request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.shared.request_timeout()
    }

    /// Replaces the request timeout for subsequent wire operations.
    pub fn set_request_timeout(&self, timeout: Duration) {
        *self.shared.request_timeout.write() = timeout;
    }

    /// Resizes the worker pool, clamped to the supported range.
    ///
    /// Growth spawns workers immediately; shrinkage lets surplus workers
    /// retire after their current request.
    pub fn set_workers(&self, count: usize) {
        let count = count.clamp(PipelineConfig::MIN_WORKERS, PipelineConfig::MAX_WORKERS);
        self.shared.desired_workers.store(count, Ordering::Release);
        while self.shared.live_workers.load(Ordering::Acquire) < count {
            self.spawn_worker();
        }
    }

    /// Returns the desired worker count.
    pub fn workers(&self) -> usize {
        self.shared.desired_workers.load(Ordering::Acquire)
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Allocates the next request id. Strictly monotonically increasing.
    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Enqueues a payload, returning its request id.
    fn submit(&self, payload: RequestPayload) -> RuntimeResult<u64> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(CapacityError::Overload.into());
        }
        let id = self.allocate_id();
        let request = PendingRequest {
            id,
            payload,
            submitted_at: Instant::now(),
            deadline: None,
        };

        let queue = self.queue.lock();
        let Some(sender) = queue.as_ref() else {
            return Err(CapacityError::Overload.into());
        };
        match sender.try_send(request) {
            Ok(()) => Ok(id),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(CapacityError::busy(self.shared.config.queue_capacity).into())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(CapacityError::Overload.into()),
        }
    }

    /// Submits an async read. Completion arrives on the event plane.
    pub fn read_async(&self, tag: TagId) -> RuntimeResult<u64> {
        self.submit(RequestPayload::ReadSingle { tag })
    }

    /// Submits an async batch read of every registered tag.
    pub fn read_all_async(&self) -> RuntimeResult<u64> {
        let tags = self.shared.registry.list_tags();
        self.submit(RequestPayload::ReadBatch { tags })
    }

    /// Submits an async write.
    pub fn write_async(&self, tag: TagId, value: Value) -> RuntimeResult<u64> {
        self.submit(RequestPayload::WriteSingle { tag, value })
    }

    /// Submits an async browse of one tag's node.
    pub fn browse_async(&self, tag: TagId) -> RuntimeResult<u64> {
        self.submit(RequestPayload::Browse { tag })
    }

    /// Registers a waiter slot for `id` before submission completes.
    fn register_waiter(&self, id: u64) -> oneshot::Receiver<RequestOutcome> {
        let (tx, rx) = oneshot::channel();
        self.shared.waiters.lock().insert(id, tx);
        rx
    }

    fn remove_waiter(&self, id: u64) {
        self.shared.waiters.lock().remove(&id);
    }

    /// Submits a payload and waits for its completion up to `timeout`.
    ///
    /// A timeout removes the pending slot and returns `Timeout` without
    /// cancelling the in-flight work; the worker's completion no-ops on
    /// the absent slot.
    async fn submit_and_wait(
        &self,
        payload: RequestPayload,
        timeout: Duration,
    ) -> RuntimeResult<RequestOutcome> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(CapacityError::Overload.into());
        }
        let id = self.allocate_id();
        let rx = self.register_waiter(id);
        let now = Instant::now();
        let request = PendingRequest {
            id,
            payload,
            submitted_at: now,
            deadline: Some(now + timeout),
        };

        let send_result = {
            let queue = self.queue.lock();
            match queue.as_ref() {
                Some(sender) => sender.try_send(request).map_err(|e| match e {
                    mpsc::error::TrySendError::Full(_) => {
                        RuntimeError::from(CapacityError::busy(self.shared.config.queue_capacity))
                    }
                    mpsc::error::TrySendError::Closed(_) => CapacityError::Overload.into(),
                }),
                None => Err(CapacityError::Overload.into()),
            }
        };
        if let Err(e) = send_result {
            self.remove_waiter(id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(RuntimeError::internal("pipeline stopped before completion")),
            Err(_) => {
                self.remove_waiter(id);
                Err(ConnectionError::timeout(timeout).into())
            }
        }
    }

    /// Reads one tag synchronously.
    pub async fn read_sync(&self, tag: TagId, timeout: Duration) -> RuntimeResult<Value> {
        match self
            .submit_and_wait(RequestPayload::ReadSingle { tag }, timeout)
            .await?
        {
            RequestOutcome::Read { result, .. } => result,
            other => Err(RuntimeError::internal(format!(
                "unexpected outcome {:?} for read",
                other
            ))),
        }
    }

    /// Writes one tag synchronously.
    pub async fn write_sync(
        &self,
        tag: TagId,
        value: Value,
        timeout: Duration,
    ) -> RuntimeResult<()> {
        match self
            .submit_and_wait(RequestPayload::WriteSingle { tag, value }, timeout)
            .await?
        {
            RequestOutcome::Write { result, .. } => result,
            other => Err(RuntimeError::internal(format!(
                "unexpected outcome {:?} for write",
                other
            ))),
        }
    }

    /// Reads a set of tags as one batch, returning the per-tag map.
    pub async fn batch_read(
        &self,
        tags: Vec<TagId>,
        timeout: Duration,
    ) -> RuntimeResult<HashMap<TagId, Result<Value, RuntimeError>>> {
        match self
            .submit_and_wait(RequestPayload::ReadBatch { tags }, timeout)
            .await?
        {
            RequestOutcome::ReadBatch { results } => Ok(results),
            other => Err(RuntimeError::internal(format!(
                "unexpected outcome {:?} for batch read",
                other
            ))),
        }
    }

    /// Writes a set of tags as one batch.
    ///
    /// Partial success is overall failure, with per-tag diagnostics.
    pub async fn batch_write(
        &self,
        values: Vec<(TagId, Value)>,
        timeout: Duration,
    ) -> RuntimeResult<BatchWriteResult> {
        match self
            .submit_and_wait(RequestPayload::WriteBatch { values }, timeout)
            .await?
        {
            RequestOutcome::WriteBatch { ok, diagnostics } => {
                Ok(BatchWriteResult { ok, diagnostics })
            }
            other => Err(RuntimeError::internal(format!(
                "unexpected outcome {:?} for batch write",
                other
            ))),
        }
    }

    /// Browses one tag's node synchronously, returning the reference count.
    pub async fn browse_sync(&self, tag: TagId, timeout: Duration) -> RuntimeResult<usize> {
        match self
            .submit_and_wait(RequestPayload::Browse { tag }, timeout)
            .await?
        {
            RequestOutcome::Browse { result, .. } => result,
            other => Err(RuntimeError::internal(format!(
                "unexpected outcome {:?} for browse",
                other
            ))),
        }
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Two-phase shutdown: stop intake, then drain the workers with a
    /// bound.
    pub async fn shutdown(&self, drain: Duration) {
        self.accepting.store(false, Ordering::Release);
        // Dropping the sender closes the queue once buffered requests
        // are drained.
        self.queue.lock().take();

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let joined = tokio::time::timeout(drain, async {
            for worker in workers {
                let _ = worker.await;
            }
        })
        .await;
        if joined.is_err() {
            warn!("pipeline drain exceeded its bound, remaining work abandoned");
        }

        // Anything still waiting learns that the pipeline is gone.
        self.shared.waiters.lock().clear();
    }

    // =========================================================================
    // Worker
    // =========================================================================

    async fn process(shared: &Arc<PipelineShared<S>>, request: PendingRequest) {
        let id = request.id;
        // A request that expired while queued completes without touching
        // the wire; its waiter is long gone anyway.
        if request.is_expired() {
            debug!(id, kind = request.payload.kind(), "request expired in queue");
            Self::complete(shared, id, request.expired_outcome());
            return;
        }
        let outcome = match request.payload {
            RequestPayload::ReadSingle { tag } => {
                let result = Self::do_read(shared, &tag).await;
                RequestOutcome::Read { tag, result }
            }
            RequestPayload::ReadBatch { tags } => {
                let mut results = HashMap::with_capacity(tags.len());
                for tag in tags {
                    let result = Self::do_read(shared, &tag).await;
                    results.insert(tag, result);
                }
                RequestOutcome::ReadBatch { results }
            }
            RequestPayload::WriteSingle { tag, value } => {
                let result = Self::do_write(shared, &tag, value).await;
                RequestOutcome::Write { tag, result }
            }
            RequestPayload::WriteBatch { values } => {
                let mut diagnostics = HashMap::new();
                for (tag, value) in values {
                    if let Err(e) = Self::do_write(shared, &tag, value).await {
                        diagnostics.insert(tag, e);
                    }
                }
                RequestOutcome::WriteBatch {
                    ok: diagnostics.is_empty(),
                    diagnostics,
                }
            }
            RequestPayload::Browse { tag } => {
                let result = Self::do_browse(shared, &tag).await;
                RequestOutcome::Browse { tag, result }
            }
        };

        Self::complete(shared, id, outcome);
    }

    /// Resolves a tag through the registry.
    fn resolve(
        shared: &PipelineShared<S>,
        tag: &TagId,
    ) -> Result<Arc<VariableHandle>, RuntimeError> {
        shared
            .registry
            .get(tag)
            .ok_or_else(|| ConfigError::unknown_tag(tag.as_str()).into())
    }

    async fn do_read(shared: &Arc<PipelineShared<S>>, tag: &TagId) -> Result<Value, RuntimeError> {
        // No retry at this layer: a disconnected runtime fails fast and
        // retry policy lives above the core.
        if !shared.supervisor.is_connected() {
            shared.stats.record_read(false);
            return Err(ConnectionError::NotConnected.into());
        }
        let handle = Self::resolve(shared, tag).map_err(|e| {
            shared.stats.record_read(false);
            e
        })?;

        let result = Self::wire_read(shared, &handle).await;
        shared.stats.record_read(result.is_ok());
        if let Err(e) = &result {
            shared.errors.record(e);
        }
        result
    }

    async fn wire_read(
        shared: &Arc<PipelineShared<S>>,
        handle: &Arc<VariableHandle>,
    ) -> Result<Value, RuntimeError> {
        let session = shared.supervisor.session();
        let timeout = shared.request_timeout();
        let outcome = tokio::time::timeout(timeout, async {
            let mut session = session.lock().await;
            session.read_value(handle.node_id()).await
        })
        .await
        .map_err(|_| ConnectionError::timeout(timeout))??;

        if !outcome.is_good() {
            // Bad server status still updates the quality on the handle.
            let quality = quality_from_status(outcome.status_code);
            handle.with_latest(|latest| {
                latest.quality = quality;
                latest.timestamp = outcome.server_timestamp.unwrap_or_else(chrono::Utc::now);
            });
            return Err(codec::server_status_error(outcome.status_code).into());
        }

        let wire = outcome
            .value
            .ok_or_else(|| RuntimeError::internal("good read outcome without value"))?;
        let value = codec::decode(&wire)?;

        let timestamp = outcome
            .server_timestamp
            .or(outcome.source_timestamp)
            .unwrap_or_else(chrono::Utc::now);
        let alarm_level = value
            .as_f64()
            .map(|v| handle.definition().classify_alarm(v))
            .unwrap_or_default();
        handle.with_latest(|latest| {
            latest.value = value.clone();
            latest.quality = Quality::Good;
            latest.timestamp = timestamp;
            latest.alarm_level = alarm_level;
        });

        Ok(value)
    }

    async fn do_write(
        shared: &Arc<PipelineShared<S>>,
        tag: &TagId,
        value: Value,
    ) -> Result<(), RuntimeError> {
        if !shared.supervisor.is_connected() {
            shared.stats.record_write(false);
            return Err(ConnectionError::NotConnected.into());
        }
        let handle = Self::resolve(shared, tag).map_err(|e| {
            shared.stats.record_write(false);
            e
        })?;
        if !handle.definition().writable {
            shared.stats.record_write(false);
            return Err(ConfigError::not_writable(tag.as_str()).into());
        }

        let result = Self::wire_write(shared, &handle, value).await;
        shared.stats.record_write(result.is_ok());
        if let Err(e) = &result {
            shared.errors.record(e);
        }
        result
    }

    async fn wire_write(
        shared: &Arc<PipelineShared<S>>,
        handle: &Arc<VariableHandle>,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let wire = codec::encode(&value, None)?;
        let session = shared.supervisor.session();
        let timeout = shared.request_timeout();
        let outcome = tokio::time::timeout(timeout, async {
            let mut session = session.lock().await;
            session.write_value(handle.node_id(), wire).await
        })
        .await
        .map_err(|_| ConnectionError::timeout(timeout))??;

        if !outcome.is_good() {
            return Err(codec::server_status_error(outcome.status_code).into());
        }
        Ok(())
    }

    async fn do_browse(
        shared: &Arc<PipelineShared<S>>,
        tag: &TagId,
    ) -> Result<usize, RuntimeError> {
        if !shared.supervisor.is_connected() {
            return Err(ConnectionError::NotConnected.into());
        }
        let handle = Self::resolve(shared, tag)?;

        let session = shared.supervisor.session();
        let timeout = shared.request_timeout();
        let refs = tokio::time::timeout(timeout, async {
            let mut session = session.lock().await;
            session.browse(handle.node_id()).await
        })
        .await
        .map_err(|_| ConnectionError::timeout(timeout))??;

        handle.mark_browsed();
        Ok(refs.len())
    }

    /// Publishes the completion and satisfies any sync waiter.
    fn complete(shared: &Arc<PipelineShared<S>>, id: u64, outcome: RequestOutcome) {
        // The sync slot may have timed out and been removed; sending to
        // an absent slot is a deliberate no-op.
        if let Some(waiter) = shared.waiters.lock().remove(&id) {
            let _ = waiter.send(outcome.clone());
        }

        let event = match outcome {
            RequestOutcome::Read { tag, result } => match result {
                Ok(value) => RuntimeEvent::ReadCompleted {
                    id,
                    tag,
                    value: Some(value),
                    error: None,
                },
                Err(e) => RuntimeEvent::ReadCompleted {
                    id,
                    tag,
                    value: None,
                    error: Some(e),
                },
            },
            RequestOutcome::ReadBatch { results } => {
                RuntimeEvent::BatchReadCompleted { id, results }
            }
            RequestOutcome::Write { tag, result } => RuntimeEvent::WriteCompleted {
                id,
                tag,
                error: result.err(),
            },
            RequestOutcome::WriteBatch { ok, diagnostics } => {
                RuntimeEvent::BatchWriteCompleted { id, ok, diagnostics }
            }
            RequestOutcome::Browse { tag, result } => match result {
                Ok(reference_count) => RuntimeEvent::BrowseCompleted {
                    id,
                    tag,
                    reference_count,
                    error: None,
                },
                Err(e) => RuntimeEvent::BrowseCompleted {
                    id,
                    tag,
                    reference_count: 0,
                    error: Some(e),
                },
            },
        };
        shared.events.publish(event);
    }
}

impl<S: UaSession + 'static> std::fmt::Debug for RequestPipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("workers", &self.shared.config.clamped_workers())
            .field("queue_capacity", &self.shared.config.queue_capacity)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
