// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The connection supervisor.
//!
//! The supervisor owns the underlying session, drives the connection
//! state machine, runs the keepalive probe, and schedules reconnects
//! with capped exponential backoff and jitter. It is a passive
//! dependency for the rest of the runtime: pipeline workers and the
//! subscription engine check [`ConnectionSupervisor::state`] before
//! issuing operations and share the session through
//! [`ConnectionSupervisor::session`].
//!
//! # Failure semantics
//!
//! - Transient wire errors enter the reconnect cycle.
//! - Authentication failures go straight to `Error` and are never
//!   retried; recovery requires an external `connect` call.
//! - Keepalive failures are always treated as transient.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use argus_core::diagnostics::{ErrorRing, RuntimeStats};
use argus_core::error::{ConnectionError, ConnectionResult};
use argus_core::event::{EventBus, RuntimeEvent};
use argus_core::policy::ReconnectPolicy;
use argus_core::types::ConnectionState;

use crate::codec::server_status_error;
use crate::node_id::NodeId;
use crate::transport::{Identity, UaSession};

// =============================================================================
// ConnectionSupervisor
// =============================================================================

/// Supervises one OPC UA session.
pub struct ConnectionSupervisor<S: UaSession + 'static> {
    session: Arc<AsyncMutex<S>>,
    state: AtomicU8,
    policy: RwLock<ReconnectPolicy>,
    target: RwLock<Option<(String, Identity)>>,
    last_activity: RwLock<Option<Instant>>,
    keepalive_task: Mutex<Option<JoinHandle<()>>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    reconnect_active: AtomicBool,
    events: Arc<EventBus>,
    stats: Arc<RuntimeStats>,
    errors: Arc<ErrorRing>,
}

impl<S: UaSession + 'static> ConnectionSupervisor<S> {
    /// Creates a supervisor around a session.
    pub fn new(
        session: S,
        policy: ReconnectPolicy,
        events: Arc<EventBus>,
        stats: Arc<RuntimeStats>,
        errors: Arc<ErrorRing>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session: Arc::new(AsyncMutex::new(session)),
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            policy: RwLock::new(policy),
            target: RwLock::new(None),
            last_activity: RwLock::new(None),
            keepalive_task: Mutex::new(None),
            reconnect_task: Mutex::new(None),
            reconnect_active: AtomicBool::new(false),
            events,
            stats,
            errors,
        })
    }

    /// Returns the shared session handle.
    ///
    /// The session is not thread-safe; every call must go through this
    /// mutex.
    pub fn session(&self) -> Arc<AsyncMutex<S>> {
        Arc::clone(&self.session)
    }

    /// Returns the current connection state.
    #[inline]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` while the session is connected.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Replaces the reconnect policy.
    pub fn set_policy(&self, policy: ReconnectPolicy) {
        *self.policy.write() = policy;
    }

    /// Returns a copy of the active policy.
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy.read().clone()
    }

    /// Returns the time since the last successful session activity.
    pub fn idle_time(&self) -> Option<Duration> {
        self.last_activity.read().map(|at| at.elapsed())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects to `endpoint` with the given identity.
    ///
    /// Performs the session handshake and then probes the session by
    /// reading the server's current-time attribute; a failed probe
    /// aborts the attempt and counts as a failure. On a retryable
    /// failure the supervisor enters the reconnect cycle and the first
    /// error is returned to the caller; on authentication failure the
    /// state becomes `Error` and no retry is scheduled.
    pub async fn connect(
        self: &Arc<Self>,
        endpoint: impl Into<String>,
        identity: Identity,
    ) -> ConnectionResult<()> {
        let endpoint = endpoint.into();
        let current = self.state();
        if current.is_connected() {
            return Ok(());
        }
        if current == ConnectionState::Connecting {
            return Err(ConnectionError::session_closed(
                "connect already in progress",
            ));
        }

        self.cancel_reconnect();
        *self.target.write() = Some((endpoint.clone(), identity.clone()));
        self.set_state(ConnectionState::Connecting);

        match self.attempt_connect(&endpoint, &identity).await {
            Ok(()) => {
                self.on_connected(&endpoint);
                Ok(())
            }
            Err(e) => {
                self.stats.record_failed_connect();
                self.errors.record(&e.clone().into());
                if e.is_retryable() {
                    self.set_state(ConnectionState::Reconnecting);
                    self.spawn_reconnect();
                } else {
                    error!(endpoint = %endpoint, error = %e, "authentication rejected, not retrying");
                    self.set_state(ConnectionState::Error);
                }
                Err(e)
            }
        }
    }

    /// Disconnects and stops all supervisor tasks.
    pub async fn disconnect(&self) -> ConnectionResult<()> {
        self.cancel_keepalive();
        self.cancel_reconnect();

        let result = {
            let mut session = self.session.lock().await;
            if session.is_connected() {
                session.disconnect().await
            } else {
                Ok(())
            }
        };

        if self.state() != ConnectionState::Disconnected {
            self.stats.record_disconnect();
            self.set_state(ConnectionState::Disconnected);
            self.events.publish(RuntimeEvent::Disconnected);
        }
        result
    }

    /// Forces a disconnect followed by a fresh connect to the stored
    /// endpoint.
    pub async fn reconnect(self: &Arc<Self>) -> ConnectionResult<()> {
        let (endpoint, identity) = self
            .target
            .read()
            .clone()
            .ok_or(ConnectionError::NotConnected)?;
        self.disconnect().await?;
        self.connect(endpoint, identity).await
    }

    // =========================================================================
    // Connect internals
    // =========================================================================

    /// One handshake + probe attempt against the session.
    async fn attempt_connect(&self, endpoint: &str, identity: &Identity) -> ConnectionResult<()> {
        let timeout = self.policy.read().keepalive_timeout;
        let mut session = self.session.lock().await;

        session.connect(endpoint, identity).await?;

        // Probe: a session that cannot serve the server-time read is not
        // usable, so the attempt fails as a whole.
        let probe = tokio::time::timeout(timeout, session.read_value(&NodeId::SERVER_TIME)).await;
        let outcome = match probe {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                let _ = session.disconnect().await;
                return Err(e);
            }
            Err(_) => {
                let _ = session.disconnect().await;
                return Err(ConnectionError::timeout(timeout));
            }
        };
        if !outcome.is_good() {
            let status = server_status_error(outcome.status_code);
            let _ = session.disconnect().await;
            return Err(ConnectionError::session_closed(format!(
                "connect probe failed: {}",
                status
            )));
        }
        Ok(())
    }

    /// Post-connect bookkeeping shared by connect and the reconnect loop.
    fn on_connected(self: &Arc<Self>, endpoint: &str) {
        self.stats.record_connect();
        *self.last_activity.write() = Some(Instant::now());
        self.set_state(ConnectionState::Connected);
        self.events.publish(RuntimeEvent::Connected {
            endpoint: endpoint.to_string(),
        });
        info!(endpoint = %endpoint, "session connected");
        self.spawn_keepalive();
    }

    // =========================================================================
    // Keepalive
    // =========================================================================

    /// Starts the periodic keepalive probe, replacing any prior task.
    fn spawn_keepalive(self: &Arc<Self>) {
        self.cancel_keepalive();
        let supervisor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let interval = supervisor.policy.read().keepalive_interval;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so probes start
            // one interval after connect.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if supervisor.state() != ConnectionState::Connected {
                    return;
                }
                match supervisor.keepalive_probe().await {
                    Ok(()) => {
                        *supervisor.last_activity.write() = Some(Instant::now());
                        supervisor.events.publish(RuntimeEvent::Keepalive);
                        debug!("keepalive ok");
                    }
                    Err(e) => {
                        warn!(error = %e, "keepalive failed, connection lost");
                        supervisor.errors.record(&e.into());
                        supervisor.stats.record_disconnect();
                        supervisor.set_state(ConnectionState::Reconnecting);
                        supervisor.events.publish(RuntimeEvent::ConnectionLost);
                        supervisor.spawn_reconnect();
                        return;
                    }
                }
            }
        });
        *self.keepalive_task.lock() = Some(handle);
    }

    /// One keepalive probe, bounded by the keepalive timeout.
    async fn keepalive_probe(&self) -> ConnectionResult<()> {
        let timeout = self.policy.read().keepalive_timeout;
        let result = tokio::time::timeout(timeout, async {
            let mut session = self.session.lock().await;
            session.read_value(&NodeId::SERVER_TIME).await
        })
        .await;

        match result {
            Ok(Ok(outcome)) if outcome.is_good() => Ok(()),
            Ok(Ok(outcome)) => Err(ConnectionError::session_closed(format!(
                "keepalive probe returned {}",
                server_status_error(outcome.status_code)
            ))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ConnectionError::timeout(timeout)),
        }
    }

    fn cancel_keepalive(&self) {
        if let Some(handle) = self.keepalive_task.lock().take() {
            handle.abort();
        }
    }

    // =========================================================================
    // Reconnect
    // =========================================================================

    /// Starts the reconnect loop unless one is already running.
    fn spawn_reconnect(self: &Arc<Self>) {
        if self.reconnect_active.swap(true, Ordering::AcqRel) {
            return;
        }
        let supervisor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            supervisor.reconnect_loop().await;
            supervisor.reconnect_active.store(false, Ordering::Release);
        });
        *self.reconnect_task.lock() = Some(handle);
    }

    /// Backoff-and-retry until connected, exhausted, or terminally failed.
    async fn reconnect_loop(self: &Arc<Self>) {
        loop {
            let policy = self.policy.read().clone();
            let attempt = self.stats.next_reconnect_attempt();
            if !policy.allows_attempt(attempt) {
                error!(attempts = attempt, "reconnect attempts exhausted");
                self.set_state(ConnectionState::Error);
                return;
            }

            let delay = policy.jittered_delay_for(attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
            self.events.publish(RuntimeEvent::Reconnecting { attempt, delay });
            tokio::time::sleep(delay).await;

            // The runtime may have been disconnected or reconfigured
            // while we slept.
            if self.state() != ConnectionState::Reconnecting {
                return;
            }
            let Some((endpoint, identity)) = self.target.read().clone() else {
                return;
            };

            self.set_state(ConnectionState::Connecting);
            match self.attempt_connect(&endpoint, &identity).await {
                Ok(()) => {
                    self.on_connected(&endpoint);
                    return;
                }
                Err(e) => {
                    self.stats.record_failed_connect();
                    self.errors.record(&e.clone().into());
                    if !e.is_retryable() {
                        error!(error = %e, "terminal failure during reconnect");
                        self.set_state(ConnectionState::Error);
                        return;
                    }
                    warn!(attempt, error = %e, "reconnect attempt failed");
                    self.set_state(ConnectionState::Reconnecting);
                }
            }
        }
    }

    fn cancel_reconnect(&self) {
        if let Some(handle) = self.reconnect_task.lock().take() {
            handle.abort();
        }
        self.reconnect_active.store(false, Ordering::Release);
    }

    // =========================================================================
    // State machine
    // =========================================================================

    /// Moves the state machine, publishing the transition.
    ///
    /// The supervisor is the sole mutator of the state; everyone else
    /// observes it atomically.
    fn set_state(&self, next: ConnectionState) {
        let prev = loop {
            let raw = self.state.load(Ordering::Acquire);
            let prev = ConnectionState::from_u8(raw);
            if prev == next {
                return;
            }
            if !prev.can_transition_to(next) {
                warn!(prev = %prev, next = %next, "suppressing illegal state transition");
                return;
            }
            if self
                .state
                .compare_exchange(raw, next.as_u8(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break prev;
            }
        };

        debug!(prev = %prev, next = %next, "connection state changed");
        self.events
            .publish(RuntimeEvent::StateChanged { prev, next });
    }

    /// Stops every supervisor task without touching the session.
    ///
    /// Used during runtime teardown after the session has been closed.
    pub fn stop_tasks(&self) {
        self.cancel_keepalive();
        self.cancel_reconnect();
    }
}

impl<S: UaSession + 'static> std::fmt::Debug for ConnectionSupervisor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
