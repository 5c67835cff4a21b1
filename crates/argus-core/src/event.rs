// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The typed event plane.
//!
//! Lifecycle, request-completion, value-change, and alarm events are
//! delivered to consumers over a broadcast channel. Publishing never
//! blocks the producer: value-change notifications already fan out
//! through the per-tag executors before emission, so a slow subscriber
//! can lag (and observe `RecvError::Lagged`) without starving ingest.
//!
//! # Examples
//!
//! ```rust,ignore
//! use argus_core::event::{EventBus, RuntimeEvent};
//!
//! let bus = EventBus::new(64);
//! let mut events = bus.subscribe();
//!
//! bus.publish(RuntimeEvent::Keepalive);
//! let event = events.recv().await?;
//! assert!(matches!(event, RuntimeEvent::Keepalive));
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::RuntimeError;
use crate::types::{AlarmLevel, ConnectionState, Quality, TagId, Value};

// =============================================================================
// RuntimeEvent
// =============================================================================

/// Events emitted by the runtime.
///
/// Events carry tuples of plain data, not live objects, so they are
/// cheap to clone across the broadcast channel.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// The session reached `Connected`.
    Connected {
        /// The endpoint URL.
        endpoint: String,
    },

    /// The session was closed by an explicit disconnect.
    Disconnected,

    /// The session was lost unexpectedly (keepalive or wire failure).
    ConnectionLost,

    /// A reconnect attempt has been scheduled.
    Reconnecting {
        /// 0-based attempt counter.
        attempt: u32,
        /// Delay before the attempt fires.
        delay: Duration,
    },

    /// The supervisor state machine moved.
    StateChanged {
        /// Previous state.
        prev: ConnectionState,
        /// New state.
        next: ConnectionState,
    },

    /// A keepalive probe succeeded.
    Keepalive,

    /// A read request completed.
    ReadCompleted {
        /// Request id.
        id: u64,
        /// The tag that was read.
        tag: TagId,
        /// The decoded value on success.
        value: Option<Value>,
        /// The failure, if the read failed.
        error: Option<RuntimeError>,
    },

    /// A write request completed.
    WriteCompleted {
        /// Request id.
        id: u64,
        /// The tag that was written.
        tag: TagId,
        /// The failure, if the write failed.
        error: Option<RuntimeError>,
    },

    /// A batch read completed.
    BatchReadCompleted {
        /// Request id.
        id: u64,
        /// Per-tag results.
        results: HashMap<TagId, Result<Value, RuntimeError>>,
    },

    /// A batch write completed.
    BatchWriteCompleted {
        /// Request id.
        id: u64,
        /// `true` only if every element succeeded.
        ok: bool,
        /// Per-tag diagnostics for failed elements.
        diagnostics: HashMap<TagId, RuntimeError>,
    },

    /// A browse request completed.
    BrowseCompleted {
        /// Request id.
        id: u64,
        /// The tag whose node was browsed.
        tag: TagId,
        /// Number of references found.
        reference_count: usize,
        /// The failure, if the browse failed.
        error: Option<RuntimeError>,
    },

    /// A subscribed variable changed value.
    ValueChanged {
        /// The tag.
        tag: TagId,
        /// The new value.
        value: Value,
        /// Server timestamp (local fallback).
        timestamp: DateTime<Utc>,
        /// Quality of the value.
        quality: Quality,
    },

    /// A variable entered an alarm state.
    AlarmRaised {
        /// The tag.
        tag: TagId,
        /// The alarm level.
        level: AlarmLevel,
        /// The value that triggered the alarm.
        value: Value,
    },

    /// A variable returned to its normal band.
    AlarmCleared {
        /// The tag.
        tag: TagId,
    },

    /// The server deleted the active subscription.
    SubscriptionLost,

    /// The subscription was rebuilt after a server-side deletion.
    SubscriptionRestored {
        /// Number of monitored items recreated.
        item_count: usize,
    },
}

impl RuntimeEvent {
    /// Returns the event kind as a static string for logging/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeEvent::Connected { .. } => "connected",
            RuntimeEvent::Disconnected => "disconnected",
            RuntimeEvent::ConnectionLost => "connection_lost",
            RuntimeEvent::Reconnecting { .. } => "reconnecting",
            RuntimeEvent::StateChanged { .. } => "state_changed",
            RuntimeEvent::Keepalive => "keepalive",
            RuntimeEvent::ReadCompleted { .. } => "read_completed",
            RuntimeEvent::WriteCompleted { .. } => "write_completed",
            RuntimeEvent::BatchReadCompleted { .. } => "batch_read_completed",
            RuntimeEvent::BatchWriteCompleted { .. } => "batch_write_completed",
            RuntimeEvent::BrowseCompleted { .. } => "browse_completed",
            RuntimeEvent::ValueChanged { .. } => "value_changed",
            RuntimeEvent::AlarmRaised { .. } => "alarm_raised",
            RuntimeEvent::AlarmCleared { .. } => "alarm_cleared",
            RuntimeEvent::SubscriptionLost => "subscription_lost",
            RuntimeEvent::SubscriptionRestored { .. } => "subscription_restored",
        }
    }
}

// =============================================================================
// EventBus
// =============================================================================

/// Broadcast bus for [`RuntimeEvent`]s.
///
/// One producer side is shared by every runtime component; consumers
/// subscribe independently. Slow consumers lag rather than applying
/// back-pressure to the producer.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<RuntimeEvent>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl EventBus {
    /// Creates a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Never blocks. Returns the number of subscribers that received the
    /// event; events published with no live subscriber are counted as
    /// dropped.
    pub fn publish(&self, event: RuntimeEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    /// Creates a new subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns the total number of published events.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Returns the number of events published with no subscriber.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// =============================================================================
// Tests
// =============================================================================
