// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The variable registry: stable handles for registered tags.
//!
//! The registry exclusively owns handle storage. Other components
//! (pipeline workers, ingest executors) borrow handles through the
//! registry's read lock; between executor hops only the tag key is
//! carried, and the handle is re-looked-up before mutation so a
//! concurrent unregister cannot leave a dangling reference.
//!
//! Lookup on the subscription ingest hot path is a single O(1) hash-map
//! probe under a read lock; writers take the lock only on register,
//! unregister, and clear.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use argus_core::error::{ConfigError, ConfigResult};
use argus_core::types::{Sample, TagId};
use argus_core::variable::VariableDefinition;

use crate::node_id::NodeId;

// =============================================================================
// VariableHandle
// =============================================================================

/// Runtime state for one registered tag.
///
/// The definition is shared and read-only after registration; the parsed
/// node id is non-null by construction. The `latest` slot is a small
/// critical section serialized across pipeline workers and ingest
/// executors.
pub struct VariableHandle {
    def: Arc<VariableDefinition>,
    node_id: NodeId,
    monitored_item_id: AtomicU32,
    subscribed: AtomicBool,
    browsed: AtomicBool,
    latest: Mutex<Sample>,
}

impl VariableHandle {
    /// Creates a handle from a validated definition.
    ///
    /// Parses the address once; a null parsed node id is rejected.
    pub fn new(def: VariableDefinition) -> ConfigResult<Self> {
        def.validate()?;
        let node_id: NodeId = def.address.parse()?;
        if node_id.is_null() {
            return Err(ConfigError::invalid_address(
                &def.address,
                "address parses to the null node id",
            ));
        }
        Ok(Self {
            def: Arc::new(def),
            node_id,
            monitored_item_id: AtomicU32::new(0),
            subscribed: AtomicBool::new(false),
            browsed: AtomicBool::new(false),
            latest: Mutex::new(Sample::initial()),
        })
    }

    /// Returns the tag.
    #[inline]
    pub fn tag(&self) -> &TagId {
        &self.def.tag
    }

    /// Returns the shared definition.
    #[inline]
    pub fn definition(&self) -> &Arc<VariableDefinition> {
        &self.def
    }

    /// Returns the parsed node id.
    #[inline]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Returns a snapshot of the latest sample.
    pub fn latest(&self) -> Sample {
        self.latest.lock().clone()
    }

    /// Runs `f` with exclusive access to the latest sample.
    ///
    /// This is the handle's critical section: deadband checks, alarm
    /// transitions, and the overwrite itself must happen under one lock
    /// acquisition so concurrent writers serialize.
    pub fn with_latest<R>(&self, f: impl FnOnce(&mut Sample) -> R) -> R {
        let mut latest = self.latest.lock();
        f(&mut latest)
    }

    /// Records the server-assigned monitored item id and marks the
    /// handle subscribed.
    ///
    /// Item ids are only ever assigned by the server; zero is reserved
    /// for "not subscribed".
    pub fn set_monitored_item(&self, item_id: u32) {
        debug_assert_ne!(item_id, 0, "server-assigned item id must be nonzero");
        self.monitored_item_id.store(item_id, Ordering::Release);
        self.subscribed.store(true, Ordering::Release);
    }

    /// Clears the subscription linkage.
    pub fn clear_subscription(&self) {
        self.subscribed.store(false, Ordering::Release);
        self.monitored_item_id.store(0, Ordering::Release);
    }

    /// Returns the monitored item id, if subscribed.
    pub fn monitored_item_id(&self) -> Option<u32> {
        match self.monitored_item_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    /// Returns `true` if a monitored item exists for this handle.
    #[inline]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    /// Marks the handle's node as browsed.
    pub fn mark_browsed(&self) {
        self.browsed.store(true, Ordering::Release);
    }

    /// Returns `true` if the node was browsed at least once.
    #[inline]
    pub fn is_browsed(&self) -> bool {
        self.browsed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for VariableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableHandle")
            .field("tag", &self.def.tag)
            .field("node_id", &self.node_id.to_string())
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

// =============================================================================
// VariableRegistry
// =============================================================================

/// Read-heavy store of variable handles.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    handles: RwLock<HashMap<TagId, Arc<VariableHandle>>>,
}

impl VariableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, refusing duplicates.
    pub fn register(&self, def: VariableDefinition) -> ConfigResult<Arc<VariableHandle>> {
        let handle = Arc::new(VariableHandle::new(def)?);
        let mut handles = self.handles.write();
        if handles.contains_key(handle.tag()) {
            return Err(ConfigError::duplicate_tag(handle.tag().as_str()));
        }
        handles.insert(handle.tag().clone(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Removes a handle, returning it if it existed.
    ///
    /// Callers that may hold a live monitored item must delete it before
    /// removing the entry (the client facade enforces this ordering).
    pub fn remove(&self, tag: &TagId) -> Option<Arc<VariableHandle>> {
        self.handles.write().remove(tag)
    }

    /// Looks up a handle by tag. O(1) under the read lock.
    pub fn get(&self, tag: &TagId) -> Option<Arc<VariableHandle>> {
        self.handles.read().get(tag).cloned()
    }

    /// Returns a snapshot of every handle, for batch operations.
    pub fn snapshot(&self) -> Vec<Arc<VariableHandle>> {
        self.handles.read().values().cloned().collect()
    }

    /// Returns every registered tag.
    pub fn list_tags(&self) -> Vec<TagId> {
        self.handles.read().keys().cloned().collect()
    }

    /// Returns the number of registered variables.
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    /// Returns `true` if no variable is registered.
    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    /// Removes every handle, returning them for teardown.
    pub fn clear(&self) -> Vec<Arc<VariableHandle>> {
        self.handles.write().drain().map(|(_, h)| h).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::types::{Quality, Value};
    use argus_core::variable::VariableKind;

    fn def(tag: &str, address: &str) -> VariableDefinition {
        VariableDefinition::builder(tag, address)
            .kind(VariableKind::Ai)
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let registry = VariableRegistry::new();
        registry.register(def("T1", "ns=2;s=Plant.T1")).unwrap();

        let handle = registry.get(&TagId::new("T1")).unwrap();
        assert_eq!(handle.tag().as_str(), "T1");
        assert_eq!(handle.node_id().to_string(), "ns=2;s=Plant.T1");
        assert!(!handle.node_id().is_null());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = VariableRegistry::new();
        registry.register(def("T1", "ns=2;s=A")).unwrap();
        let err = registry.register(def("T1", "ns=2;s=B")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTag { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_address_rejected() {
        let registry = VariableRegistry::new();
        assert!(registry.register(def("T1", "ns=2;x=oops")).is_err());
        assert!(registry.register(def("T2", "i=0")).is_err()); // null node id
        assert!(registry.is_empty());
    }

    #[test]
    fn test_initial_latest_is_comm_fail() {
        let registry = VariableRegistry::new();
        let handle = registry.register(def("T1", "ns=2;s=A")).unwrap();
        assert_eq!(handle.latest().quality, Quality::CommFail);
    }

    #[test]
    fn test_register_unregister_leaves_tags_unchanged() {
        let registry = VariableRegistry::new();
        registry.register(def("T0", "ns=2;s=Base")).unwrap();
        let before = {
            let mut tags = registry.list_tags();
            tags.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            tags
        };

        registry.register(def("T1", "ns=2;s=A")).unwrap();
        registry.remove(&TagId::new("T1")).unwrap();

        let mut after = registry.list_tags();
        after.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(before, after);
    }

    #[test]
    fn test_subscription_linkage() {
        let registry = VariableRegistry::new();
        let handle = registry.register(def("T1", "ns=2;s=A")).unwrap();

        assert!(!handle.is_subscribed());
        assert_eq!(handle.monitored_item_id(), None);

        handle.set_monitored_item(17);
        assert!(handle.is_subscribed());
        assert_eq!(handle.monitored_item_id(), Some(17));

        handle.clear_subscription();
        assert!(!handle.is_subscribed());
        assert_eq!(handle.monitored_item_id(), None);
    }

    #[test]
    fn test_with_latest_updates() {
        let registry = VariableRegistry::new();
        let handle = registry.register(def("T1", "ns=2;s=A")).unwrap();

        handle.with_latest(|latest| {
            latest.value = Value::Float32(42.0);
            latest.quality = Quality::Good;
        });

        let sample = handle.latest();
        assert_eq!(sample.value, Value::Float32(42.0));
        assert!(sample.is_good());
    }

    #[test]
    fn test_snapshot_and_clear() {
        let registry = VariableRegistry::new();
        registry.register(def("T1", "ns=2;s=A")).unwrap();
        registry.register(def("T2", "ns=2;s=B")).unwrap();

        assert_eq!(registry.snapshot().len(), 2);
        let drained = registry.clear();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_readers() {
        use std::thread;

        let registry = Arc::new(VariableRegistry::new());
        for i in 0..32 {
            registry
                .register(def(&format!("T{}", i), &format!("ns=2;s=Node{}", i)))
                .unwrap();
        }

        let mut joins = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            joins.push(thread::spawn(move || {
                for i in 0..32 {
                    let tag = TagId::new(format!("T{}", i));
                    assert!(registry.get(&tag).is_some());
                }
            }));
        }
        for join in joins {
            join.join().unwrap();
        }
    }
}
