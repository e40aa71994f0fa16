// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Indexed in-memory table of Kubernetes objects of a single kind.
//!
//! A [`ResourceStore`] is written by exactly one [`Reflector`](crate::reflector::Reflector)
//! and read by any number of query tasks. Objects are keyed by [`ObjectKey`]
//! (namespace + name) and stored behind `Arc` so readers can hold on to them
//! without copying or holding the lock.
//!
//! Whole-table replacement (after a full List) builds the new table before taking
//! the write lock, so readers observe either the previous snapshot or the new one.

use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Unique key of an object within a store.
///
/// Cluster-scoped objects use the empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace of the object (empty for cluster-scoped objects)
    pub namespace: String,
    /// Name of the object
    pub name: String,
}

impl ObjectKey {
    /// Create a key from namespace and name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Extract the key of a Kubernetes object from its metadata.
    #[must_use]
    pub fn from_resource<K: Resource>(obj: &K) -> Self {
        Self::new(obj.namespace().unwrap_or_default(), obj.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

type Table<K> = BTreeMap<ObjectKey, Arc<K>>;

/// Thread-safe store of objects of kind `K`.
///
/// Cloning a store is cheap and yields a handle to the same table.
pub struct ResourceStore<K> {
    kind: &'static str,
    table: Arc<RwLock<Table<K>>>,
}

impl<K> Clone for ResourceStore<K> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            table: Arc::clone(&self.table),
        }
    }
}

impl<K> fmt::Debug for ResourceStore<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStore")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .finish()
    }
}

impl<K> ResourceStore<K> {
    /// Create an empty store for the given resource kind.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            table: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Resource kind held by this store.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    // A panic while holding the lock cannot leave a half-applied entry behind
    // (every write is a single map operation or a whole-table swap), so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Table<K>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table<K>> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the object with the given key. Absent keys are ignored.
    ///
    /// Returns `true` if an object was removed.
    pub fn delete(&self, namespace: &str, name: &str) -> bool {
        self.write()
            .remove(&ObjectKey::new(namespace, name))
            .is_some()
    }

    /// Point lookup by namespace and name.
    #[must_use]
    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        self.read().get(&ObjectKey::new(namespace, name)).cloned()
    }

    /// All objects in one namespace, ordered by name.
    #[must_use]
    pub fn list_by_namespace(&self, namespace: &str) -> Vec<Arc<K>> {
        self.read()
            .range(ObjectKey::new(namespace, "")..)
            .take_while(|(key, _)| key.namespace == namespace)
            .map(|(_, obj)| Arc::clone(obj))
            .collect()
    }

    /// All objects in the store, ordered by namespace then name.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<K>> {
        self.read().values().cloned().collect()
    }

    /// Number of objects currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl<K: Resource> ResourceStore<K> {
    /// Insert `obj`, replacing any object with the same key.
    ///
    /// Returns the replaced object, if any.
    pub fn upsert(&self, obj: K) -> Option<Arc<K>> {
        let key = ObjectKey::from_resource(&obj);
        self.write().insert(key, Arc::new(obj))
    }

    /// Atomically replace the whole table with `objects`.
    ///
    /// If the snapshot contains duplicate keys, the last occurrence wins.
    pub fn replace_all(&self, objects: impl IntoIterator<Item = K>) {
        let fresh: Table<K> = objects
            .into_iter()
            .map(|obj| (ObjectKey::from_resource(&obj), Arc::new(obj)))
            .collect();

        let stale = std::mem::replace(&mut *self.write(), fresh);
        drop(stale);
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
