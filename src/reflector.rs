// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! List+Watch synchronization of one resource kind into a [`ResourceStore`].
//!
//! A [`Reflector`] runs the following state machine until shutdown:
//!
//! ```text
//!  Initializing --list ok--> Synced --watch ends--> Resyncing --list ok--> Synced ...
//!        |                                                                   |
//!        +------------------------- shutdown -----------------------> Stopped
//! ```
//!
//! - A full List replaces the whole store atomically.
//! - Watch events are applied one at a time, in the order they are received.
//! - A watch ends when the server closes it, when it reports an error, or when
//!   the resync period elapses; each case leads to a fresh List.
//! - Failed List/Watch calls are logged and retried with backoff. They never
//!   propagate to readers, who only ever observe (bounded) staleness.
//! - The backoff resets once a List succeeds and the watch that follows it
//!   ends without failing.

use crate::backoff::reflector_backoff;
use crate::lifecycle::ShutdownSignal;
use crate::metrics;
use crate::source::{ListWatch, WatchEvent};
use crate::store::{ObjectKey, ResourceStore};
use futures::StreamExt;
use kube::Resource;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Observable phase of a reflector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectorState {
    /// Waiting for the first successful List
    Initializing,
    /// Store installed; applying watch events
    Synced,
    /// Watch ended; re-listing
    Resyncing,
    /// Shutdown observed; no further API calls or store writes
    Stopped,
}

impl fmt::Display for ReflectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Synced => "synced",
            Self::Resyncing => "resyncing",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared, cheaply clonable view of a reflector's progress.
#[derive(Debug, Clone)]
pub struct ReflectorStatus {
    kind: &'static str,
    synced: Arc<AtomicBool>,
    state: Arc<Mutex<ReflectorState>>,
}

impl ReflectorStatus {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            synced: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(ReflectorState::Initializing)),
        }
    }

    /// Resource kind of the reflector.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Whether at least one full List has been installed. Never reverts to `false`.
    #[must_use]
    pub fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Current state machine phase.
    #[must_use]
    pub fn state(&self) -> ReflectorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ReflectorState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn mark_synced(&self) -> bool {
        !self.synced.swap(true, Ordering::AcqRel)
    }
}

/// Why a watch stopped delivering events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchEnd {
    /// The resync period elapsed
    Interval,
    /// The server closed the stream
    Closed,
    /// The stream reported an error
    StreamError,
    /// The watch could not be opened
    WatchError,
    /// Shutdown was signalled
    Shutdown,
}

impl WatchEnd {
    fn as_str(self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::Closed => "closed",
            Self::StreamError => "stream_error",
            Self::WatchError => "watch_error",
            Self::Shutdown => "shutdown",
        }
    }

    fn is_failure(self) -> bool {
        matches!(self, Self::StreamError | Self::WatchError)
    }
}

/// Keeps a [`ResourceStore`] synchronized with a [`ListWatch`] source.
pub struct Reflector<K> {
    kind: &'static str,
    source: Arc<dyn ListWatch<K>>,
    store: ResourceStore<K>,
    resync_period: Duration,
    status: ReflectorStatus,
}

impl<K> Reflector<K>
where
    K: Resource + Send + Sync + 'static,
{
    /// Create a reflector writing into `store`.
    ///
    /// The reflector is the only writer of `store`; it does nothing until [`run`](Self::run).
    #[must_use]
    pub fn new(
        source: Arc<dyn ListWatch<K>>,
        store: ResourceStore<K>,
        resync_period: Duration,
    ) -> Self {
        let kind = store.kind();
        Self {
            kind,
            source,
            store,
            resync_period,
            status: ReflectorStatus::new(kind),
        }
    }

    /// Handle for observing sync progress while the reflector runs.
    #[must_use]
    pub fn status(&self) -> ReflectorStatus {
        self.status.clone()
    }

    /// Run List/Watch cycles until `shutdown` fires.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        info!(kind = self.kind, resync_period = ?self.resync_period, "Starting reflector");
        let mut backoff = reflector_backoff(self.resync_period);
        metrics::record_unsynced(self.kind);

        while !shutdown.is_shutdown() {
            let started = Instant::now();
            let listed = tokio::select! {
                biased;
                () = shutdown.wait() => break,
                result = self.source.list() => result,
            };

            let snapshot = match listed {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    metrics::record_list_error(self.kind, started.elapsed());
                    let retry_after = backoff.next_backoff();
                    warn!(
                        kind = self.kind,
                        error = %e,
                        retry_after = ?retry_after,
                        "List failed, will retry"
                    );
                    if !sleep_unless_shutdown(retry_after, &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            metrics::record_list_success(self.kind, started.elapsed());
            if shutdown.is_shutdown() {
                break;
            }
            let count = snapshot.items.len();
            self.store.replace_all(snapshot.items);
            metrics::record_store_size(self.kind, self.store.len());

            if self.status.mark_synced() {
                metrics::record_synced(self.kind);
                info!(kind = self.kind, objects = count, "Initial sync complete");
            } else {
                debug!(kind = self.kind, objects = count, "Resync complete");
            }
            self.status.set_state(ReflectorState::Synced);

            let end = self.watch(&snapshot.resource_version, &mut shutdown).await;
            if end == WatchEnd::Shutdown {
                break;
            }

            metrics::record_resync(self.kind, end.as_str());
            self.status.set_state(ReflectorState::Resyncing);
            debug!(kind = self.kind, reason = end.as_str(), "Watch ended, resyncing");

            if end.is_failure() {
                let retry_after = backoff.next_backoff();
                if !sleep_unless_shutdown(retry_after, &mut shutdown).await {
                    break;
                }
            } else {
                backoff.reset();
            }
        }

        self.status.set_state(ReflectorState::Stopped);
        info!(kind = self.kind, "Reflector stopped");
    }

    /// Apply watch events from `resource_version` until the watch ends.
    async fn watch(&self, resource_version: &str, shutdown: &mut ShutdownSignal) -> WatchEnd {
        let opened = tokio::select! {
            biased;
            () = shutdown.wait() => return WatchEnd::Shutdown,
            result = self.source.watch(resource_version) => result,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(kind = self.kind, error = %e, "Failed to open watch");
                return WatchEnd::WatchError;
            }
        };
        debug!(kind = self.kind, resource_version = %resource_version, "Watch opened");

        let deadline = tokio::time::sleep(self.resync_period);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                () = shutdown.wait() => return WatchEnd::Shutdown,
                () = &mut deadline => return WatchEnd::Interval,
                next = stream.next() => match next {
                    Some(Ok(event)) => self.apply(event),
                    Some(Err(e)) => {
                        warn!(kind = self.kind, error = %e, "Watch stream failed");
                        return WatchEnd::StreamError;
                    }
                    None => return WatchEnd::Closed,
                },
            }
        }
    }

    /// Apply one event to the store.
    ///
    /// Every watch end leads to a fresh List, so the versions carried by events
    /// and bookmarks are not kept.
    fn apply(&self, event: WatchEvent<K>) {
        match event {
            WatchEvent::Added(obj) => {
                debug!(kind = self.kind, key = %ObjectKey::from_resource(&obj), "Added");
                self.store.upsert(obj);
                metrics::record_watch_event(self.kind, "added");
            }
            WatchEvent::Modified(obj) => {
                debug!(kind = self.kind, key = %ObjectKey::from_resource(&obj), "Modified");
                self.store.upsert(obj);
                metrics::record_watch_event(self.kind, "modified");
            }
            WatchEvent::Deleted(obj) => {
                let key = ObjectKey::from_resource(&obj);
                debug!(kind = self.kind, key = %key, "Deleted");
                self.store.delete(&key.namespace, &key.name);
                metrics::record_watch_event(self.kind, "deleted");
            }
            WatchEvent::Bookmark(version) => {
                debug!(kind = self.kind, resource_version = %version, "Bookmark");
                metrics::record_watch_event(self.kind, "bookmark");
            }
        }
        metrics::record_store_size(self.kind, self.store.len());
    }
}

/// Sleep for `duration`; returns `false` if shutdown fired first.
async fn sleep_unless_shutdown(duration: Duration, shutdown: &mut ShutdownSignal) -> bool {
    tokio::select! {
        biased;
        () = shutdown.wait() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
#[path = "reflector_tests.rs"]
mod reflector_tests;
