// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared builders and an in-memory List+Watch source for unit tests.

use crate::config::MirrorConfig;
use crate::constants::{KIND_ENDPOINTS, KIND_POD, KIND_SERVICE};
use crate::dns_errors::SourceError;
use crate::mirror::{ClusterMirror, MirrorSources};
use crate::source::{ListWatch, ObjectSnapshot, WatchEvent, WatchStream};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Pod, PodStatus, Service,
    ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Build object metadata with a resource version.
pub fn meta(namespace: &str, name: &str, resource_version: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        resource_version: Some(resource_version.to_string()),
        ..Default::default()
    }
}

/// Build a Service with a cluster IP and named TCP ports.
pub fn service(namespace: &str, name: &str, cluster_ip: &str, ports: &[(&str, i32)]) -> Service {
    Service {
        metadata: meta(namespace, name, "1"),
        spec: Some(ServiceSpec {
            cluster_ip: Some(cluster_ip.to_string()),
            ports: Some(
                ports
                    .iter()
                    .map(|(port_name, port)| ServicePort {
                        name: Some((*port_name).to_string()),
                        port: *port,
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        status: None,
    }
}

/// Build a Pod with an assigned IP.
pub fn pod(namespace: &str, name: &str, ip: &str) -> Pod {
    Pod {
        metadata: meta(namespace, name, "1"),
        spec: None,
        status: Some(PodStatus {
            pod_ip: Some(ip.to_string()),
            ..Default::default()
        }),
    }
}

/// Build Endpoints with one subset.
pub fn endpoints(namespace: &str, name: &str, ips: &[&str], port: i32) -> Endpoints {
    Endpoints {
        metadata: meta(namespace, name, "1"),
        subsets: Some(vec![EndpointSubset {
            addresses: Some(
                ips.iter()
                    .map(|ip| EndpointAddress {
                        ip: (*ip).to_string(),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ports: Some(vec![EndpointPort {
                port,
                ..Default::default()
            }]),
            ..Default::default()
        }]),
    }
}

/// In-memory [`ListWatch`] source.
///
/// `list` returns the current authoritative objects; each `watch` call opens a
/// channel that tests feed with [`emit`](Self::emit).
pub struct FakeSource<K> {
    kind: &'static str,
    objects: Mutex<Vec<K>>,
    resource_version: Mutex<String>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<Result<WatchEvent<K>, SourceError>>>>,
    failing_lists: AtomicUsize,
    failing_watches: AtomicUsize,
    list_calls: AtomicUsize,
    watch_calls: AtomicUsize,
    watch_versions: Mutex<Vec<String>>,
}

impl<K: Clone + Send + Sync + 'static> FakeSource<K> {
    pub fn new(kind: &'static str, objects: Vec<K>) -> Self {
        Self {
            kind,
            objects: Mutex::new(objects),
            resource_version: Mutex::new("100".to_string()),
            watchers: Mutex::new(Vec::new()),
            failing_lists: AtomicUsize::new(0),
            failing_watches: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            watch_calls: AtomicUsize::new(0),
            watch_versions: Mutex::new(Vec::new()),
        }
    }

    /// Change what the next List returns without emitting any event.
    pub fn set_objects(&self, objects: Vec<K>, resource_version: &str) {
        *self.objects.lock().unwrap() = objects;
        *self.resource_version.lock().unwrap() = resource_version.to_string();
    }

    /// Make the next `n` List calls fail.
    pub fn fail_next_lists(&self, n: usize) {
        self.failing_lists.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` Watch calls fail.
    pub fn fail_next_watches(&self, n: usize) {
        self.failing_watches.store(n, Ordering::SeqCst);
    }

    /// Deliver an event to the most recently opened watch.
    pub fn emit(&self, event: WatchEvent<K>) {
        if let Some(sender) = self.watchers.lock().unwrap().last() {
            let _ = sender.unbounded_send(Ok(event));
        }
    }

    /// Deliver a stream error to the most recently opened watch.
    pub fn emit_error(&self, reason: &str) {
        if let Some(sender) = self.watchers.lock().unwrap().last() {
            let _ = sender.unbounded_send(Err(SourceError::WatchStream {
                kind: self.kind,
                reason: reason.to_string(),
            }));
        }
    }

    /// Close every open watch stream.
    pub fn close_watches(&self) {
        self.watchers.lock().unwrap().clear();
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    /// Resource versions every watch was opened from, in call order.
    pub fn watch_versions(&self) -> Vec<String> {
        self.watch_versions.lock().unwrap().clone()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl<K: Clone + Send + Sync + 'static> ListWatch<K> for FakeSource<K> {
    async fn list(&self) -> Result<ObjectSnapshot<K>, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_lists) {
            return Err(SourceError::List {
                kind: self.kind,
                reason: "injected list failure".to_string(),
            });
        }

        Ok(ObjectSnapshot {
            items: self.objects.lock().unwrap().clone(),
            resource_version: self.resource_version.lock().unwrap().clone(),
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream<K>, SourceError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        self.watch_versions
            .lock()
            .unwrap()
            .push(resource_version.to_string());
        if Self::take_failure(&self.failing_watches) {
            return Err(SourceError::Watch {
                kind: self.kind,
                resource_version: resource_version.to_string(),
                reason: "injected watch failure".to_string(),
            });
        }

        let (sender, receiver) = mpsc::unbounded();
        self.watchers.lock().unwrap().push(sender);
        Ok(receiver.boxed())
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Run `future` with a timeout, panicking if it does not finish.
pub async fn within<T>(timeout: Duration, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(timeout, future)
        .await
        .expect("future did not complete in time")
}

/// One fake source per mirrored kind.
pub struct FakeCluster {
    pub services: Arc<FakeSource<Service>>,
    pub endpoints: Arc<FakeSource<Endpoints>>,
    pub pods: Arc<FakeSource<Pod>>,
}

impl FakeCluster {
    pub fn new(services: Vec<Service>, endpoints: Vec<Endpoints>, pods: Vec<Pod>) -> Self {
        Self {
            services: Arc::new(FakeSource::new(KIND_SERVICE, services)),
            endpoints: Arc::new(FakeSource::new(KIND_ENDPOINTS, endpoints)),
            pods: Arc::new(FakeSource::new(KIND_POD, pods)),
        }
    }

    pub fn sources(&self) -> MirrorSources {
        MirrorSources {
            services: Arc::clone(&self.services) as Arc<dyn ListWatch<Service>>,
            endpoints: Arc::clone(&self.endpoints) as Arc<dyn ListWatch<Endpoints>>,
            pods: Arc::clone(&self.pods) as Arc<dyn ListWatch<Pod>>,
        }
    }

    /// Build a mirror over these sources, start it and wait for the first sync.
    pub async fn synced_mirror(&self) -> Arc<ClusterMirror> {
        let mirror = Arc::new(ClusterMirror::new(&MirrorConfig::default(), self.sources()));
        mirror.run();
        assert!(
            wait_until(Duration::from_secs(5), || mirror.is_synced()).await,
            "mirror did not sync"
        );
        mirror
    }
}
