// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory mirror of the cluster objects needed for name resolution.
//!
//! A [`ClusterMirror`] owns one [`ResourceStore`] and one [`Reflector`] per
//! resource kind (Services, Endpoints, Pods). Reflectors are started once with
//! [`ClusterMirror::run`] and halted once with [`ClusterMirror::stop`]; between
//! the two, any number of tasks may query the stores concurrently.
//!
//! ```rust,no_run
//! use kubedns::config::MirrorConfig;
//! use kubedns::mirror::ClusterMirror;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = kube::Client::try_default().await?;
//! let mirror = ClusterMirror::from_client(client, &MirrorConfig::default());
//! mirror.run();
//!
//! if mirror.is_synced() {
//!     let web = mirror.lookup_service_in_namespace("prod", "web");
//!     println!("{web:?}");
//! }
//!
//! mirror.stop()?;
//! # Ok(())
//! # }
//! ```

use crate::config::MirrorConfig;
use crate::constants::{KIND_ENDPOINTS, KIND_POD, KIND_SERVICE};
use crate::dns_errors::MirrorError;
use crate::lifecycle::{ShutdownGuard, ShutdownSignal};
use crate::reflector::{Reflector, ReflectorState, ReflectorStatus};
use crate::source::{KubeListWatch, ListWatch};
use crate::store::ResourceStore;
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// List+Watch sources for every mirrored kind.
pub struct MirrorSources {
    /// Source of Service objects
    pub services: Arc<dyn ListWatch<Service>>,
    /// Source of Endpoints objects
    pub endpoints: Arc<dyn ListWatch<Endpoints>>,
    /// Source of Pod objects
    pub pods: Arc<dyn ListWatch<Pod>>,
}

impl MirrorSources {
    /// Kubernetes-backed sources sharing one client.
    #[must_use]
    pub fn from_client(client: Client, config: &MirrorConfig) -> Self {
        let namespace = config.watch_namespace.as_deref();
        Self {
            services: Arc::new(KubeListWatch::<Service>::new(
                client.clone(),
                KIND_SERVICE,
                namespace,
                config.label_selector.clone(),
                config.resync_period,
            )),
            endpoints: Arc::new(KubeListWatch::<Endpoints>::new(
                client.clone(),
                KIND_ENDPOINTS,
                namespace,
                config.label_selector.clone(),
                config.resync_period,
            )),
            pods: Arc::new(KubeListWatch::<Pod>::new(
                client,
                KIND_POD,
                namespace,
                config.label_selector.clone(),
                config.resync_period,
            )),
        }
    }
}

/// Synchronized, queryable view of Services, Endpoints and Pods.
pub struct ClusterMirror {
    services: ResourceStore<Service>,
    endpoints: ResourceStore<Endpoints>,
    pods: ResourceStore<Pod>,
    statuses: Vec<ReflectorStatus>,
    /// Reflector tasks not yet spawned; `None` once `run` has been called.
    pending: Mutex<Option<Vec<BoxFuture<'static, ()>>>>,
    guard: ShutdownGuard,
}

impl fmt::Debug for ClusterMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterMirror")
            .field("services", &self.services)
            .field("endpoints", &self.endpoints)
            .field("pods", &self.pods)
            .field("synced", &self.is_synced())
            .field("stopping", &self.guard.is_triggered())
            .finish_non_exhaustive()
    }
}

impl ClusterMirror {
    /// Build a mirror over explicit sources. Nothing runs until [`run`](Self::run).
    #[must_use]
    pub fn new(config: &MirrorConfig, sources: MirrorSources) -> Self {
        let guard = ShutdownGuard::new();

        let services = ResourceStore::new(KIND_SERVICE);
        let endpoints = ResourceStore::new(KIND_ENDPOINTS);
        let pods = ResourceStore::new(KIND_POD);

        let service_reflector =
            Reflector::new(sources.services, services.clone(), config.resync_period);
        let endpoints_reflector =
            Reflector::new(sources.endpoints, endpoints.clone(), config.resync_period);
        let pod_reflector = Reflector::new(sources.pods, pods.clone(), config.resync_period);

        let statuses = vec![
            service_reflector.status(),
            endpoints_reflector.status(),
            pod_reflector.status(),
        ];

        let tasks = vec![
            service_reflector.run(guard.subscribe()).boxed(),
            endpoints_reflector.run(guard.subscribe()).boxed(),
            pod_reflector.run(guard.subscribe()).boxed(),
        ];

        Self {
            services,
            endpoints,
            pods,
            statuses,
            pending: Mutex::new(Some(tasks)),
            guard,
        }
    }

    /// Build a mirror backed by the Kubernetes API.
    #[must_use]
    pub fn from_client(client: Client, config: &MirrorConfig) -> Self {
        Self::new(config, MirrorSources::from_client(client, config))
    }

    /// Start every reflector in the background and return immediately.
    ///
    /// Must be called from within a tokio runtime. Calling `run` again is a no-op.
    pub fn run(&self) {
        let tasks = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(tasks) = tasks else {
            warn!("Cluster mirror is already running, ignoring run request");
            return;
        };

        info!(reflectors = tasks.len(), "Starting cluster mirror");
        for task in tasks {
            tokio::spawn(task);
        }
    }

    /// Whether every reflector has installed at least one full List.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.statuses.iter().all(ReflectorStatus::has_synced)
    }

    /// Signal every reflector to halt. Does not wait for them to exit.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::ShutdownInProgress`] if `stop` was already called.
    pub fn stop(&self) -> Result<(), MirrorError> {
        self.guard.trigger()
    }

    /// Signal that resolves once [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.guard.subscribe()
    }

    /// Current phase of each reflector, keyed by kind.
    #[must_use]
    pub fn reflector_states(&self) -> BTreeMap<&'static str, ReflectorState> {
        self.statuses
            .iter()
            .map(|status| (status.kind(), status.state()))
            .collect()
    }

    /// Point lookup of a Service.
    #[must_use]
    pub fn lookup_service_in_namespace(&self, namespace: &str, name: &str) -> Option<Arc<Service>> {
        self.services.get(namespace, name)
    }

    /// Every Service whose cluster IP equals `address`.
    ///
    /// Addresses are compared as IPs when both sides parse, so differently
    /// written IPv6 forms of the same address match.
    #[must_use]
    pub fn lookup_services_by_address(&self, address: &str) -> Vec<Arc<Service>> {
        let wanted = address.parse::<IpAddr>().ok();

        self.services
            .list()
            .into_iter()
            .filter(|svc| {
                let Some(cluster_ip) = svc.spec.as_ref().and_then(|s| s.cluster_ip.as_deref())
                else {
                    return false;
                };
                match (wanted, cluster_ip.parse::<IpAddr>()) {
                    (Some(wanted), Ok(ip)) => wanted == ip,
                    _ => cluster_ip == address,
                }
            })
            .collect()
    }

    /// Services grouped by namespace.
    #[must_use]
    pub fn services_by_namespace(&self) -> BTreeMap<String, Vec<Arc<Service>>> {
        let mut grouped: BTreeMap<String, Vec<Arc<Service>>> = BTreeMap::new();
        for svc in self.services.list() {
            grouped
                .entry(svc.namespace().unwrap_or_default())
                .or_default()
                .push(svc);
        }
        grouped
    }

    /// Point lookup of an Endpoints object.
    #[must_use]
    pub fn lookup_endpoints_in_namespace(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<Arc<Endpoints>> {
        self.endpoints.get(namespace, name)
    }

    /// Point lookup of a Pod.
    #[must_use]
    pub fn lookup_pod_in_namespace(&self, namespace: &str, name: &str) -> Option<Arc<Pod>> {
        self.pods.get(namespace, name)
    }
}

#[cfg(test)]
#[path = "mirror_tests.rs"]
mod mirror_tests;
