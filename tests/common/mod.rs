// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Api, DeleteParams, PostParams},
    client::Client,
};
use kubedns::dns_errors::SourceError;
use kubedns::mirror::MirrorSources;
use kubedns::source::{ListWatch, ObjectSnapshot, WatchEvent, WatchStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    let ns = k8s_openapi::api::core::v1::Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(
                [
                    ("test".to_string(), "integration".to_string()),
                    ("managed-by".to_string(), "kubedns-test".to_string()),
                ]
                .into(),
            ),
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Build a Service with a cluster IP and TCP ports
pub fn service(namespace: &str, name: &str, cluster_ip: &str, ports: &[i32]) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            cluster_ip: Some(cluster_ip.to_string()),
            ports: Some(
                ports
                    .iter()
                    .map(|port| ServicePort {
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

/// Scripted List+Watch source.
///
/// `list` returns the current objects; events pushed with [`push`](Self::push)
/// are delivered to the most recently opened watch.
pub struct ScriptedSource<K> {
    objects: Mutex<(Vec<K>, String)>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<Result<WatchEvent<K>, SourceError>>>>,
}

impl<K: Clone + Send + Sync + 'static> ScriptedSource<K> {
    pub fn new(objects: Vec<K>) -> Arc<Self> {
        Arc::new(Self {
            objects: Mutex::new((objects, "1".to_string())),
            watchers: Mutex::new(Vec::new()),
        })
    }

    /// Replace what the next List returns, without emitting events
    pub fn reset(&self, objects: Vec<K>, resource_version: &str) {
        *self.objects.lock().unwrap() = (objects, resource_version.to_string());
    }

    pub fn push(&self, event: WatchEvent<K>) {
        if let Some(sender) = self.watchers.lock().unwrap().last() {
            let _ = sender.unbounded_send(Ok(event));
        }
    }

    pub fn has_watch(&self) -> bool {
        !self.watchers.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl<K: Clone + Send + Sync + 'static> ListWatch<K> for ScriptedSource<K> {
    async fn list(&self) -> Result<ObjectSnapshot<K>, SourceError> {
        let (items, resource_version) = self.objects.lock().unwrap().clone();
        Ok(ObjectSnapshot {
            items,
            resource_version,
        })
    }

    async fn watch(&self, _resource_version: &str) -> Result<WatchStream<K>, SourceError> {
        let (sender, receiver) = mpsc::unbounded();
        self.watchers.lock().unwrap().push(sender);
        Ok(receiver.boxed())
    }
}

/// Scripted sources for every mirrored kind
pub struct ScriptedCluster {
    pub services: Arc<ScriptedSource<Service>>,
    pub endpoints: Arc<ScriptedSource<Endpoints>>,
    pub pods: Arc<ScriptedSource<Pod>>,
}

impl ScriptedCluster {
    pub fn with_services(services: Vec<Service>) -> Self {
        Self {
            services: ScriptedSource::new(services),
            endpoints: ScriptedSource::new(Vec::new()),
            pods: ScriptedSource::new(Vec::new()),
        }
    }

    pub fn sources(&self) -> MirrorSources {
        MirrorSources {
            services: self.services.clone(),
            endpoints: self.endpoints.clone(),
            pods: self.pods.clone(),
        }
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` elapses
pub async fn eventually<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
