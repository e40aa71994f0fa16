// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests against a live Kubernetes cluster.
//!
//! They create a namespace and a Service, mirror the namespace, and resolve the
//! Service through the engine.
//!
//! Run with: cargo test --test cluster_integration -- --ignored

mod common;

use common::{
    cleanup_test_namespace, create_test_namespace, eventually, get_kube_client_or_skip, service,
};
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, PostParams};
use kubedns::config::{MirrorConfig, ZoneConfig};
use kubedns::mirror::ClusterMirror;
use kubedns::resolver::ResolutionEngine;
use kubedns::template::NameTemplate;
use std::sync::Arc;
use std::time::Duration;

const TEST_NAMESPACE: &str = "kubedns-integration-test";

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_mirror_resolves_live_service() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };

    create_test_namespace(&client, TEST_NAMESPACE)
        .await
        .expect("Failed to create test namespace");

    // Let the API server allocate the cluster IP.
    let services: Api<Service> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let mut web = service(TEST_NAMESPACE, "web", "", &[80]);
    web.metadata.resource_version = None;
    if let Some(spec) = web.spec.as_mut() {
        spec.cluster_ip = None;
    }
    let created = services
        .create(&PostParams::default(), &web)
        .await
        .expect("Failed to create test service");
    let cluster_ip = created
        .spec
        .and_then(|s| s.cluster_ip)
        .expect("service has no cluster IP");

    let mirror_config = MirrorConfig {
        resync_period: Duration::from_secs(10),
        watch_namespace: Some(TEST_NAMESPACE.to_string()),
        label_selector: None,
    };
    let mirror = Arc::new(ClusterMirror::from_client(client.clone(), &mirror_config));
    mirror.run();
    assert!(eventually(Duration::from_secs(30), || mirror.is_synced()).await);

    let zones = ZoneConfig::new(&["cluster.local"], None, NameTemplate::default()).unwrap();
    let engine = ResolutionEngine::new(Arc::clone(&mirror), zones);
    let name = format!("web.{TEST_NAMESPACE}.cluster.local.");

    assert!(
        eventually(Duration::from_secs(30), || {
            engine
                .resolve(&name, false)
                .is_ok_and(|records| records.len() == 2 && records[1].host == cluster_ip)
        })
        .await,
        "service never became resolvable"
    );

    mirror.stop().unwrap();
    cleanup_test_namespace(&client, TEST_NAMESPACE)
        .await
        .expect("Failed to cleanup test namespace");
}
