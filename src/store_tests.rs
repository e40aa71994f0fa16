// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `store.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::constants::{KIND_POD, KIND_SERVICE};
    use crate::test_support::{pod, service};
    use k8s_openapi::api::core::v1::{Pod, Service};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn ip_of(svc: &Service) -> String {
        svc.spec
            .as_ref()
            .and_then(|s| s.cluster_ip.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_object_key_from_resource() {
        let svc = service("prod", "web", "10.0.0.5", &[]);
        let key = ObjectKey::from_resource(&svc);

        assert_eq!(key, ObjectKey::new("prod", "web"));
        assert_eq!(key.to_string(), "prod/web");
        assert_eq!(ObjectKey::new("", "node-1").to_string(), "node-1");
    }

    #[test]
    fn test_upsert_inserts_then_replaces() {
        let store = ResourceStore::new(KIND_SERVICE);
        assert!(store.is_empty());

        assert!(store
            .upsert(service("prod", "web", "10.0.0.5", &[]))
            .is_none());
        let previous = store.upsert(service("prod", "web", "10.0.0.6", &[]));

        assert_eq!(previous.map(|p| ip_of(&p)).as_deref(), Some("10.0.0.5"));
        assert_eq!(store.len(), 1);
        assert_eq!(ip_of(&store.get("prod", "web").unwrap()), "10.0.0.6");
    }

    #[test]
    fn test_same_name_in_different_namespaces_are_distinct() {
        let store = ResourceStore::new(KIND_SERVICE);
        store.upsert(service("prod", "web", "10.0.0.5", &[]));
        store.upsert(service("staging", "web", "10.1.0.5", &[]));

        assert_eq!(store.len(), 2);
        assert_eq!(ip_of(&store.get("prod", "web").unwrap()), "10.0.0.5");
        assert_eq!(ip_of(&store.get("staging", "web").unwrap()), "10.1.0.5");
    }

    #[test]
    fn test_delete_present_and_absent() {
        let store = ResourceStore::new(KIND_SERVICE);
        store.upsert(service("prod", "web", "10.0.0.5", &[]));

        assert!(store.delete("prod", "web"));
        assert!(!store.delete("prod", "web"));
        assert!(!store.delete("nowhere", "nothing"));
        assert!(store.get("prod", "web").is_none());
    }

    #[test]
    fn test_list_by_namespace() {
        let store = ResourceStore::new(KIND_SERVICE);
        store.upsert(service("prod", "web", "10.0.0.5", &[]));
        store.upsert(service("prod", "db", "10.0.0.6", &[]));
        store.upsert(service("prod-eu", "web", "10.2.0.5", &[]));
        store.upsert(service("staging", "web", "10.1.0.5", &[]));

        let names: Vec<String> = store
            .list_by_namespace("prod")
            .iter()
            .map(|svc| svc.metadata.name.clone().unwrap_or_default())
            .collect();

        assert_eq!(names, vec!["db".to_string(), "web".to_string()]);
        assert!(store.list_by_namespace("kube-system").is_empty());
        assert_eq!(store.list().len(), 4);
    }

    #[test]
    fn test_last_operation_wins_per_key() {
        let store = ResourceStore::new(KIND_SERVICE);

        store.upsert(service("prod", "web", "10.0.0.1", &[]));
        store.replace_all(vec![service("prod", "web", "10.0.0.2", &[])]);
        store.upsert(service("prod", "web", "10.0.0.3", &[]));
        assert_eq!(ip_of(&store.get("prod", "web").unwrap()), "10.0.0.3");

        store.delete("prod", "web");
        store.upsert(service("prod", "web", "10.0.0.4", &[]));
        assert_eq!(ip_of(&store.get("prod", "web").unwrap()), "10.0.0.4");

        store.replace_all(Vec::new());
        assert!(store.get("prod", "web").is_none());
    }

    #[test]
    fn test_upsert_twice_is_idempotent() {
        let store = ResourceStore::new(KIND_POD);
        let p = pod("prod", "web-0", "10.244.0.5");

        store.upsert(p.clone());
        let once: Vec<Pod> = store.list().iter().map(|p| (**p).clone()).collect();
        store.upsert(p);
        let twice: Vec<Pod> = store.list().iter().map(|p| (**p).clone()).collect();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_replace_all_drops_stale_entries() {
        let store = ResourceStore::new(KIND_SERVICE);
        store.upsert(service("prod", "old", "10.0.0.1", &[]));
        store.upsert(service("prod", "web", "10.0.0.5", &[]));

        store.replace_all(vec![
            service("prod", "web", "10.0.0.50", &[]),
            service("prod", "new", "10.0.0.9", &[]),
        ]);

        assert_eq!(store.len(), 2);
        assert!(store.get("prod", "old").is_none());
        assert_eq!(ip_of(&store.get("prod", "web").unwrap()), "10.0.0.50");
    }

    #[test]
    fn test_replace_all_with_duplicate_keys_keeps_last() {
        let store = ResourceStore::new(KIND_SERVICE);
        store.replace_all(vec![
            service("prod", "web", "10.0.0.1", &[]),
            service("prod", "web", "10.0.0.2", &[]),
        ]);

        assert_eq!(store.len(), 1);
        assert_eq!(ip_of(&store.get("prod", "web").unwrap()), "10.0.0.2");
    }

    #[test]
    fn test_clones_share_the_same_table() {
        let writer = ResourceStore::new(KIND_SERVICE);
        let reader = writer.clone();

        writer.upsert(service("prod", "web", "10.0.0.5", &[]));

        assert_eq!(reader.len(), 1);
        assert_eq!(reader.kind(), KIND_SERVICE);
    }

    #[test]
    fn test_readers_never_observe_partial_replace() {
        let store = ResourceStore::new(KIND_SERVICE);
        let generation = |g: usize| -> Vec<Service> {
            (0..50)
                .map(|i| service("prod", &format!("svc-{i}"), &format!("10.{g}.0.{i}"), &[]))
                .collect()
        };
        store.replace_all(generation(0));

        let done = AtomicBool::new(false);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    while !done.load(Ordering::Relaxed) {
                        let snapshot = store.list();
                        assert_eq!(snapshot.len(), 50, "reader saw a torn table");

                        // Every object in one snapshot belongs to the same generation.
                        let prefixes: std::collections::BTreeSet<String> = snapshot
                            .iter()
                            .map(|svc| {
                                let ip = ip_of(svc);
                                ip.split('.').take(2).collect::<Vec<_>>().join(".")
                            })
                            .collect();
                        assert_eq!(prefixes.len(), 1, "reader saw mixed generations");
                    }
                });
            }

            for g in 1..200 {
                store.replace_all(generation(g % 250));
            }
            done.store(true, Ordering::Relaxed);
        });
    }
}
