// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! List+Watch capability consumed by reflectors.
//!
//! [`ListWatch`] is the seam between the synchronization engine and the remote
//! API: the reflector only ever asks for a full snapshot or for a stream of
//! incremental events starting at a resource version. [`KubeListWatch`] is the
//! production implementation backed by [`kube::Api`]; tests plug in in-memory
//! sources instead.

use crate::dns_errors::SourceError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::api::{ListParams, WatchParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::Duration;

/// Upper bound accepted by the API server for a watch timeout.
const MAX_WATCH_TIMEOUT_SECS: u64 = 290;

/// Result of a full List call.
#[derive(Debug, Clone)]
pub struct ObjectSnapshot<K> {
    /// Every object currently known to the API server
    pub items: Vec<K>,
    /// Resource version to start the subsequent watch from
    pub resource_version: String,
}

/// One incremental change delivered by a watch stream.
#[derive(Debug, Clone)]
pub enum WatchEvent<K> {
    /// Object was created
    Added(K),
    /// Object was changed; carries the whole new object
    Modified(K),
    /// Object was removed; carries its last known state
    Deleted(K),
    /// No object change; the stream progressed to this resource version
    Bookmark(String),
}

/// Stream of watch events. Ends when the server closes the watch.
pub type WatchStream<K> = BoxStream<'static, Result<WatchEvent<K>, SourceError>>;

/// List+Watch access to one resource kind.
#[async_trait]
pub trait ListWatch<K>: Send + Sync {
    /// Fetch a full snapshot of every object.
    async fn list(&self) -> Result<ObjectSnapshot<K>, SourceError>;

    /// Open a watch stream delivering changes after `resource_version`.
    async fn watch(&self, resource_version: &str) -> Result<WatchStream<K>, SourceError>;
}

/// [`ListWatch`] implementation on top of the Kubernetes API.
pub struct KubeListWatch<K> {
    api: Api<K>,
    kind: &'static str,
    label_selector: Option<String>,
    watch_timeout_secs: u32,
}

impl<K> KubeListWatch<K>
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
{
    /// Create a source for `kind`, cluster-wide or restricted to one namespace.
    ///
    /// The server-side watch timeout follows `resync_period` so an idle watch is
    /// closed by the server around the time the reflector would resync anyway.
    #[must_use]
    pub fn new(
        client: Client,
        kind: &'static str,
        namespace: Option<&str>,
        label_selector: Option<String>,
        resync_period: Duration,
    ) -> Self {
        let api = match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        let watch_timeout_secs = resync_period.as_secs().clamp(1, MAX_WATCH_TIMEOUT_SECS);

        Self {
            api,
            kind,
            label_selector,
            watch_timeout_secs: u32::try_from(watch_timeout_secs).unwrap_or(u32::MAX),
        }
    }
}

#[async_trait]
impl<K> ListWatch<K> for KubeListWatch<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    async fn list(&self) -> Result<ObjectSnapshot<K>, SourceError> {
        let mut params = ListParams::default();
        if let Some(selector) = &self.label_selector {
            params = params.labels(selector);
        }

        let list = self
            .api
            .list(&params)
            .await
            .map_err(|e| SourceError::List {
                kind: self.kind,
                reason: e.to_string(),
            })?;

        Ok(ObjectSnapshot {
            resource_version: list.metadata.resource_version.unwrap_or_default(),
            items: list.items,
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream<K>, SourceError> {
        let mut params = WatchParams::default().timeout(self.watch_timeout_secs);
        if let Some(selector) = &self.label_selector {
            params = params.labels(selector);
        }

        let kind = self.kind;
        let stream = self
            .api
            .watch(&params, resource_version)
            .await
            .map_err(|e| SourceError::Watch {
                kind,
                resource_version: resource_version.to_string(),
                reason: e.to_string(),
            })?;

        Ok(stream
            .map(move |item| match item {
                Ok(kube::core::WatchEvent::Added(obj)) => Ok(WatchEvent::Added(obj)),
                Ok(kube::core::WatchEvent::Modified(obj)) => Ok(WatchEvent::Modified(obj)),
                Ok(kube::core::WatchEvent::Deleted(obj)) => Ok(WatchEvent::Deleted(obj)),
                Ok(kube::core::WatchEvent::Bookmark(bookmark)) => {
                    Ok(WatchEvent::Bookmark(bookmark.metadata.resource_version))
                }
                Ok(kube::core::WatchEvent::Error(status)) => Err(SourceError::WatchStream {
                    kind,
                    reason: format!("{status:?}"),
                }),
                Err(e) => Err(SourceError::WatchStream {
                    kind,
                    reason: e.to_string(),
                }),
            })
            .boxed())
    }
}
