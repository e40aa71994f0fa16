// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # kubedns - Kubernetes service discovery backend for DNS servers
//!
//! kubedns keeps an in-memory mirror of Services, Endpoints and Pods,
//! synchronized from the Kubernetes API through List+Watch, and resolves
//! structured query names such as `web.prod.svc.cluster.local.` against it.
//!
//! ## Overview
//!
//! - A [`reflector::Reflector`] per resource kind lists every object, then
//!   applies watch events to a [`store::ResourceStore`], re-listing whenever the
//!   watch fails, closes, or the resync period elapses.
//! - A [`mirror::ClusterMirror`] owns the three reflectors and exposes typed
//!   lookups plus a run-once / stop-once lifecycle.
//! - A [`resolver::ResolutionEngine`] matches query names against configured
//!   zones, decodes them with a [`template::SegmentTranslator`], and synthesizes
//!   [`resolver::AnswerRecord`]s. Encoding answers on the wire is left to the
//!   embedding DNS server.
//!
//! ## Modules
//!
//! - [`store`] - Thread-safe per-kind object table
//! - [`source`] - List+Watch capability and its Kubernetes implementation
//! - [`reflector`] - List+Watch+resync synchronization loop
//! - [`mirror`] - Cluster mirror aggregating every reflector
//! - [`resolver`] - Query name resolution
//! - [`template`] - Label template translator
//! - [`lifecycle`] - Single-shot shutdown signal
//! - [`config`] - Configuration file and validated settings
//! - [`admin`] - Health, readiness, metrics and debug HTTP endpoints
//!
//! ## Example
//!
//! ```rust,no_run
//! use kubedns::config::{MirrorConfig, ZoneConfig};
//! use kubedns::mirror::ClusterMirror;
//! use kubedns::resolver::ResolutionEngine;
//! use kubedns::template::NameTemplate;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = kube::Client::try_default().await?;
//! let mirror = Arc::new(ClusterMirror::from_client(client, &MirrorConfig::default()));
//! mirror.run();
//!
//! let zones = ZoneConfig::new(&["cluster.local"], None, NameTemplate::default())?;
//! let engine = ResolutionEngine::new(Arc::clone(&mirror), zones);
//!
//! for record in engine.resolve("web.prod.cluster.local.", false)? {
//!     println!("{} {}", record.host, record.port);
//! }
//!
//! mirror.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod backoff;
pub mod config;
pub mod constants;
pub mod dns_errors;
pub mod lifecycle;
pub mod metrics;
pub mod mirror;
pub mod reflector;
pub mod resolver;
pub mod source;
pub mod store;
pub mod template;

#[cfg(test)]
mod test_support;
