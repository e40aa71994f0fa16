// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for kubedns.
//!
//! This module provides metrics collection with the namespace prefix `kubedns_`.
//!
//! # Metrics Categories
//!
//! - **Reflector Metrics** - List calls, watch events, resyncs and sync state per kind
//! - **Store Metrics** - Number of mirrored objects per kind
//! - **Query Metrics** - Resolution outcomes
//!
//! # Example
//!
//! ```rust,no_run
//! use kubedns::metrics::{gather_metrics, record_query};
//!
//! record_query("answered");
//! let text = gather_metrics().unwrap();
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all kubedns metrics
const METRICS_NAMESPACE: &str = "kubedns";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reflector Metrics
// ============================================================================

/// Total number of full List calls by kind and outcome
///
/// Labels:
/// - `kind`: Resource kind (e.g., `Service`, `Pod`)
/// - `outcome`: `success` or `error`
pub static REFLECTOR_LISTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reflector_lists_total"),
        "Total number of full List calls by resource kind and outcome",
    );
    let counter = CounterVec::new(opts, &["kind", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of full List calls in seconds
///
/// Labels:
/// - `kind`: Resource kind
pub static REFLECTOR_LIST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reflector_list_duration_seconds"),
        "Duration of full List calls in seconds by resource kind",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of watch events applied to stores
///
/// Labels:
/// - `kind`: Resource kind
/// - `event`: `added`, `modified`, `deleted` or `bookmark`
pub static REFLECTOR_WATCH_EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reflector_watch_events_total"),
        "Total number of watch events applied by resource kind and event type",
    );
    let counter = CounterVec::new(opts, &["kind", "event"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of resyncs by kind and the reason the watch ended
///
/// Labels:
/// - `kind`: Resource kind
/// - `reason`: `interval`, `closed`, `stream_error` or `watch_error`
pub static REFLECTOR_RESYNCS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reflector_resyncs_total"),
        "Total number of resyncs by resource kind and reason",
    );
    let counter = CounterVec::new(opts, &["kind", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Whether a reflector has completed its initial sync (1 = synced, 0 = not yet)
///
/// Labels:
/// - `kind`: Resource kind
pub static REFLECTOR_SYNCED: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reflector_synced"),
        "Whether the reflector completed its initial sync (1 = synced, 0 = not yet)",
    );
    let gauge = GaugeVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Store Metrics
// ============================================================================

/// Number of objects held in each store
///
/// Labels:
/// - `kind`: Resource kind
pub static STORE_OBJECTS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_store_objects"),
        "Number of mirrored objects by resource kind",
    );
    let gauge = GaugeVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Query Metrics
// ============================================================================

/// Total number of resolved queries by outcome
///
/// Labels:
/// - `outcome`: `answered`, `empty`, `malformed` or `reverse`
pub static QUERIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_queries_total"),
        "Total number of resolved queries by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful List call
///
/// # Arguments
/// * `kind` - Resource kind listed
/// * `duration` - Duration of the call
pub fn record_list_success(kind: &str, duration: Duration) {
    REFLECTOR_LISTS_TOTAL
        .with_label_values(&[kind, "success"])
        .inc();
    REFLECTOR_LIST_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record a failed List call
pub fn record_list_error(kind: &str, duration: Duration) {
    REFLECTOR_LISTS_TOTAL
        .with_label_values(&[kind, "error"])
        .inc();
    REFLECTOR_LIST_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record one applied watch event
///
/// # Arguments
/// * `kind` - Resource kind
/// * `event` - Event type (`added`, `modified`, `deleted`, `bookmark`)
pub fn record_watch_event(kind: &str, event: &str) {
    REFLECTOR_WATCH_EVENTS_TOTAL
        .with_label_values(&[kind, event])
        .inc();
}

/// Record a resync and why the preceding watch ended
pub fn record_resync(kind: &str, reason: &str) {
    REFLECTOR_RESYNCS_TOTAL
        .with_label_values(&[kind, reason])
        .inc();
}

/// Report a reflector as not yet synced so the series exists from startup
pub fn record_unsynced(kind: &str) {
    REFLECTOR_SYNCED.with_label_values(&[kind]).set(0.0);
}

/// Record that a reflector completed its initial sync
pub fn record_synced(kind: &str) {
    REFLECTOR_SYNCED.with_label_values(&[kind]).set(1.0);
}

/// Record the current number of objects in a store
pub fn record_store_size(kind: &str, len: usize) {
    #[allow(clippy::cast_precision_loss)]
    STORE_OBJECTS.with_label_values(&[kind]).set(len as f64);
}

/// Record the outcome of one query
pub fn record_query(outcome: &str) {
    QUERIES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;
