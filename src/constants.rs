// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for kubedns.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Resource Kind Constants
// ============================================================================

/// Kind name for core/v1 `Service`
pub const KIND_SERVICE: &str = "Service";

/// Kind name for core/v1 `Endpoints`
pub const KIND_ENDPOINTS: &str = "Endpoints";

/// Kind name for core/v1 `Pod`
pub const KIND_POD: &str = "Pod";

// ============================================================================
// Synchronization Constants
// ============================================================================

/// Default interval between full re-lists of every mirrored kind (30 seconds)
pub const DEFAULT_RESYNC_PERIOD_SECS: u64 = 30;

/// Initial delay before retrying a failed List or Watch call (100ms)
pub const RETRY_INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Backoff multiplier (exponential growth factor)
pub const RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
pub const RETRY_RANDOMIZATION_FACTOR: f64 = 0.1;

// ============================================================================
// DNS Constants
// ============================================================================

/// Default label template mapping query labels to service coordinates
pub const DEFAULT_NAME_TEMPLATE: &str = "${service}.${namespace}.${zone}";

/// Default zone served when neither the configuration file nor the CLI names one
pub const DEFAULT_ZONE: &str = "cluster.local.";

/// Reverse lookup suffix for IPv4 addresses
pub const IPV4_ARPA_SUFFIX: &str = ".in-addr.arpa.";

/// Reverse lookup suffix for IPv6 addresses
pub const IPV6_ARPA_SUFFIX: &str = ".ip6.arpa.";

/// Record type rendered for services in name listings
pub const SERVICE_RECORD_TYPE: &str = "svc";

// ============================================================================
// Admin Server Constants
// ============================================================================

/// Default listen address of the admin HTTP server (health, readiness, metrics)
pub const DEFAULT_ADMIN_ADDR: &str = "0.0.0.0:8080";

/// Error message returned when shutdown is requested more than once
pub const SHUTDOWN_IN_PROGRESS: &str = "shutdown already in progress";
