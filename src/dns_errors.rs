// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for kubedns.
//!
//! This module provides specialized error types for:
//! - Kubernetes List/Watch failures observed by reflectors
//! - Query resolution failures surfaced to the protocol layer
//! - Mirror lifecycle misuse (double shutdown)
//! - Configuration and name template problems
//!
//! Note that "not found" is deliberately absent: a query that decodes cleanly but
//! matches nothing resolves to an empty answer list, not an error.

use crate::constants::SHUTDOWN_IN_PROGRESS;
use thiserror::Error;

/// Errors returned by a [`ListWatch`](crate::source::ListWatch) source.
///
/// Reflectors log these and retry; they never reach query callers.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The full List call failed.
    #[error("Failed to list {kind} objects: {reason}")]
    List {
        /// Resource kind being listed (e.g., "Service")
        kind: &'static str,
        /// Underlying API or transport error
        reason: String,
    },

    /// The Watch call could not be established.
    #[error("Failed to watch {kind} objects from resource version {resource_version}: {reason}")]
    Watch {
        /// Resource kind being watched
        kind: &'static str,
        /// Resource version the watch was started from
        resource_version: String,
        /// Underlying API or transport error
        reason: String,
    },

    /// An established Watch stream delivered an error (including 410 Gone).
    #[error("{kind} watch stream failed: {reason}")]
    WatchStream {
        /// Resource kind being watched
        kind: &'static str,
        /// Error reported by the stream
        reason: String,
    },
}

impl SourceError {
    /// Resource kind the failing call was made for.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::List { kind, .. } | Self::Watch { kind, .. } | Self::WatchStream { kind, .. } => {
                kind
            }
        }
    }
}

/// Errors returned by [`ResolutionEngine::resolve`](crate::resolver::ResolutionEngine::resolve).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The query name does not carry enough structure to decode a namespace.
    #[error("Parsing query '{name}' did not produce a namespace value")]
    MalformedQuery {
        /// The query name as received
        name: String,
    },
}

/// Errors returned by [`ClusterMirror`](crate::mirror::ClusterMirror) lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MirrorError {
    /// `stop` was called after a previous `stop` already signalled shutdown.
    #[error("{}", SHUTDOWN_IN_PROGRESS)]
    ShutdownInProgress,
}

/// Errors raised while building configuration.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// The label template could not be parsed.
    #[error("Invalid name template '{template}': {reason}")]
    InvalidTemplate {
        /// Template string as configured
        template: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// A configured zone is not a valid domain name.
    #[error("Invalid zone '{zone}': {reason}")]
    InvalidZone {
        /// Zone as configured
        zone: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read configuration file {path}: {reason}")]
    Read {
        /// Path of the configuration file
        path: String,
        /// Underlying IO error
        reason: String,
    },

    /// The configuration file is not valid YAML for the expected schema.
    #[error("Failed to parse configuration: {reason}")]
    Parse {
        /// Underlying deserialization error
        reason: String,
    },
}
