// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration for kubedns.
//!
//! The configuration file is YAML with camelCase keys:
//!
//! ```yaml
//! zones: ["cluster.local"]
//! namespaces: ["prod"]            # optional allow-list; omit to serve all namespaces
//! template: "${service}.${namespace}.${zone}"
//! resyncPeriodSecs: 30
//! watchNamespace: null            # optional; omit to mirror every namespace
//! labelSelector: null             # optional label selector for List/Watch
//! adminAddr: "0.0.0.0:8080"
//! ```
//!
//! [`Config`] is the raw, deserialized form. [`ZoneConfig`] (read by every query)
//! and [`MirrorConfig`] (read by the reflectors) are the validated values built
//! from it; both are immutable once constructed.

use crate::constants::{DEFAULT_ADMIN_ADDR, DEFAULT_NAME_TEMPLATE, DEFAULT_RESYNC_PERIOD_SECS};
use crate::dns_errors::ConfigError;
use crate::template::NameTemplate;
use hickory_proto::rr::Name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Raw configuration as read from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Zones to serve; empty means "use the zones given on the command line".
    #[serde(default)]
    pub zones: Vec<String>,

    /// Namespace allow-list; `None` serves every namespace.
    #[serde(default)]
    pub namespaces: Option<Vec<String>>,

    /// Label template mapping query labels to service coordinates.
    #[serde(default = "default_template")]
    pub template: String,

    /// Seconds between full re-lists.
    #[serde(default = "default_resync_period_secs")]
    pub resync_period_secs: u64,

    /// Restrict the mirror to one namespace; `None` mirrors all namespaces.
    #[serde(default)]
    pub watch_namespace: Option<String>,

    /// Label selector applied to every List and Watch call.
    #[serde(default)]
    pub label_selector: Option<String>,

    /// Listen address of the admin HTTP server.
    #[serde(default = "default_admin_addr")]
    pub admin_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zones: Vec::new(),
            namespaces: None,
            template: default_template(),
            resync_period_secs: default_resync_period_secs(),
            watch_namespace: None,
            label_selector: None,
            admin_addr: default_admin_addr(),
        }
    }
}

fn default_template() -> String {
    DEFAULT_NAME_TEMPLATE.to_string()
}

fn default_resync_period_secs() -> u64 {
    DEFAULT_RESYNC_PERIOD_SECS
}

fn default_admin_addr() -> SocketAddr {
    DEFAULT_ADMIN_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080)))
}

impl Config {
    /// Parse configuration from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document does not match the schema.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Read and parse a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its content is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Build the validated zone configuration.
    ///
    /// `fallback_zones` is used when the file lists no zones, mirroring how a
    /// server block's own hosts become the served zones.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for invalid zones or an invalid template.
    pub fn zone_config(&self, fallback_zones: &[String]) -> Result<ZoneConfig, ConfigError> {
        let zones = if self.zones.is_empty() {
            fallback_zones
        } else {
            &self.zones
        };
        ZoneConfig::new(
            zones,
            self.namespaces.clone(),
            NameTemplate::parse(&self.template)?,
        )
    }

    /// Build the reflector configuration.
    #[must_use]
    pub fn mirror_config(&self) -> MirrorConfig {
        MirrorConfig {
            resync_period: Duration::from_secs(self.resync_period_secs.max(1)),
            watch_namespace: self.watch_namespace.clone(),
            label_selector: self.label_selector.clone(),
        }
    }
}

/// Normalize a zone to lowercase, fully-qualified form (`"Cluster.Local"` → `"cluster.local."`).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidZone`] if the zone is empty or not a valid domain name.
pub fn normalize_zone(zone: &str) -> Result<String, ConfigError> {
    let trimmed = zone.trim().trim_end_matches('.').to_ascii_lowercase();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidZone {
            zone: zone.to_string(),
            reason: "zone must not be empty".to_string(),
        });
    }

    let fqdn = format!("{trimmed}.");
    Name::from_ascii(&fqdn).map_err(|e| ConfigError::InvalidZone {
        zone: zone.to_string(),
        reason: e.to_string(),
    })?;

    Ok(fqdn)
}

/// Zones, namespace allow-list and name template used by the resolution engine.
#[derive(Debug, Clone)]
pub struct ZoneConfig {
    zones: Vec<String>,
    namespaces: Option<BTreeSet<String>>,
    template: NameTemplate,
}

impl ZoneConfig {
    /// Validate and normalize zone configuration.
    ///
    /// Zones keep their configured order (first match wins during resolution);
    /// duplicates after normalization are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidZone`] if no zone is given or a zone is invalid.
    pub fn new<S: AsRef<str>>(
        zones: &[S],
        namespaces: Option<Vec<String>>,
        template: NameTemplate,
    ) -> Result<Self, ConfigError> {
        let mut normalized: Vec<String> = Vec::with_capacity(zones.len());
        for zone in zones {
            let zone = normalize_zone(zone.as_ref())?;
            if !normalized.contains(&zone) {
                normalized.push(zone);
            }
        }

        if normalized.is_empty() {
            return Err(ConfigError::InvalidZone {
                zone: String::new(),
                reason: "at least one zone must be configured".to_string(),
            });
        }

        Ok(Self {
            zones: normalized,
            namespaces: namespaces.map(|list| list.into_iter().collect()),
            template,
        })
    }

    /// Configured zones, normalized, in configuration order.
    #[must_use]
    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    /// Namespace allow-list, if one is configured.
    #[must_use]
    pub fn namespaces(&self) -> Option<&BTreeSet<String>> {
        self.namespaces.as_ref()
    }

    /// Whether queries for `namespace` may be answered.
    #[must_use]
    pub fn is_namespace_served(&self, namespace: &str) -> bool {
        self.namespaces
            .as_ref()
            .is_none_or(|allowed| allowed.contains(namespace))
    }

    /// Name template used to decode query labels.
    #[must_use]
    pub fn template(&self) -> &NameTemplate {
        &self.template
    }
}

/// Settings shared by every reflector of a [`ClusterMirror`](crate::mirror::ClusterMirror).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    /// Interval after which an open watch is abandoned and a full List is performed
    pub resync_period: Duration,
    /// Restrict List/Watch to one namespace; `None` mirrors all namespaces
    pub watch_namespace: Option<String>,
    /// Label selector applied to List/Watch calls
    pub label_selector: Option<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            resync_period: Duration::from_secs(DEFAULT_RESYNC_PERIOD_SECS),
            watch_namespace: None,
            label_selector: None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
