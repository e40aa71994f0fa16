// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Query name resolution against the cluster mirror.
//!
//! [`ResolutionEngine::resolve`] turns a query name into answer records:
//!
//! - Reverse names (`*.in-addr.arpa.`, `*.ip6.arpa.`) are decoded to an address
//!   and answered with that address if some Service owns it.
//! - Forward names are matched against the configured zones (first match wins),
//!   the labels left of the zone are decoded by a [`SegmentTranslator`], and the
//!   Service found in the mirror is rendered as one canonical-name record plus
//!   one record per port.
//!
//! "Not found" in any form is an empty answer. The only error is a name that
//! does not decode to a namespace.

use crate::config::ZoneConfig;
use crate::constants::{IPV4_ARPA_SUFFIX, IPV6_ARPA_SUFFIX, SERVICE_RECORD_TYPE};
use crate::dns_errors::ResolveError;
use crate::metrics;
use crate::mirror::ClusterMirror;
use crate::template::SegmentTranslator;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use tracing::debug;

/// One synthesized answer.
///
/// `host` is either the query name (canonical-name record) or a cluster IP
/// (per-port record, or reverse answer). `port` is 0 when not applicable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub host: String,
    pub port: u16,
}

impl AnswerRecord {
    fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Resolves query names using a [`ClusterMirror`] and a [`ZoneConfig`].
pub struct ResolutionEngine {
    mirror: Arc<ClusterMirror>,
    zones: Arc<ZoneConfig>,
    translator: Arc<dyn SegmentTranslator>,
}

impl ResolutionEngine {
    /// Engine decoding names with the template from `zones`.
    #[must_use]
    pub fn new(mirror: Arc<ClusterMirror>, zones: ZoneConfig) -> Self {
        let translator = Arc::new(zones.template().clone());
        Self::with_translator(mirror, zones, translator)
    }

    /// Engine decoding names with a custom translator.
    #[must_use]
    pub fn with_translator(
        mirror: Arc<ClusterMirror>,
        zones: ZoneConfig,
        translator: Arc<dyn SegmentTranslator>,
    ) -> Self {
        Self {
            mirror,
            zones: Arc::new(zones),
            translator,
        }
    }

    /// Mirror this engine reads from.
    #[must_use]
    pub fn mirror(&self) -> &Arc<ClusterMirror> {
        &self.mirror
    }

    /// Zone configuration this engine serves.
    #[must_use]
    pub fn zones(&self) -> &ZoneConfig {
        &self.zones
    }

    /// Resolve `query_name` into answer records.
    ///
    /// `exact` is accepted for callers completing SRV lookups; it does not
    /// currently change the result.
    ///
    /// Does not wait for the mirror to sync: before the first sync completes,
    /// existing services may resolve to an empty answer.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MalformedQuery`] if the name matches a zone but
    /// decodes to an empty namespace.
    pub fn resolve(
        &self,
        query_name: &str,
        exact: bool,
    ) -> Result<Vec<AnswerRecord>, ResolveError> {
        let fqdn = fully_qualified(query_name);

        if is_reverse_name(&fqdn) {
            let records = self.resolve_reverse(&fqdn);
            metrics::record_query("reverse");
            debug!(query = %query_name, answers = records.len(), "Resolved reverse query");
            return Ok(records);
        }

        let result = self.resolve_forward(query_name, &fqdn);
        let outcome = match &result {
            Ok(records) if records.is_empty() => "empty",
            Ok(_) => "answered",
            Err(_) => "malformed",
        };
        metrics::record_query(outcome);
        debug!(query = %query_name, exact, outcome, "Resolved query");

        result
    }

    fn resolve_reverse(&self, fqdn: &str) -> Vec<AnswerRecord> {
        let Some(address) = decode_reverse_name(fqdn) else {
            debug!(query = %fqdn, "Reverse name does not encode an address");
            return Vec::new();
        };

        let address = address.to_string();
        self.mirror
            .lookup_services_by_address(&address)
            .iter()
            .map(|_| AnswerRecord::new(address.as_str(), 0))
            .collect()
    }

    fn resolve_forward(
        &self,
        query_name: &str,
        fqdn: &str,
    ) -> Result<Vec<AnswerRecord>, ResolveError> {
        let Some(segments) = self.zone_segments(fqdn) else {
            return Ok(Vec::new());
        };

        let namespace = self.translator.segments_to_namespace(&segments);
        if namespace.is_empty() {
            return Err(ResolveError::MalformedQuery {
                name: query_name.to_string(),
            });
        }

        if !self.zones.is_namespace_served(&namespace) {
            debug!(query = %query_name, namespace = %namespace, "Namespace not served");
            return Ok(Vec::new());
        }

        let service_name = self.translator.segments_to_service_name(&segments);
        let Some(service) = self
            .mirror
            .lookup_service_in_namespace(&namespace, &service_name)
        else {
            return Ok(Vec::new());
        };

        Ok(service_records(query_name, &service))
    }

    /// Labels left of the first configured zone containing `fqdn`, leftmost first.
    fn zone_segments(&self, fqdn: &str) -> Option<Vec<String>> {
        self.zones.zones().iter().find_map(|zone| {
            if fqdn == zone.as_str() {
                return Some(Vec::new());
            }
            fqdn.strip_suffix(zone.as_str())
                .and_then(|prefix| prefix.strip_suffix('.'))
                .map(|prefix| prefix.split('.').map(str::to_string).collect())
        })
    }

    /// Every name this engine would answer, per zone, for the services currently mirrored.
    #[must_use]
    pub fn served_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (namespace, services) in self.mirror.services_by_namespace() {
            if !self.zones.is_namespace_served(&namespace) {
                continue;
            }
            for service in services {
                for zone in self.zones.zones() {
                    names.push(self.translator.names_to_record_name(
                        &service.name_any(),
                        SERVICE_RECORD_TYPE,
                        &namespace,
                        zone,
                    ));
                }
            }
        }
        names
    }
}

/// Canonical-name record followed by one `{cluster_ip, port}` record per declared port.
///
/// The cluster IP is copied as stored, so headless services carry their empty
/// or `None` address into the port records.
fn service_records(query_name: &str, service: &Service) -> Vec<AnswerRecord> {
    let mut records = vec![AnswerRecord::new(query_name, 0)];

    let Some(spec) = service.spec.as_ref() else {
        return records;
    };
    let cluster_ip = spec.cluster_ip.as_deref().unwrap_or_default();

    for port in spec.ports.iter().flatten() {
        match u16::try_from(port.port) {
            Ok(number) => records.push(AnswerRecord::new(cluster_ip, number)),
            Err(_) => debug!(
                service = %service.name_any(),
                port = port.port,
                "Skipping out-of-range service port"
            ),
        }
    }

    records
}

/// Lowercase, fully-qualified form of a query name.
fn fully_qualified(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    if lower.ends_with('.') {
        lower
    } else {
        format!("{lower}.")
    }
}

fn is_reverse_name(fqdn: &str) -> bool {
    fqdn.ends_with(IPV4_ARPA_SUFFIX) || fqdn.ends_with(IPV6_ARPA_SUFFIX)
}

/// Decode the address encoded in a reverse lookup name.
///
/// `5.0.0.10.in-addr.arpa.` decodes to `10.0.0.5`; IPv6 names must carry all
/// 32 nibbles. Partial names (reverse zones) decode to `None`.
pub fn decode_reverse_name(name: &str) -> Option<IpAddr> {
    let fqdn = fully_qualified(name);

    if let Some(labels) = fqdn.strip_suffix(IPV4_ARPA_SUFFIX) {
        let octets: Vec<u8> = labels
            .split('.')
            .rev()
            .map(|label| label.parse::<u8>().ok())
            .collect::<Option<_>>()?;
        let octets: [u8; 4] = octets.try_into().ok()?;
        return Some(IpAddr::V4(Ipv4Addr::from(octets)));
    }

    if let Some(labels) = fqdn.strip_suffix(IPV6_ARPA_SUFFIX) {
        let nibbles: Vec<&str> = labels.split('.').collect();
        if nibbles.len() != 32 {
            return None;
        }
        let mut value: u128 = 0;
        for nibble in nibbles.iter().rev() {
            if nibble.len() != 1 {
                return None;
            }
            let digit = u128::from_str_radix(nibble, 16).ok()?;
            value = (value << 4) | digit;
        }
        return Some(IpAddr::V6(Ipv6Addr::from(value)));
    }

    None
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
