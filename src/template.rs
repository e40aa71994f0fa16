// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Translation between query labels and service coordinates.
//!
//! A name template such as `${service}.${namespace}.${zone}` assigns a meaning to
//! each label position of a query name. Given the labels left of the zone,
//! a [`SegmentTranslator`] recovers the namespace, service name and record type,
//! and can render those coordinates back into a record name.
//!
//! ```rust
//! use kubedns::template::{NameTemplate, SegmentTranslator};
//!
//! let template = NameTemplate::default();
//! let segments = vec!["web".to_string(), "prod".to_string()];
//!
//! assert_eq!(template.segments_to_service_name(&segments), "web");
//! assert_eq!(template.segments_to_namespace(&segments), "prod");
//! assert_eq!(
//!     template.names_to_record_name("web", "", "prod", "cluster.local."),
//!     "web.prod.cluster.local."
//! );
//! ```

use crate::constants::DEFAULT_NAME_TEMPLATE;
use crate::dns_errors::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Pure mapping between label segments and `{namespace, service, type}`.
///
/// Every method returns an empty string when the value cannot be decoded.
pub trait SegmentTranslator: Send + Sync {
    /// Namespace encoded in `segments` (labels left of the zone, leftmost first).
    fn segments_to_namespace(&self, segments: &[String]) -> String;

    /// Service name encoded in `segments`.
    fn segments_to_service_name(&self, segments: &[String]) -> String;

    /// Record type encoded in `segments`.
    fn segments_to_type(&self, segments: &[String]) -> String;

    /// Render a fully-qualified record name.
    fn names_to_record_name(
        &self,
        service: &str,
        record_type: &str,
        namespace: &str,
        zone: &str,
    ) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Service,
    Namespace,
    Type,
    Zone,
}

impl Symbol {
    fn parse(element: &str) -> Option<Self> {
        match element {
            "${service}" => Some(Self::Service),
            "${namespace}" => Some(Self::Namespace),
            "${type}" => Some(Self::Type),
            "${zone}" => Some(Self::Zone),
            _ => None,
        }
    }
}

/// Template-driven [`SegmentTranslator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    template: String,
    symbols: Vec<Symbol>,
}

impl Default for NameTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_NAME_TEMPLATE.to_string(),
            symbols: vec![Symbol::Service, Symbol::Namespace, Symbol::Zone],
        }
    }
}

impl NameTemplate {
    /// Parse a template made of `.`-separated symbols.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTemplate`] if an element is not a known
    /// symbol, a symbol repeats, `${service}` or `${namespace}` is missing, or
    /// `${zone}` is not the last element.
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTemplate {
            template: template.to_string(),
            reason,
        };

        let mut symbols = Vec::new();
        for element in template.split('.') {
            let symbol = Symbol::parse(element)
                .ok_or_else(|| invalid(format!("unknown symbol '{element}'")))?;
            if symbols.contains(&symbol) {
                return Err(invalid(format!("symbol '{element}' appears more than once")));
            }
            symbols.push(symbol);
        }

        if symbols.last() != Some(&Symbol::Zone) {
            return Err(invalid("'${zone}' must be the last element".to_string()));
        }
        for (required, name) in [
            (Symbol::Service, "${service}"),
            (Symbol::Namespace, "${namespace}"),
        ] {
            if !symbols.contains(&required) {
                return Err(invalid(format!("missing required symbol '{name}'")));
            }
        }

        Ok(Self {
            template: template.to_string(),
            symbols,
        })
    }

    /// The template string this translator was built from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    fn segment(&self, symbol: Symbol, segments: &[String]) -> String {
        self.symbols
            .iter()
            .position(|s| *s == symbol)
            .and_then(|index| segments.get(index))
            .cloned()
            .unwrap_or_default()
    }
}

impl FromStr for NameTemplate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

impl SegmentTranslator for NameTemplate {
    fn segments_to_namespace(&self, segments: &[String]) -> String {
        self.segment(Symbol::Namespace, segments)
    }

    fn segments_to_service_name(&self, segments: &[String]) -> String {
        self.segment(Symbol::Service, segments)
    }

    fn segments_to_type(&self, segments: &[String]) -> String {
        self.segment(Symbol::Type, segments)
    }

    fn names_to_record_name(
        &self,
        service: &str,
        record_type: &str,
        namespace: &str,
        zone: &str,
    ) -> String {
        let labels: Vec<&str> = self
            .symbols
            .iter()
            .map(|symbol| match symbol {
                Symbol::Service => service,
                Symbol::Namespace => namespace,
                Symbol::Type => record_type,
                Symbol::Zone => zone.trim_end_matches('.'),
            })
            .filter(|label| !label.is_empty())
            .collect();

        format!("{}.", labels.join("."))
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod template_tests;
