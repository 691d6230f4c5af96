use crate::config::{Config, CLIENT};
use crate::filter::{ConditionalContentFilter, Resolution};
use crate::functions::Registry;
use crate::host::Host;
use crate::tree::Document;
use serde_json::Value;

/// Directive name the conditional block is written with.
pub const DIRECTIVE: &str = "custver";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionMetadata {
    pub version: &'static str,
    /// Safe to run on different documents at the same time.
    pub parallel_read_safe: bool,
}

/// A document transform plugged into a [`Host`].
pub trait Extension: Send + Sync {
    fn name(&self) -> &'static str;

    /// Declare directives and config options with the host.
    fn register(&self, host: &mut Host) -> ExtensionMetadata;

    /// Called once per document after parsing, before rendering.
    fn resolve(&self, doc: &mut Document, config: &Config) -> Resolution;
}

/// Conditional content blocks selected by the `client` config value.
#[derive(Default)]
pub struct CustVer {
    filter: ConditionalContentFilter,
}

impl CustVer {
    /// Use `registry` for function calls inside expressions.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            filter: ConditionalContentFilter::new(registry),
        }
    }
}

impl Extension for CustVer {
    fn name(&self) -> &'static str {
        DIRECTIVE
    }

    fn register(&self, host: &mut Host) -> ExtensionMetadata {
        host.add_directive(DIRECTIVE);
        host.add_config_value(CLIENT, Value::Null);
        ExtensionMetadata {
            version: env!("CARGO_PKG_VERSION"),
            parallel_read_safe: true,
        }
    }

    fn resolve(&self, doc: &mut Document, config: &Config) -> Resolution {
        self.filter.resolve(doc, config)
    }
}
