use crate::config::Config;
use crate::errors::Error;
use crate::extension::{CustVer, Extension, ExtensionMetadata};
use crate::filter::Resolution;
use crate::markup::{self, MarkupSyntax};
use crate::tree::Document;
use rayon::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub name: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path.display().to_string(), text))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltDocument {
    pub name: String,
    pub output: String,
    pub resolutions: Vec<Resolution>,
}

/// Drives parse → resolve → render for a set of registered extensions.
pub struct Host {
    syntax: MarkupSyntax,
    config: Config,
    extensions: Vec<Box<dyn Extension>>,
    parallel_read_safe: bool,
}

impl Host {
    pub fn new(config: Config) -> Self {
        Self {
            syntax: MarkupSyntax::new(),
            config,
            extensions: Vec::new(),
            parallel_read_safe: true,
        }
    }

    /// A host with the conditional content extension registered.
    pub fn with_custver(config: Config) -> Self {
        let mut host = Self::new(config);
        host.add_extension(CustVer::default());
        host
    }

    pub fn add_extension<E: Extension + 'static>(&mut self, extension: E) -> ExtensionMetadata {
        let metadata = extension.register(self);
        debug!(
            extension = extension.name(),
            version = metadata.version,
            parallel_read_safe = metadata.parallel_read_safe,
            "registered extension"
        );
        self.parallel_read_safe &= metadata.parallel_read_safe;
        self.extensions.push(Box::new(extension));
        metadata
    }

    pub fn add_directive(&mut self, name: &str) {
        self.syntax.add_directive(name);
    }

    /// Declare a config option; values already configured take precedence.
    pub fn add_config_value(&mut self, name: &str, default: Value) {
        self.config.declare(name, default);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn syntax(&self) -> &MarkupSyntax {
        &self.syntax
    }

    pub fn parallel_read_safe(&self) -> bool {
        self.parallel_read_safe
    }

    pub fn parse(&self, name: &str, source: &str) -> Document {
        markup::parse(&self.syntax, name, source)
    }

    /// Run every extension's resolution hook over `doc`.
    pub fn resolve(&self, doc: &mut Document) -> Vec<Resolution> {
        self.extensions
            .iter()
            .map(|ext| ext.resolve(doc, &self.config))
            .collect()
    }

    pub fn build(&self, name: &str, source: &str) -> BuiltDocument {
        let mut doc = self.parse(name, source);
        let resolutions = self.resolve(&mut doc);
        BuiltDocument {
            name: name.to_string(),
            output: markup::render(&doc),
            resolutions,
        }
    }

    /// Build several documents, in parallel when every extension allows it.
    /// Results keep the input order.
    pub fn build_all(&self, sources: &[SourceDocument]) -> Vec<BuiltDocument> {
        if self.parallel_read_safe {
            sources
                .par_iter()
                .map(|s| self.build(&s.name, &s.text))
                .collect()
        } else {
            sources.iter().map(|s| self.build(&s.name, &s.text)).collect()
        }
    }
}
