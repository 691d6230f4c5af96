use crate::errors::Error;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Variable that selects the audience of a build. Unset or null means preview.
pub const CLIENT: &str = "client";

pub const DEFAULT_BUILDER: &str = "html";

/// Build configuration visible to condition expressions.
///
/// Values come from, in increasing precedence: option defaults declared by
/// extensions, a JSON config file, and `NAME=VALUE` overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    values: Map<String, Value>,
    builder: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            values: Map::new(),
            builder: DEFAULT_BUILDER.to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of variables.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(values) => Ok(Self {
                values,
                ..Self::default()
            }),
            other => Err(Error::Config(format!(
                "config must be a JSON object, found {}",
                crate::comparison::type_name(&other)
            ))),
        }
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn with_builder(mut self, builder: impl Into<String>) -> Self {
        self.builder = builder.into();
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Register an option default; an explicit value always wins.
    pub fn declare(&mut self, name: &str, default: Value) {
        self.values.entry(name.to_string()).or_insert(default);
    }

    /// Apply a `NAME=VALUE` override. VALUE is read as JSON when it parses,
    /// otherwise taken as a plain string.
    pub fn define(&mut self, assignment: &str) -> Result<(), Error> {
        let (name, raw) = assignment.split_once('=').ok_or_else(|| {
            Error::Config(format!("expected NAME=VALUE, got {assignment:?}"))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Config(format!("missing name in {assignment:?}")));
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        self.set(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn builder(&self) -> &str {
        &self.builder
    }

    /// The selected client, or `None` in preview mode.
    pub fn client(&self) -> Option<&Value> {
        self.values.get(CLIENT).filter(|v| !v.is_null())
    }

    pub fn is_preview(&self) -> bool {
        self.client().is_none()
    }
}
