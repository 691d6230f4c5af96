use crate::config::Config;
use crate::errors::{EvalError, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Global evaluation context: the flat namespace expressions resolve names in.
#[derive(Debug, Clone, Default)]
pub struct Context {
    vars: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// All config variables, plus `builder` set to the builder name.
    pub fn from_config(config: &Config) -> Self {
        let mut vars: HashMap<String, Value> = config
            .values()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        vars.insert("builder".into(), Value::String(config.builder().to_string()));
        Self { vars }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&Value> {
        self.vars
            .get(name)
            .ok_or_else(|| EvalError::Name(name.to_string()))
    }
}
