use crate::errors::{EvalError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for pluggable functions callable from condition expressions.
///
/// A function is reachable both as `name(x, ...)` and method-style as
/// `x.name(...)`, where the receiver becomes the first argument.
pub trait Function: Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> std::ops::RangeInclusive<usize>;
    fn call(&self, args: &[Value]) -> Result<Value>;
}

/// Thread-safe function registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<&'static str, Arc<dyn Function>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut map: HashMap<&'static str, Arc<dyn Function>> = HashMap::new();
        map.insert("len", Arc::new(builtins::Len));
        map.insert("lower", Arc::new(builtins::Lower));
        map.insert("upper", Arc::new(builtins::Upper));
        map.insert("strip", Arc::new(builtins::Strip));
        map.insert("str", Arc::new(builtins::Str));
        map.insert("bool", Arc::new(builtins::Bool));
        map.insert("startswith", Arc::new(builtins::StartsWith));
        map.insert("endswith", Arc::new(builtins::EndsWith));
        Self { inner: Arc::new(map) }
    }

    pub fn register<F: Function + 'static>(&mut self, f: F) {
        let mut_map = Arc::make_mut(&mut self.inner);
        mut_map.insert(f.name(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.inner.get(name).cloned()
    }

    /// Look up `name` and call it after checking the argument count.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Result<Value>> {
        let f = self.get(name)?;
        let arity = f.arity();
        if !arity.contains(&args.len()) {
            let expected = if arity.start() == arity.end() {
                arity.start().to_string()
            } else {
                format!("{} to {}", arity.start(), arity.end())
            };
            return Some(Err(EvalError::Type(format!(
                "{name}() takes {expected} argument(s) ({} given)",
                args.len()
            ))));
        }
        Some(f.call(args))
    }
}

pub mod builtins {
    use super::*;
    use crate::comparison::{to_display, truthy, type_name};

    fn string_arg<'v>(func: &str, v: &'v Value) -> Result<&'v str> {
        v.as_str().ok_or_else(|| {
            EvalError::Type(format!(
                "{func}() argument must be str, not {}",
                type_name(v)
            ))
        })
    }

    pub struct Len;
    impl Function for Len {
        fn name(&self) -> &'static str { "len" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let len = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(m) => m.len(),
                other => {
                    return Err(EvalError::Type(format!(
                        "object of type '{}' has no len()",
                        type_name(other)
                    )))
                }
            };
            Ok(Value::from(len))
        }
    }

    pub struct Lower;
    impl Function for Lower {
        fn name(&self) -> &'static str { "lower" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(Value::String(string_arg("lower", &args[0])?.to_lowercase()))
        }
    }

    pub struct Upper;
    impl Function for Upper {
        fn name(&self) -> &'static str { "upper" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(Value::String(string_arg("upper", &args[0])?.to_uppercase()))
        }
    }

    pub struct Strip;
    impl Function for Strip {
        fn name(&self) -> &'static str { "strip" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(Value::String(string_arg("strip", &args[0])?.trim().to_string()))
        }
    }

    pub struct Str;
    impl Function for Str {
        fn name(&self) -> &'static str { "str" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(Value::String(to_display(&args[0])))
        }
    }

    pub struct Bool;
    impl Function for Bool {
        fn name(&self) -> &'static str { "bool" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 1..=1 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            Ok(Value::Bool(truthy(&args[0])))
        }
    }

    pub struct StartsWith;
    impl Function for StartsWith {
        fn name(&self) -> &'static str { "startswith" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 2..=2 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let s = string_arg("startswith", &args[0])?;
            let prefix = string_arg("startswith", &args[1])?;
            Ok(Value::Bool(s.starts_with(prefix)))
        }
    }

    pub struct EndsWith;
    impl Function for EndsWith {
        fn name(&self) -> &'static str { "endswith" }
        fn arity(&self) -> std::ops::RangeInclusive<usize> { 2..=2 }
        fn call(&self, args: &[Value]) -> Result<Value> {
            let s = string_arg("endswith", &args[0])?;
            let suffix = string_arg("endswith", &args[1])?;
            Ok(Value::Bool(s.ends_with(suffix)))
        }
    }
}
