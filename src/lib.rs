//! Conditional content blocks for documentation sources.
//!
//! A `custver` block is kept, dropped or annotated depending on an
//! expression evaluated against build configuration:
//!
//! ```text
//! .. custver:: client in ('Company A', 'Company B')
//!
//!    This stuff is only included for Company A and Company B.
//! ```
//!
//! With `client` unset every block is shown together with its condition,
//! so authors can review all variants at once.
pub mod errors;
pub mod config;
pub mod context;
pub mod functions;  // plugin model
pub mod expression;
pub mod tree;
pub mod markup;
pub mod filter;
pub mod extension;
pub mod host;
mod parser;
mod comparison;

use serde_json::Value;
use errors::Result;
use context::Context;
use functions::Registry;

pub use comparison::truthy;
pub use config::Config;
pub use errors::{Error, EvalError};
pub use extension::{CustVer, Extension, ExtensionMetadata};
pub use filter::{ConditionalContentFilter, Outcome, Resolution};
pub use host::{BuiltDocument, Host, SourceDocument};
pub use tree::{Document, Location, NodeId, NodeKind};

/// Parses and evaluates condition expressions against a [`Context`].
#[derive(Clone)]
pub struct Evaluator {
    registry: Registry,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Registry::with_builtins())
    }
}

impl Evaluator {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn eval(&self, expr: &str, ctx: &Context) -> Result<Value> {
        let ast = expression::parse_expr(expr)?;
        expression::eval_ast(&ast, ctx, &self.registry)
    }

    pub fn eval_bool(&self, expr: &str, ctx: &Context) -> Result<bool> {
        self.eval(expr, ctx).map(|v| truthy(&v))
    }
}

/// Convenience: evaluate with built-in registry.
pub fn eval(expr: &str, ctx: &Context) -> Result<Value> {
    Evaluator::default().eval(expr, ctx)
}

/// Convenience: build one document with only the `custver` extension.
pub fn process(name: &str, source: &str, config: Config) -> String {
    Host::with_custver(config).build(name, source).output
}
