use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing or evaluating a condition expression.
///
/// The display form mirrors the exception text authors already know from
/// conditional directives, e.g. `NameError: name 'client' is not defined`.
/// These never abort a build: the filter turns them into inline error
/// placeholders.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("SyntaxError: {msg} (at offset {offset})")]
    Syntax { msg: String, offset: usize },

    #[error("NameError: name '{0}' is not defined")]
    Name(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("AttributeError: {0}")]
    Attribute(String),

    #[error("KeyError: {0}")]
    Key(String),

    #[error("IndexError: {0}")]
    Index(String),

    #[error("OverflowError: {0}")]
    Overflow(String),
}

impl EvalError {
    /// Exception-style name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::Syntax { .. } => "SyntaxError",
            EvalError::Name(_) => "NameError",
            EvalError::Type(_) => "TypeError",
            EvalError::Attribute(_) => "AttributeError",
            EvalError::Key(_) => "KeyError",
            EvalError::Index(_) => "IndexError",
            EvalError::Overflow(_) => "OverflowError",
        }
    }
}

// Type alias for results that use `EvalError` as the error type
pub type Result<T> = std::result::Result<T, EvalError>;

/// Failures of the host layer: loading sources and configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
