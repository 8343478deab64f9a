//! Namespace-aware XPath queries over parsed XML documents
//!
//! Implements XPath 1.0 expressions as metadata query tables write them:
//! location paths with predicates on every axis but `namespace`, filter
//! expressions such as `(//a)[1]`, unions, boolean, comparison and
//! arithmetic operators, and the core function library. `id()`, `lang()`,
//! variables and the namespace axis are rejected as unsupported.

pub mod eval;
pub mod parser;

use thiserror::Error;

pub use eval::{evaluate, Namespaces};
pub use parser::{compile, Expr};

/// Errors raised while compiling or evaluating a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XPathError {
    #[error("XPath syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    /// Valid XPath 1.0 that this engine does not implement
    #[error("Unsupported XPath construct at offset {position}: {construct}")]
    Unsupported { position: usize, construct: String },

    #[error("Undefined namespace prefix '{0}'")]
    UnboundPrefix(String),

    #[error("XPath type error: {0}")]
    Type(String),
}

impl XPathError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        XPathError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(position: usize, construct: impl Into<String>) -> Self {
        XPathError::Unsupported {
            position,
            construct: construct.into(),
        }
    }
}

/// Compile and evaluate `query` against `doc`.
///
/// A node-set result yields the string value of every selected node in
/// document order; any other result yields its single string value.
pub fn query(
    doc: &roxmltree::Document<'_>,
    query: &str,
    namespaces: &Namespaces,
) -> Result<Vec<String>, XPathError> {
    let expr = compile(query)?;
    evaluate(&expr, doc, namespaces)
}
