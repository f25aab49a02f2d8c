//! External diagram-compiler boundary
//!
//! The engine treats the diagram description language as opaque: a compiler
//! takes a description string plus a caller-chosen element id and produces
//! serialized vector markup, asynchronously and with unbounded latency. Real
//! hosts plug in a mermaid/D2/graphviz backend; tests and the demo CLI plug
//! in stubs.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Compiled, displayable vector representation of one diagram description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualArtifact {
    /// Element id the compiler was asked to use (unique per render)
    pub id: String,
    /// Serialized vector markup, opaque to the engine
    pub svg: String,
}

impl VisualArtifact {
    pub fn new(id: impl Into<String>, svg: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            svg: svg.into(),
        }
    }
}

/// Fresh element id for one compile invocation.
pub fn new_artifact_id() -> String {
    format!("diagram-{}", Uuid::new_v4().simple())
}

/// Why a compile produced no artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The compiler rejected the description
    #[error("syntax error: {message}")]
    Syntax { message: String },

    /// The compiler itself failed (transport, process, ...)
    #[error("compiler error: {0}")]
    Io(String),

    /// The compiler gave up before producing a result
    #[error("compile cancelled")]
    Cancelled,
}

/// Asynchronous diagram compiler.
///
/// `compile` must be non-blocking: it returns a future the engine awaits on a
/// spawned task. The engine never interprets `source` or the returned markup.
pub trait DiagramCompiler: Send + Sync {
    fn compile(
        &self,
        id: &str,
        source: &str,
    ) -> BoxFuture<'static, Result<VisualArtifact, CompileError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_ids_are_unique() {
        let a = new_artifact_id();
        let b = new_artifact_id();
        assert!(a.starts_with("diagram-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_error_messages_are_nonempty() {
        let err = CompileError::Syntax {
            message: "unexpected token".into(),
        };
        assert!(err.to_string().contains("unexpected token"));
        assert!(!CompileError::Cancelled.to_string().is_empty());
    }
}
