//! Error handling for skein operations.
//!
//! Every fallible operation in the crate returns [`Result<T>`], an alias over
//! [`GraphError`]. Errors fall into two classes that the traversal engine
//! treats differently:
//!
//! - **branch-local** failures ([`GraphError::NotFound`],
//!   [`GraphError::ConnectionFailure`]) prune the edge being explored and
//!   the traversal carries on with its siblings;
//! - **systemic** failures (everything else) abort the whole query.
//!
//! ```rust
//! use skein::GraphError;
//!
//! let err = GraphError::not_found("node", "S1.c.missing");
//! assert!(err.is_branch_local());
//! ```

use std::io;

use thiserror::Error;

/// Result type for skein operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while resolving, routing, or matching over the graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A named service, client, node, or task does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// What kind of entity was looked up.
        kind: &'static str,
        /// The name that failed to resolve.
        name: String,
    },

    /// The connection layer could not reach or keep a session to a service.
    #[error("connection to service '{service}' failed: {reason}")]
    ConnectionFailure {
        /// Target service name.
        service: String,
        /// Transport-level description of the failure.
        reason: String,
    },

    /// A comparison predicate was applied to non-numeric operands.
    #[error("cannot compare {lhs} with {rhs}")]
    ComparisonType {
        /// Rendered left operand.
        lhs: String,
        /// Rendered right operand.
        rhs: String,
    },

    /// The matcher contract was violated (e.g. `take` on a non-accepting frontier).
    #[error("illegal matcher state: {0}")]
    IllegalState(String),

    /// An intermediate step of a property chain did not exist.
    #[error("property '{field}' missing while resolving {path}")]
    MissingProperty {
        /// Rendered property path being evaluated.
        path: String,
        /// The field that could not be found.
        field: String,
    },

    /// Invalid argument or operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error while encoding or decoding a wire frame.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A remote service reported an error with no local counterpart.
    #[error("remote error: {0}")]
    Remote(String),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GraphError {
    /// Shorthand for [`GraphError::NotFound`].
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        GraphError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Shorthand for [`GraphError::ConnectionFailure`].
    pub fn connection(service: impl Into<String>, reason: impl Into<String>) -> Self {
        GraphError::ConnectionFailure {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for structural/routing failures that only abandon the
    /// branch being explored.
    pub fn is_branch_local(&self) -> bool {
        matches!(
            self,
            GraphError::NotFound { .. } | GraphError::ConnectionFailure { .. }
        )
    }

    /// Returns `true` if this error was raised by the connection layer.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, GraphError::ConnectionFailure { .. })
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_failures_are_branch_local() {
        assert!(GraphError::not_found("client", "c").is_branch_local());
        assert!(GraphError::connection("S2", "refused").is_branch_local());
        assert!(!GraphError::IllegalState("take".into()).is_branch_local());
        assert!(!GraphError::ComparisonType {
            lhs: "\"a\"".into(),
            rhs: "1".into()
        }
        .is_branch_local());
    }

    #[test]
    fn display_names_the_missing_entity() {
        let err = GraphError::not_found("node", "S1.c.x");
        assert_eq!(err.to_string(), "node 'S1.c.x' not found");
    }
}
