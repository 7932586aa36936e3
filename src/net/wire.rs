//! Call envelope and error encoding for cross-service calls.
//!
//! Every request travels as an [`Envelope`]: the originating client plus the
//! operation's arguments. Replies carry `Result<T, WireError>`, so remote
//! failures keep their kind on the caller's side and the engine can still
//! tell branch-local failures from systemic ones.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::location::ClientLocation;

/// A request tagged with the client it originates from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Originating client, forwarded unchanged across hops.
    pub sender: ClientLocation,
    /// Operation arguments.
    pub body: T,
}

/// Serializable form of [`GraphError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireError {
    /// Missing client, node, service or task.
    NotFound {
        /// Entity kind.
        entity: String,
        /// Name that failed to resolve.
        name: String,
    },
    /// A service could not be reached.
    ConnectionFailure {
        /// Target service.
        service: String,
        /// Failure description.
        reason: String,
    },
    /// Non-numeric comparison.
    ComparisonType {
        /// Rendered left operand.
        lhs: String,
        /// Rendered right operand.
        rhs: String,
    },
    /// Matcher contract violation.
    IllegalState {
        /// Description.
        message: String,
    },
    /// Missing intermediate property.
    MissingProperty {
        /// Rendered path.
        path: String,
        /// Missing field.
        field: String,
    },
    /// Any other failure, rendered.
    Other {
        /// Description.
        message: String,
    },
}

impl From<GraphError> for WireError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NotFound { kind, name } => WireError::NotFound {
                entity: kind.to_owned(),
                name,
            },
            GraphError::ConnectionFailure { service, reason } => {
                WireError::ConnectionFailure { service, reason }
            }
            GraphError::ComparisonType { lhs, rhs } => WireError::ComparisonType { lhs, rhs },
            GraphError::IllegalState(message) => WireError::IllegalState { message },
            GraphError::MissingProperty { path, field } => WireError::MissingProperty { path, field },
            other => WireError::Other {
                message: other.to_string(),
            },
        }
    }
}

impl From<WireError> for GraphError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::NotFound { entity, name } => GraphError::NotFound {
                kind: entity_kind(&entity),
                name,
            },
            WireError::ConnectionFailure { service, reason } => {
                GraphError::ConnectionFailure { service, reason }
            }
            WireError::ComparisonType { lhs, rhs } => GraphError::ComparisonType { lhs, rhs },
            WireError::IllegalState { message } => GraphError::IllegalState(message),
            WireError::MissingProperty { path, field } => GraphError::MissingProperty { path, field },
            WireError::Other { message } => GraphError::Remote(message),
        }
    }
}

fn entity_kind(name: &str) -> &'static str {
    match name {
        "service" => "service",
        "client" => "client",
        "node" => "node",
        "task" => "task",
        "task kind" => "task kind",
        _ => "resource",
    }
}

/// Encodes a frame.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes a frame.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}
