//! Error types for chorale-core.

use crate::graph::{NodeId, PinId};
use crate::subnode::SubNodeKind;
use thiserror::Error;

/// Error type for graph and backend operations.
///
/// Configuration variants are caller bugs: they are returned before any state
/// is touched. Resource variants come back through the future that started the
/// operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid ramp: {0}")]
    InvalidRamp(String),

    #[error("Invalid cone angles: outer {outer} is smaller than inner {inner}")]
    InvalidConeAngles { inner: f32, outer: f32 },

    #[error("Invalid analyzer setting: {0}")]
    InvalidAnalyzer(String),

    #[error("Invalid parameter '{0}': {1}")]
    InvalidParameter(&'static str, String),

    #[error("Cannot connect {0} to itself")]
    SelfConnection(NodeId),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Unknown pin {0}")]
    UnknownPin(PinId),

    #[error("Node {node} has no {direction} side")]
    RoleMismatch {
        node: NodeId,
        direction: &'static str,
    },

    #[error("Node {node} does not support {capability}")]
    MissingCapability {
        node: NodeId,
        capability: &'static str,
    },

    #[error("Node {node} has no {kind:?} sub-node")]
    MissingSubNode { node: NodeId, kind: SubNodeKind },

    #[error("{0} is disposed")]
    Disposed(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio unlock denied: {0}")]
    UnlockDenied(String),

    #[error("Backend: {0}")]
    Backend(String),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
