// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error taxonomy for graph authoring and evaluation.

use crate::fingerprint::Fingerprint;
use crate::node::NodeId;
use crate::plug::PlugId;
use crate::value::PlugType;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised by the graph engine.
///
/// Errors are `Clone` because a single failed computation is handed to
/// every requester that was waiting on the same fingerprint.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Incompatible connection or value type
    #[error("Type mismatch for \"{plug}\": expected {expected:?}, found {found:?}")]
    TypeMismatch {
        /// Name of the plug being assigned
        plug: String,
        /// Type the plug requires
        expected: PlugType,
        /// Type that was offered
        found: PlugType,
    },

    /// Misuse of a read-only, input-less or otherwise restricted plug
    #[error("Permission denied for \"{plug}\": {reason}")]
    PermissionDenied {
        /// Name of the plug
        plug: String,
        /// What was refused
        reason: String,
    },

    /// A referenced parameter, shader or attribute does not exist
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// A value type has no known plug or data mapping
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Node logic failed while computing a plug
    #[error("Failed to compute \"{plug}\": {source}")]
    ComputeFailure {
        /// Full name of the innermost plug whose compute failed
        plug: String,
        /// The error raised by the node
        #[source]
        source: Box<GraphError>,
    },

    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Plug not found
    #[error("Plug not found: {0:?}")]
    PlugNotFound(PlugId),

    /// Named plug not found on a node
    #[error("Node \"{node}\" has no plug \"{path}\"")]
    PlugPathNotFound {
        /// Node name
        node: String,
        /// Relative plug path that was requested
        path: String,
    },

    /// Node type is not registered
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Evaluation re-entered a plug under the same context
    #[error("Cycle detected while evaluating \"{0}\"")]
    Cycle(String),

    /// A cached fingerprint no longer matches a fresh hash
    #[error("Hash mismatch for \"{plug}\": cached {cached}, recomputed {fresh}")]
    HashMismatch {
        /// Full name of the plug
        plug: String,
        /// Fingerprint served from the hash cache
        cached: Fingerprint,
        /// Fingerprint computed from scratch
        fresh: Fingerprint,
    },

    /// Plug promotion was refused
    #[error("Cannot promote \"{plug}\": {reason}")]
    Promotion {
        /// Full name of the plug
        plug: String,
        /// Why promotion failed
        reason: String,
    },

    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Configuration could not be read or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// Custom error raised by node logic
    #[error("{0}")]
    Custom(String),
}

impl GraphError {
    /// Create a custom error
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Wrap this error as a compute failure of `plug`.
    ///
    /// Failures are attributed to the innermost plug only, so an error that
    /// is already a compute failure is returned unchanged.
    pub fn in_compute_of(self, plug: impl Into<String>) -> Self {
        match self {
            Self::ComputeFailure { .. } | Self::Cycle(_) | Self::HashMismatch { .. } => self,
            other => Self::ComputeFailure {
                plug: plug.into(),
                source: Box::new(other),
            },
        }
    }

    /// The error at the root of any compute failure chain
    pub fn root_cause(&self) -> &GraphError {
        match self {
            Self::ComputeFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
