//! Error types for inference, code generation and settings.

use thiserror::Error;

use crate::types::NodeId;

#[derive(Debug, Error)]
pub enum InferenceError {
    /// A sample value matches no supported shape kind. Caller contract violation.
    #[error("cannot classify value at `{path}`: {reason}")]
    Classification { path: String, reason: String },

    /// The merge folder reached a state no rule covers. Algorithm defect.
    #[error("internal merge invariant violated: {reason}")]
    InternalMerge { reason: String },

    #[error("value at `{path}` nests deeper than the limit of {limit}")]
    DepthExceeded { path: String, limit: usize },

    /// Two structurally different descriptors produced the same digest.
    #[error("descriptor id {id} is already taken by a different shape")]
    IdCollision { id: NodeId },

    #[error("query id `{id}` must start with a capital letter and contain only [A-Za-z0-9_]")]
    InvalidQueryId { id: String },
}

impl InferenceError {
    pub fn classification(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Classification { path: path.into(), reason: reason.into() }
    }

    pub fn internal_merge(reason: impl Into<String>) -> Self {
        Self::InternalMerge { reason: reason.into() }
    }

    /// True for failures that signal a defect in this crate rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalMerge { .. } | Self::IdCollision { .. })
    }
}

pub type Result<T> = std::result::Result<T, InferenceError>;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("type {0} is referenced but missing from the registry")]
    MissingType(NodeId),

    #[error("`{name}` is not a usable declaration name")]
    InvalidName { name: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings at JSON path {path}: {message}")]
    Invalid { path: String, message: String },
}
