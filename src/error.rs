use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::paths::CanonicalPath;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("cannot resolve '{}': {source}", path.display())]
    PathResolution {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error reading {path}: {source}")]
    FileRead {
        path: CanonicalPath,
        #[source]
        source: io::Error,
    },

    #[error("error preprocessing {path}: {source}")]
    Transform {
        path: CanonicalPath,
        #[source]
        source: TransformError,
    },

    #[error("error evaluating {path}, {source}")]
    Evaluation {
        path: CanonicalPath,
        #[source]
        source: EvaluationError,
    },
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EvaluationError {
    message: String,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransformError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The member belongs to an object that is only partially attached to the host. Expected while
    /// probing live handles; enumeration skips the member.
    #[error("member '{member}' is not attached: {reason}")]
    Detached { member: String, reason: String },

    #[error("probing member '{member}' failed: {reason}")]
    Unclassified { member: String, reason: String },
}

impl ProbeError {
    pub fn detached(member: impl Into<String>, reason: impl Into<String>) -> Self {
        ProbeError::Detached { member: member.into(), reason: reason.into() }
    }

    pub fn unclassified(member: impl Into<String>, reason: impl Into<String>) -> Self {
        ProbeError::Unclassified { member: member.into(), reason: reason.into() }
    }

    pub fn is_benign(&self) -> bool {
        matches!(self, ProbeError::Detached { .. })
    }
}
