use crate::orchestrator::Phase;
use docent_capture::CaptureError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Parent {parent} of node {id} is not in the graph")]
    MissingParent { id: String, parent: String },

    #[error("Node {0} has no parent but the graph already has a root")]
    DetachedNode(String),

    #[error("Invalid graph JSON: {0}")]
    Serialization(String),
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("No decision oracle configured")]
    Unavailable,

    #[error("Oracle request failed: {0}")]
    Request(String),
}

/// Failure of a Finalize-phase collaborator (renderer, narrator).
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Error surfaced by a single orchestrator phase.
#[derive(Error, Debug)]
pub enum PhaseError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("{phase} phase could not recover: {reason}")]
    Unrecoverable { phase: Phase, reason: String },

    #[error("Circuit breaker open after {faults} faults")]
    CircuitOpen { faults: u32 },

    #[error("Exploration found no pages to plan a tour from")]
    EmptyPlan,
}

impl PhaseError {
    /// Whether this error already reflects a recovery verdict and must not be fed back into recovery
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PhaseError::Unrecoverable { .. } | PhaseError::CircuitOpen { .. }
        )
    }
}
