use thiserror::Error;

use crate::graph::NodeId;
use crate::metrics::{SsspOutput, ValidationReport};

/// Why a graph (or a hierarchy level derived from it) was rejected.
///
/// Raised before any relaxation begins; never recovered from internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidGraphReason {
    #[error("edge #{index} has negative weight {weight}")]
    NegativeWeight { index: usize, weight: f64 },

    #[error("edge #{index} has non-finite weight {weight}")]
    NonFiniteWeight { index: usize, weight: f64 },

    #[error("edge #{index} endpoint {node} is outside [0, {node_count})")]
    EndpointOutOfRange {
        index: usize,
        node: NodeId,
        node_count: usize,
    },

    #[error("edge #{index} weight {weight} exceeds {limit}; path sums could overflow to infinity")]
    WeightTooLarge { index: usize, weight: f64, limit: f64 },

    #[error("source node {node} is outside [0, {node_count})")]
    SourceOutOfRange { node: NodeId, node_count: usize },

    #[error("node count {0} exceeds the addressable node id range")]
    TooManyNodes(usize),

    #[error("contraction step {step} would produce an empty level")]
    DegenerateLevel { step: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid graph: {0}")]
    InvalidGraph(#[from] InvalidGraphReason),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The iteration ceiling was hit with work still pending. `partial`
    /// holds the distances reached so far and is marked unreliable.
    #[error("frontier did not empty within {max_iterations} iterations ({pending} entries pending)")]
    Diverged {
        max_iterations: u64,
        pending: usize,
        partial: Box<SsspOutput>,
    },

    /// The engine disagreed with the exact baseline in exact mode. Both the
    /// comparison and the engine's (wrong) output are handed back untouched.
    #[error(
        "engine distances disagree with the Dijkstra baseline on {} node(s)",
        .report.mismatch_count
    )]
    ValidationMismatch {
        report: Box<ValidationReport>,
        output: Box<SsspOutput>,
    },
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Output carried by the error for diagnostics, if any.
    pub fn output(&self) -> Option<&SsspOutput> {
        match self {
            Error::Diverged { partial, .. } => Some(partial),
            Error::ValidationMismatch { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn is_invalid_graph(&self) -> bool {
        matches!(self, Error::InvalidGraph(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
