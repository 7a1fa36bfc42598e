//! frontier-sssp-core: batched single-source shortest paths.
//!
//! A pure Rust library that relaxes the frontier in bounded batches instead
//! of one node at a time, optionally over a stack of contracted graph
//! levels, and can check every run against a plain Dijkstra baseline.
//!
//! The hierarchy does not speed a run up: coarse distances only mark which
//! fine nodes are provably final, and the finest level still does the full
//! batched relaxation.
//!
//! Exactness rests on two rules: a distance is only ever replaced by a
//! strictly smaller one (bumping the node's generation), and a frontier
//! entry whose generation no longer matches its node is dropped unprocessed.

mod config;
mod error;
mod frontier;
mod graph;
mod hierarchy;
mod metrics;
mod orchestrator;
mod processor;
mod record;
pub mod validator;

pub use config::{EngineConfig, HierarchyConfig};
pub use error::{Error, InvalidGraphReason, Result};
pub use frontier::{BucketFrontier, FrontierStrategy, HeapFrontier, StrategyKind};
pub use graph::{Edge, EdgeIndex, EdgeRecord, Graph, GraphBuilder, NodeId, Weight};
pub use hierarchy::{ContractionError, Hierarchy, HierarchyBuilder, HierarchyLevel};
pub use metrics::{BatchStats, Mismatch, RunMetrics, SsspOutput, ValidationReport};
pub use orchestrator::{run, solve, Orchestrator, RunPhase};
pub use processor::{BatchFrontierProcessor, ProcessorState};
pub use record::{DistanceRecord, DistanceTable, FrontierEntry, Generation};
pub use validator::{compare, dijkstra, validate, BaselineResult};
