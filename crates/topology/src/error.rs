//! Configuration errors. All of these are fatal: the orchestrator refuses to
//! start against a topology it cannot trust.

use thiserror::Error;

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Irrecoverable configuration errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// A bridge names a node that is not part of the chain.
    #[error("bridge {source_node} -> {dest} references unknown node {missing}")]
    BridgeUnknownNode {
        /// Bridge source.
        source_node: String,
        /// Bridge destination.
        dest: String,
        /// The name that could not be resolved.
        missing: String,
    },

    /// A bridge connects two nodes that are not adjacent in the chain.
    #[error("bridge {source_node} -> {dest} does not follow the chain ({dest} has upstream {actual:?})")]
    BridgeNotAdjacent {
        /// Bridge source.
        source_node: String,
        /// Bridge destination.
        dest: String,
        /// The destination's configured upstream.
        actual: Option<String>,
    },

    /// A bridge repair cutoff exceeds the primary cutoff.
    #[error("bridge {source_node} -> {dest} repair cutoff {repair} exceeds cutoff {cutoff}")]
    BridgeRepairCutoff {
        /// Bridge source.
        source_node: String,
        /// Bridge destination.
        dest: String,
        /// Primary cutoff.
        cutoff: u64,
        /// Configured repair cutoff.
        repair: u64,
    },

    /// The same bridge is configured twice.
    #[error("duplicate bridge {source_node} -> {dest} at cutoff {cutoff}")]
    DuplicateBridge {
        /// Bridge source.
        source_node: String,
        /// Bridge destination.
        dest: String,
        /// Cutoff height.
        cutoff: u64,
    },

    /// Two nodes share a name.
    #[error("duplicate node name: {0}")]
    DuplicateNode(String),

    /// No nodes were configured.
    #[error("chain has no nodes")]
    EmptyChain,

    /// The chain-data subdirectory would escape the node's data directory.
    #[error("node {node}: chain data subdirectory {path} must be a non-empty relative path inside the data directory")]
    InvalidChainDataPath {
        /// Node name.
        node: String,
        /// Offending path.
        path: String,
    },

    /// Watchdog thresholds are unusable.
    #[error("watchdog thresholds {profile}: {reason}")]
    InvalidThresholds {
        /// Profile name.
        profile: String,
        /// What is wrong.
        reason: &'static str,
    },

    /// Some nodes are unreachable from the root (the upstream links form a cycle).
    #[error("nodes not reachable from root {root}: {unreachable:?}")]
    NotAChain {
        /// The root node.
        root: String,
        /// Nodes that could not be reached by walking downstream.
        unreachable: Vec<String>,
    },

    /// More than one node has no upstream.
    #[error("chain must have exactly one root, found {0:?}")]
    RootCount(Vec<String>),

    /// A node names itself as its upstream.
    #[error("node {0} lists itself as upstream")]
    SelfUpstream(String),

    /// Two nodes share the same upstream, which would make the graph branch.
    #[error("upstream {upstream} has more than one downstream: {first}, {second}")]
    Branching {
        /// Shared upstream.
        upstream: String,
        /// First downstream.
        first: String,
        /// Second downstream.
        second: String,
    },

    /// A node's profile does not exist.
    #[error("node {node} references unknown watchdog profile {profile}")]
    UnknownProfile {
        /// Node name.
        node: String,
        /// Missing profile.
        profile: String,
    },

    /// A node's upstream does not exist.
    #[error("node {node} references unknown upstream {upstream}")]
    UnknownUpstream {
        /// Node name.
        node: String,
        /// Missing upstream.
        upstream: String,
    },
}
