//! Explicit per-node lifecycle state, shared by the sequencer and watchdogs.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use tracing::info;

/// Lifecycle of a node as seen by the orchestrator.
///
/// `Running` is not terminal: a stalled node goes through `Stalled` and
/// `Recovering` and comes back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// The sequencer has not reached this node yet.
    NotStarted,

    /// The process has been asked to start.
    Starting,

    /// Waiting for the node to stably serve its gate height.
    WaitingForUpstream,

    /// Gated and checked against its upstream.
    Running,

    /// The watchdog saw no progress for a full window.
    Stalled,

    /// The watchdog is restarting or resetting the node.
    Recovering,
}

impl NodeState {
    /// Whether the process is expected to be up, so a watchdog may judge it.
    #[must_use]
    pub const fn is_supervised(self) -> bool {
        matches!(self, Self::Starting | Self::WaitingForUpstream | Self::Running)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::WaitingForUpstream => "waiting_for_upstream",
            Self::Running => "running",
            Self::Stalled => "stalled",
            Self::Recovering => "recovering",
        };
        f.write_str(name)
    }
}

/// State of every node in the chain.
#[derive(Debug, Default)]
pub struct NodeStateTable {
    states: RwLock<HashMap<String, NodeState>>,
}

impl NodeStateTable {
    /// Creates a table with every named node in [`NodeState::NotStarted`].
    #[must_use]
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let states = names
            .into_iter()
            .map(|name| (name.to_string(), NodeState::NotStarted))
            .collect();

        Self {
            states: RwLock::new(states),
        }
    }

    /// Current state of `node`. Unknown nodes read as `NotStarted`.
    #[must_use]
    pub fn get(&self, node: &str) -> NodeState {
        self.states
            .read()
            .get(node)
            .copied()
            .unwrap_or(NodeState::NotStarted)
    }

    /// Moves `node` to `to`, logging the transition with the observed height.
    ///
    /// Returns the previous state.
    pub fn transition(&self, node: &str, to: NodeState, height: Option<u64>) -> NodeState {
        let from = self
            .states
            .write()
            .insert(node.to_string(), to)
            .unwrap_or(NodeState::NotStarted);

        if from != to {
            match height {
                Some(height) => info!(node, %from, %to, height, "node state transition"),
                None => info!(node, %from, %to, "node state transition"),
            }
        }

        from
    }

    /// All states, sorted by node name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, NodeState)> {
        let mut states: Vec<_> = self
            .states
            .read()
            .iter()
            .map(|(name, state)| (name.clone(), *state))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_is_not_started() {
        let table = NodeStateTable::new(["a", "b"]);
        assert_eq!(table.get("a"), NodeState::NotStarted);
        assert_eq!(table.get("missing"), NodeState::NotStarted);
    }

    #[test]
    fn test_transition_returns_previous() {
        let table = NodeStateTable::new(["a"]);

        assert_eq!(
            table.transition("a", NodeState::Starting, None),
            NodeState::NotStarted
        );
        assert_eq!(
            table.transition("a", NodeState::Running, Some(42)),
            NodeState::Starting
        );
        assert_eq!(table.get("a"), NodeState::Running);
    }

    #[test]
    fn test_supervised_states() {
        assert!(!NodeState::NotStarted.is_supervised());
        assert!(NodeState::Starting.is_supervised());
        assert!(NodeState::WaitingForUpstream.is_supervised());
        assert!(NodeState::Running.is_supervised());
        assert!(!NodeState::Stalled.is_supervised());
        assert!(!NodeState::Recovering.is_supervised());
    }
}
