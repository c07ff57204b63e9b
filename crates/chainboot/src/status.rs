//! Point-in-time view of the chain for operators.

use std::fmt;

use chainboot_bridge::BridgeTask;
use chainboot_probe::Probe;

/// One node's configured position and live probe result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    /// Node name.
    pub name: String,
    /// Upstream node, if any.
    pub upstream: Option<String>,
    /// Minimum serve height.
    pub min_serve_height: u64,
    /// Live probe result.
    pub probe: Probe,
}

/// Nodes in chain order, then bridges with their on-disk state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Nodes, root first.
    pub nodes: Vec<NodeStatus>,
    /// Configured bridges.
    pub bridges: Vec<BridgeTask>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nodes:")?;
        for node in &self.nodes {
            write!(f, "  {}", node.name)?;
            if let Some(upstream) = &node.upstream {
                write!(f, " <- {upstream}")?;
            }
            writeln!(f, " (min serve height {}): {}", node.min_serve_height, node.probe)?;
        }

        if !self.bridges.is_empty() {
            writeln!(f, "bridges:")?;
            for task in &self.bridges {
                writeln!(
                    f,
                    "  {} -> {} [0, {}]: {} ({})",
                    task.source,
                    task.dest,
                    task.cutoff_height,
                    task.state,
                    task.artifact_path.display()
                )?;
            }
        }

        Ok(())
    }
}
