//! The validated linear chain.

use std::collections::{HashMap, HashSet};

use crate::bridge::BridgeSpec;
use crate::error::{Result, TopologyError};
use crate::node::NodeDescriptor;
use crate::thresholds::WatchdogThresholds;

/// A validated chain of nodes, stored in bring-up order (root first).
#[derive(Debug, Clone)]
pub struct ChainTopology {
    bridges: Vec<BridgeSpec>,
    default_thresholds: WatchdogThresholds,
    nodes: Vec<NodeDescriptor>,
    profiles: HashMap<String, WatchdogThresholds>,
}

impl ChainTopology {
    /// Validates `nodes` and `bridges` and orders the nodes root first.
    ///
    /// # Errors
    ///
    /// Returns an error if the nodes do not form a single linear chain, or a
    /// bridge does not connect a node to its direct upstream.
    pub fn new(nodes: Vec<NodeDescriptor>, bridges: Vec<BridgeSpec>) -> Result<Self> {
        Self::with_profiles(nodes, bridges, WatchdogThresholds::default(), HashMap::new())
    }

    /// Like [`ChainTopology::new`], with named watchdog profiles.
    ///
    /// # Errors
    ///
    /// Additionally returns an error if a node references an unknown profile
    /// or any thresholds are unusable.
    pub fn with_profiles(
        nodes: Vec<NodeDescriptor>,
        bridges: Vec<BridgeSpec>,
        default_thresholds: WatchdogThresholds,
        profiles: HashMap<String, WatchdogThresholds>,
    ) -> Result<Self> {
        default_thresholds.validate("default")?;
        for (name, thresholds) in &profiles {
            thresholds.validate(name)?;
        }

        let nodes = order_chain(nodes)?;

        for node in &nodes {
            node.validate_chain_data_subdir()?;
            if let Some(profile) = &node.profile {
                if !profiles.contains_key(profile) {
                    return Err(TopologyError::UnknownProfile {
                        node: node.name.clone(),
                        profile: profile.clone(),
                    });
                }
            }
        }

        validate_bridges(&nodes, &bridges)?;

        Ok(Self {
            bridges,
            default_thresholds,
            nodes,
            profiles,
        })
    }

    /// Nodes in bring-up order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    /// Looks up a node by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// The node `name` syncs from.
    #[must_use]
    pub fn upstream_of(&self, name: &str) -> Option<&NodeDescriptor> {
        self.node(name)
            .and_then(|node| node.upstream_ref.as_deref())
            .and_then(|upstream| self.node(upstream))
    }

    /// The node that syncs from `name`.
    #[must_use]
    pub fn downstream_of(&self, name: &str) -> Option<&NodeDescriptor> {
        self.nodes
            .iter()
            .find(|node| node.upstream_ref.as_deref() == Some(name))
    }

    /// All configured bridges.
    #[must_use]
    pub fn bridges(&self) -> &[BridgeSpec] {
        &self.bridges
    }

    /// Bridges whose destination is `dest`, lowest cutoff first.
    #[must_use]
    pub fn bridges_into(&self, dest: &str) -> Vec<&BridgeSpec> {
        let mut bridges: Vec<_> = self.bridges.iter().filter(|b| b.dest == dest).collect();
        bridges.sort_by_key(|b| b.cutoff_height);
        bridges
    }

    /// Any bridge configured from `source` into `dest`.
    #[must_use]
    pub fn bridge(&self, source: &str, dest: &str) -> Option<&BridgeSpec> {
        self.bridges
            .iter()
            .find(|b| b.source == source && b.dest == dest)
    }

    /// Watchdog thresholds for `name`, from its profile or the default.
    #[must_use]
    pub fn thresholds_for(&self, name: &str) -> WatchdogThresholds {
        self.node(name)
            .and_then(|node| node.profile.as_ref())
            .and_then(|profile| self.profiles.get(profile))
            .copied()
            .unwrap_or(self.default_thresholds)
    }
}

fn order_chain(nodes: Vec<NodeDescriptor>) -> Result<Vec<NodeDescriptor>> {
    if nodes.is_empty() {
        return Err(TopologyError::EmptyChain);
    }

    let mut names = HashSet::new();
    for node in &nodes {
        if !names.insert(node.name.as_str()) {
            return Err(TopologyError::DuplicateNode(node.name.clone()));
        }
    }

    let mut downstream: HashMap<&str, &str> = HashMap::new();
    let mut roots = Vec::new();

    for node in &nodes {
        match node.upstream_ref.as_deref() {
            None => roots.push(node.name.clone()),
            Some(upstream) if upstream == node.name => {
                return Err(TopologyError::SelfUpstream(node.name.clone()));
            }
            Some(upstream) => {
                if !names.contains(upstream) {
                    return Err(TopologyError::UnknownUpstream {
                        node: node.name.clone(),
                        upstream: upstream.to_string(),
                    });
                }
                if let Some(first) = downstream.insert(upstream, node.name.as_str()) {
                    return Err(TopologyError::Branching {
                        upstream: upstream.to_string(),
                        first: first.to_string(),
                        second: node.name.clone(),
                    });
                }
            }
        }
    }

    if roots.len() != 1 {
        return Err(TopologyError::RootCount(roots));
    }
    let root = roots.remove(0);

    let mut order = vec![root.clone()];
    let mut current = root.as_str();
    while let Some(next) = downstream.get(current) {
        order.push((*next).to_string());
        current = next;
    }

    if order.len() != nodes.len() {
        let reached: HashSet<&str> = order.iter().map(String::as_str).collect();
        let mut unreachable: Vec<String> = nodes
            .iter()
            .filter(|node| !reached.contains(node.name.as_str()))
            .map(|node| node.name.clone())
            .collect();
        unreachable.sort();
        return Err(TopologyError::NotAChain { root, unreachable });
    }

    let mut by_name: HashMap<String, NodeDescriptor> = nodes
        .into_iter()
        .map(|node| (node.name.clone(), node))
        .collect();

    Ok(order
        .iter()
        .filter_map(|name| by_name.remove(name))
        .collect())
}

fn validate_bridges(nodes: &[NodeDescriptor], bridges: &[BridgeSpec]) -> Result<()> {
    let mut seen = HashSet::new();

    for bridge in bridges {
        let find = |name: &str| nodes.iter().find(|node| node.name == name);

        for name in [&bridge.source, &bridge.dest] {
            if find(name).is_none() {
                return Err(TopologyError::BridgeUnknownNode {
                    source_node: bridge.source.clone(),
                    dest: bridge.dest.clone(),
                    missing: name.clone(),
                });
            }
        }

        let actual = find(&bridge.dest).and_then(|dest| dest.upstream_ref.clone());
        if actual.as_deref() != Some(bridge.source.as_str()) {
            return Err(TopologyError::BridgeNotAdjacent {
                source_node: bridge.source.clone(),
                dest: bridge.dest.clone(),
                actual,
            });
        }

        if bridge.effective_repair_cutoff() > bridge.cutoff_height {
            return Err(TopologyError::BridgeRepairCutoff {
                source_node: bridge.source.clone(),
                dest: bridge.dest.clone(),
                cutoff: bridge.cutoff_height,
                repair: bridge.effective_repair_cutoff(),
            });
        }

        if !seen.insert((&bridge.source, &bridge.dest, bridge.cutoff_height)) {
            return Err(TopologyError::DuplicateBridge {
                source_node: bridge.source.clone(),
                dest: bridge.dest.clone(),
                cutoff: bridge.cutoff_height,
            });
        }
    }

    Ok(())
}
