//! Node descriptors.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TopologyError};

fn default_chain_data_subdir() -> PathBuf {
    PathBuf::from("geth/chaindata")
}

/// One node process in the chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeDescriptor {
    /// Unique node name, also used in marker file names.
    pub name: String,

    /// JSON-RPC endpoint of the node.
    pub rpc_endpoint: Url,

    /// Name of the node this one syncs from, or `None` for the chain root.
    #[serde(default, rename = "upstream")]
    pub upstream_ref: Option<String>,

    /// Height this node must stably serve before it is considered up.
    #[serde(default)]
    pub min_serve_height: u64,

    /// The node's local store. Owned exclusively by the running process.
    pub data_dir: PathBuf,

    /// Chain data inside `data_dir`, the only part a genesis reset deletes.
    #[serde(default = "default_chain_data_subdir")]
    pub chain_data_subdir: PathBuf,

    /// Named watchdog profile, falling back to the default thresholds.
    #[serde(default)]
    pub profile: Option<String>,
}

impl NodeDescriptor {
    /// Creates a root node with no upstream and a zero serve height.
    #[must_use]
    pub fn new(name: impl Into<String>, rpc_endpoint: Url, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            rpc_endpoint,
            upstream_ref: None,
            min_serve_height: 0,
            data_dir: data_dir.into(),
            chain_data_subdir: default_chain_data_subdir(),
            profile: None,
        }
    }

    /// Sets the upstream node.
    #[must_use]
    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream_ref = Some(upstream.into());
        self
    }

    /// Sets the minimum serve height.
    #[must_use]
    pub const fn with_min_serve_height(mut self, height: u64) -> Self {
        self.min_serve_height = height;
        self
    }

    /// Sets the watchdog profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Sets the chain-data subdirectory.
    #[must_use]
    pub fn with_chain_data_subdir(mut self, subdir: impl Into<PathBuf>) -> Self {
        self.chain_data_subdir = subdir.into();
        self
    }

    /// Absolute path of the chain data removed by a genesis reset.
    #[must_use]
    pub fn chain_data_dir(&self) -> PathBuf {
        self.data_dir.join(&self.chain_data_subdir)
    }

    pub(crate) fn validate_chain_data_subdir(&self) -> Result<()> {
        let subdir: &Path = &self.chain_data_subdir;
        let mut components = subdir.components().peekable();
        let non_empty = components.peek().is_some();
        let contained = subdir
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        if non_empty && contained {
            Ok(())
        } else {
            Err(TopologyError::InvalidChainDataPath {
                node: self.name.clone(),
                path: subdir.display().to_string(),
            })
        }
    }
}
