//! Static bridge configuration.

use serde::{Deserialize, Serialize};

/// A one-time offline migration of blocks `[0, cutoff_height]` from `source`
/// into `dest`, for adjacent nodes that cannot live-peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeSpec {
    /// Node whose canonical range is exported.
    pub source: String,

    /// Node that imports the range. Its upstream must be `source`.
    pub dest: String,

    /// Inclusive upper bound of the migrated range.
    pub cutoff_height: u64,

    /// Cutoff used when the source itself must first be repaired from its own
    /// upstream. Defaults to `cutoff_height`.
    #[serde(default)]
    pub repair_cutoff: Option<u64>,
}

impl BridgeSpec {
    /// Creates a bridge without an explicit repair cutoff.
    #[must_use]
    pub fn new(source: impl Into<String>, dest: impl Into<String>, cutoff_height: u64) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            cutoff_height,
            repair_cutoff: None,
        }
    }

    /// Cutoff for a repair migration into `source`.
    #[must_use]
    pub fn effective_repair_cutoff(&self) -> u64 {
        self.repair_cutoff.unwrap_or(self.cutoff_height)
    }
}
