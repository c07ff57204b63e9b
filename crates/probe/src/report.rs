//! Typed probe results.

use std::fmt;

/// A successful health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightReport {
    /// Head block number (`eth_blockNumber`).
    pub height: u64,

    /// Whether the node reports itself as syncing.
    pub is_syncing: bool,

    /// Sync progress (`currentBlock`), if reported.
    pub sync_current: Option<u64>,

    /// Sync target (`highestBlock`), if reported.
    pub sync_target: Option<u64>,

    /// Connected peers. Zero when the node does not report it.
    pub peer_count: u64,
}

impl HeightReport {
    /// A fully synced node at `height`.
    #[must_use]
    pub const fn synced(height: u64, peer_count: u64) -> Self {
        Self {
            height,
            is_syncing: false,
            sync_current: None,
            sync_target: None,
            peer_count,
        }
    }

    /// A syncing node at `height` heading for `target`.
    #[must_use]
    pub const fn syncing(height: u64, target: u64, peer_count: u64) -> Self {
        Self {
            height,
            is_syncing: true,
            sync_current: Some(height),
            sync_target: Some(target),
            peer_count,
        }
    }

    /// The furthest progress the node reports, from either the head block or
    /// the sync status.
    #[must_use]
    pub fn effective_head(&self) -> u64 {
        self.sync_current
            .map_or(self.height, |current| current.max(self.height))
    }

    /// Height the node is trying to reach.
    ///
    /// A node that is not syncing is at its own target. A syncing node that
    /// does not say where it is heading has an unknown target, reported as
    /// `u64::MAX` so it is never considered caught up.
    #[must_use]
    pub fn target(&self) -> u64 {
        if self.is_syncing {
            self.sync_target
                .map_or(u64::MAX, |target| target.max(self.effective_head()))
        } else {
            self.effective_head()
        }
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The node answered.
    Report(HeightReport),

    /// The node could not be reached or gave no usable height.
    Unavailable,
}

impl Probe {
    /// The report, if the node answered.
    #[must_use]
    pub const fn report(&self) -> Option<&HeightReport> {
        match self {
            Self::Report(report) => Some(report),
            Self::Unavailable => None,
        }
    }

    /// Head height, if the node answered.
    #[must_use]
    pub const fn height(&self) -> Option<u64> {
        match self {
            Self::Report(report) => Some(report.height),
            Self::Unavailable => None,
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Report(report) if report.is_syncing => write!(
                f,
                "height {} syncing to {} peers {}",
                report.height,
                report
                    .sync_target
                    .map_or_else(|| "?".to_string(), |t| t.to_string()),
                report.peer_count
            ),
            Self::Report(report) => {
                write!(f, "height {} peers {}", report.height, report.peer_count)
            }
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}
