//! Bridge task state, derived from disk.

use std::fmt;
use std::path::PathBuf;

use chainboot_topology::BridgeSpec;

use crate::layout::MarkerLayout;

/// Progress of one bridge. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BridgeState {
    /// Nothing on disk yet.
    Pending,
    /// An `.exporting` marker exists. It may be stale from a crash.
    Exporting,
    /// An `.importing` marker exists. It may be stale from a crash.
    Importing,
    /// The done marker exists.
    Done,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Exporting => "exporting",
            Self::Importing => "importing",
            Self::Done => "done",
        })
    }
}

/// A bridge and its last observed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeTask {
    /// Exporting node.
    pub source: String,
    /// Importing node.
    pub dest: String,
    /// Inclusive upper bound of the range.
    pub cutoff_height: u64,
    /// Last observed state.
    pub state: BridgeState,
    /// Where the exported range is written.
    pub artifact_path: PathBuf,
}

impl BridgeTask {
    /// A task for `spec`, with its state read from disk.
    #[must_use]
    pub fn new(spec: &BridgeSpec, layout: &MarkerLayout) -> Self {
        Self::for_range(&spec.source, &spec.dest, spec.cutoff_height, layout)
    }

    /// A task for an arbitrary range, with its state read from disk.
    #[must_use]
    pub fn for_range(source: &str, dest: &str, cutoff_height: u64, layout: &MarkerLayout) -> Self {
        let mut task = Self {
            source: source.to_string(),
            dest: dest.to_string(),
            cutoff_height,
            state: BridgeState::Pending,
            artifact_path: layout.artifact(source, cutoff_height),
        };
        task.refresh(layout);
        task
    }

    /// Derives the durable state from the marker files.
    #[must_use]
    pub fn observe(&self, layout: &MarkerLayout) -> BridgeState {
        if layout.done_marker(&self.dest, self.cutoff_height).exists() {
            BridgeState::Done
        } else if layout
            .importing_marker(&self.dest, self.cutoff_height)
            .exists()
        {
            BridgeState::Importing
        } else if layout
            .exporting_marker(&self.source, self.cutoff_height)
            .exists()
        {
            BridgeState::Exporting
        } else {
            BridgeState::Pending
        }
    }

    /// Re-reads the state from disk.
    pub fn refresh(&mut self, layout: &MarkerLayout) {
        self.state = self.observe(layout);
    }

    /// Whether the done marker has been observed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == BridgeState::Done
    }
}
