//! Scripted in-memory implementation of the health prober for testing purposes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chainboot_probe::{HealthProber, HeightReport, Probe};
use chainboot_topology::NodeDescriptor;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct NodeScript {
    probes: VecDeque<Probe>,
    last: Option<Probe>,
    probe_count: usize,
}

/// A prober that replays a per-node script of probe results.
///
/// Each call to [`HealthProber::probe`] consumes the next scripted result; once
/// the script runs out the last result repeats. Nodes without a script are
/// unavailable.
///
/// Block hashes default to `0x{node}-{height}` for any height at or below the
/// node's last reported height, and `None` above it. Individual hashes can be
/// overridden, including with a sequence to simulate reorgs.
#[derive(Debug, Default)]
pub struct ScriptedProber {
    hashes: Mutex<HashMap<(String, u64), VecDeque<Option<String>>>>,
    scripts: Mutex<HashMap<String, NodeScript>>,
}

impl ScriptedProber {
    /// Creates an empty prober.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends probe results to `node`'s script.
    pub fn push(&self, node: &str, probes: impl IntoIterator<Item = Probe>) {
        self.scripts
            .lock()
            .entry(node.to_string())
            .or_default()
            .probes
            .extend(probes);
    }

    /// Appends synced reports at each of `heights` with one peer.
    pub fn push_heights(&self, node: &str, heights: impl IntoIterator<Item = u64>) {
        self.push(
            node,
            heights
                .into_iter()
                .map(|height| Probe::Report(HeightReport::synced(height, 1))),
        );
    }

    /// Drops any remaining script for `node` and makes it report `probe` from
    /// now on.
    pub fn set(&self, node: &str, probe: Probe) {
        let mut scripts = self.scripts.lock();
        let script = scripts.entry(node.to_string()).or_default();
        script.probes.clear();
        script.last = Some(probe);
    }

    /// Overrides the hash returned for `height` on `node`. Successive calls
    /// return successive entries; the last one repeats.
    pub fn set_hashes(&self, node: &str, height: u64, hashes: &[Option<&str>]) {
        self.hashes.lock().insert(
            (node.to_string(), height),
            hashes.iter().map(|h| h.map(str::to_string)).collect(),
        );
    }

    /// Height of the most recent probe answered for `node`.
    #[must_use]
    pub fn last_height(&self, node: &str) -> Option<u64> {
        self.scripts
            .lock()
            .get(node)
            .and_then(|script| script.last)
            .and_then(|probe| probe.height())
    }

    /// Number of probes answered for `node`.
    #[must_use]
    pub fn probe_count(&self, node: &str) -> usize {
        self.scripts
            .lock()
            .get(node)
            .map_or(0, |script| script.probe_count)
    }
}

#[async_trait]
impl HealthProber for ScriptedProber {
    async fn probe(&self, node: &NodeDescriptor) -> Probe {
        let mut scripts = self.scripts.lock();
        let Some(script) = scripts.get_mut(&node.name) else {
            return Probe::Unavailable;
        };

        script.probe_count += 1;
        if let Some(next) = script.probes.pop_front() {
            script.last = Some(next);
        }
        script.last.unwrap_or(Probe::Unavailable)
    }

    async fn block_hash(&self, node: &NodeDescriptor, height: u64) -> Option<String> {
        {
            let mut hashes = self.hashes.lock();
            if let Some(sequence) = hashes.get_mut(&(node.name.clone(), height)) {
                return if sequence.len() > 1 {
                    sequence.pop_front().flatten()
                } else {
                    sequence.front().cloned().flatten()
                };
            }
        }

        match self.last_height(&node.name) {
            Some(last) if height <= last => Some(format!("0x{}-{height}", node.name)),
            _ => None,
        }
    }
}
