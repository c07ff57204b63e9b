//! Deterministic artifact and marker paths.

use std::path::{Path, PathBuf};

/// Where artifacts and markers live inside the shared artifacts directory.
///
/// ```text
/// <root>/exports/<source>-0-<cutoff>.rlp
/// <root>/exports/<source>-0-<cutoff>.rlp.exporting
/// <root>/<dest>-import-<cutoff>.importing
/// <root>/<dest>-<cutoff>.done
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerLayout {
    root: PathBuf,
}

impl MarkerLayout {
    /// Creates a layout rooted at the shared artifacts directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The shared artifacts directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding exported artifacts.
    #[must_use]
    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    /// Artifact for blocks `[0, cutoff]` of `source`.
    #[must_use]
    pub fn artifact(&self, source: &str, cutoff: u64) -> PathBuf {
        self.exports_dir().join(format!("{source}-0-{cutoff}.rlp"))
    }

    /// Present while the artifact is being written.
    #[must_use]
    pub fn exporting_marker(&self, source: &str, cutoff: u64) -> PathBuf {
        let mut path = self.artifact(source, cutoff).into_os_string();
        path.push(".exporting");
        PathBuf::from(path)
    }

    /// Present while `dest` ingests the artifact.
    #[must_use]
    pub fn importing_marker(&self, dest: &str, cutoff: u64) -> PathBuf {
        self.root.join(format!("{dest}-import-{cutoff}.importing"))
    }

    /// Present once the migration into `dest` at `cutoff` has completed.
    #[must_use]
    pub fn done_marker(&self, dest: &str, cutoff: u64) -> PathBuf {
        self.root.join(format!("{dest}-{cutoff}.done"))
    }

    /// Scratch artifact for a source's test export.
    #[must_use]
    pub fn probe_artifact(&self, source: &str) -> PathBuf {
        self.exports_dir().join(format!("{source}-repair-probe.rlp"))
    }
}
