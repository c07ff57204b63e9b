//! Export and import through operator-supplied commands.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chainboot_topology::NodeDescriptor;
use chainboot_util::template::render_args;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::ChainDataTool;
use crate::error::{Error, Result};

const STDERR_TAIL: usize = 2048;

/// A program plus arguments with `{datadir}`, `{artifact}`, `{first}` and
/// `{last}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandTemplate {
    /// Executable to run.
    pub program: PathBuf,

    /// Arguments, rendered per invocation.
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    /// Creates a template.
    #[must_use]
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) async fn run(
        &self,
        step: &'static str,
        node: &NodeDescriptor,
        vars: &[(&str, &str)],
    ) -> Result<()> {
        let args = render_args(&self.args, vars);
        debug!(node = %node.name, step, program = %self.program.display(), ?args, "running chain data command");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Io("failed to run chain data command", e))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let tail_start = stderr
            .char_indices()
            .rev()
            .nth(STDERR_TAIL)
            .map_or(0, |(i, _)| i);

        Err(Error::ToolFailed {
            step,
            node: node.name.clone(),
            status: output.status,
            stderr: stderr[tail_start..].to_string(),
        })
    }
}

/// Exports and imports by running command templates against the nodes'
/// stopped stores, e.g. `geth export` and `geth import`.
#[derive(Debug, Clone)]
pub struct CommandTool {
    export: CommandTemplate,
    import: CommandTemplate,
}

impl CommandTool {
    /// Creates a new `CommandTool`.
    #[must_use]
    pub const fn new(export: CommandTemplate, import: CommandTemplate) -> Self {
        Self { export, import }
    }
}

#[async_trait]
impl ChainDataTool for CommandTool {
    async fn export(
        &self,
        source: &NodeDescriptor,
        artifact: &Path,
        first: u64,
        last: u64,
    ) -> Result<()> {
        let datadir = source.data_dir.display().to_string();
        let artifact_str = artifact.display().to_string();
        let first = first.to_string();
        let last = last.to_string();

        info!(node = %source.name, artifact = %artifact_str, %first, %last, "exporting range");

        self.export
            .run(
                "export",
                source,
                &[
                    ("datadir", &datadir),
                    ("artifact", &artifact_str),
                    ("first", &first),
                    ("last", &last),
                ],
            )
            .await
    }

    async fn import(&self, dest: &NodeDescriptor, artifact: &Path) -> Result<()> {
        let datadir = dest.data_dir.display().to_string();
        let artifact_str = artifact.display().to_string();

        info!(node = %dest.name, artifact = %artifact_str, "importing artifact");

        self.import
            .run(
                "import",
                dest,
                &[("datadir", &datadir), ("artifact", &artifact_str)],
            )
            .await
    }
}
