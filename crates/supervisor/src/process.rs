//! Nodes run as direct child processes of the orchestrator.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chainboot_topology::NodeDescriptor;
use chainboot_util::template::render_args;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::NodeSupervisor;
use crate::error::{Error, Result};
use crate::output::forward_lines;

/// How to launch one node. Arguments may use the `{datadir}` placeholder.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessSpec {
    /// The arguments to pass to the executable.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables to set.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// The executable to run.
    pub executable: PathBuf,

    /// The working directory for the process.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

struct RunningProcess {
    /// Cancelled by the monitor task once the child has exited.
    exited: CancellationToken,

    pid: u32,

    /// Monitor and output forwarding tasks.
    task_tracker: TaskTracker,
}

/// Spawns node executables directly and stops them with SIGTERM, escalating
/// to SIGKILL after the stop timeout.
///
/// Exited processes are not restarted.
pub struct ProcessSupervisor {
    running: Arc<Mutex<HashMap<String, RunningProcess>>>,
    specs: HashMap<String, ProcessSpec>,
}

impl ProcessSupervisor {
    /// Creates a supervisor for the nodes in `specs`, keyed by node name.
    #[must_use]
    pub fn new(specs: HashMap<String, ProcessSpec>) -> Self {
        Self {
            running: Arc::new(Mutex::new(HashMap::new())),
            specs,
        }
    }

    /// Whether `node` has a live child process.
    #[must_use]
    pub fn is_running(&self, node: &str) -> bool {
        self.running
            .lock()
            .get(node)
            .is_some_and(|process| !process.exited.is_cancelled())
    }

    /// PID of `node`'s live child process.
    #[must_use]
    pub fn pid(&self, node: &str) -> Option<u32> {
        self.running
            .lock()
            .get(node)
            .filter(|process| !process.exited.is_cancelled())
            .map(|process| process.pid)
    }

    fn signal(node: &str, pid: u32, signal: Signal) -> Result<()> {
        let raw = i32::try_from(pid).map_err(|_| Error::Pid(pid))?;
        match signal::kill(Pid::from_raw(raw), signal) {
            // Already gone.
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(source) => Err(Error::Signal {
                node: node.to_string(),
                signal: signal.as_str(),
                source,
            }),
        }
    }
}

#[async_trait]
impl NodeSupervisor for ProcessSupervisor {
    async fn start(&self, node: &NodeDescriptor) -> Result<()> {
        if self.is_running(&node.name) {
            debug!(node = %node.name, "process already running");
            return Ok(());
        }

        let spec = self
            .specs
            .get(&node.name)
            .ok_or_else(|| Error::UnknownNode(node.name.clone()))?;

        let datadir = node.data_dir.display().to_string();
        let args = render_args(&spec.args, &[("datadir", &datadir)]);

        let mut cmd = Command::new(&spec.executable);
        cmd.args(&args);
        if let Some(ref working_dir) = spec.working_dir {
            cmd.current_dir(working_dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Io("failed to spawn node process", e))?;
        let pid = child
            .id()
            .ok_or_else(|| Error::Io("spawned process has no pid", std::io::ErrorKind::NotFound.into()))?;

        info!(node = %node.name, pid, executable = %spec.executable.display(), "node process started");

        let task_tracker = TaskTracker::new();
        let exited = CancellationToken::new();

        if let Some(stdout) = child.stdout.take() {
            task_tracker.spawn(forward_lines(node.name.clone(), "stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            task_tracker.spawn(forward_lines(node.name.clone(), "stderr", stderr));
        }

        let name = node.name.clone();
        let exited_clone = exited.clone();
        task_tracker.spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    info!(node = %name, "node process exited");
                }
                Ok(status) => {
                    warn!(node = %name, %status, "node process exited with non-zero status");
                }
                Err(e) => {
                    error!(node = %name, error = %e, "failed to wait for node process");
                }
            }
            exited_clone.cancel();
        });
        task_tracker.close();

        self.running.lock().insert(
            node.name.clone(),
            RunningProcess {
                exited,
                pid,
                task_tracker,
            },
        );

        Ok(())
    }

    async fn stop(&self, node: &NodeDescriptor, timeout: Duration) -> Result<()> {
        let Some(process) = self.running.lock().remove(&node.name) else {
            debug!(node = %node.name, "process not running");
            return Ok(());
        };

        if !process.exited.is_cancelled() {
            info!(node = %node.name, pid = process.pid, "sending SIGTERM");
            if let Err(e) = Self::signal(&node.name, process.pid, Signal::SIGTERM) {
                self.running.lock().insert(node.name.clone(), process);
                return Err(e);
            }

            if tokio::time::timeout(timeout, process.exited.cancelled())
                .await
                .is_err()
            {
                warn!(node = %node.name, pid = process.pid, ?timeout, "node did not exit in time, sending SIGKILL");
                if let Err(e) = Self::signal(&node.name, process.pid, Signal::SIGKILL) {
                    self.running.lock().insert(node.name.clone(), process);
                    return Err(e);
                }
                process.exited.cancelled().await;
            }
        }

        process.task_tracker.wait().await;
        info!(node = %node.name, "node process stopped");

        Ok(())
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        for (node, process) in self.running.lock().drain() {
            if !process.exited.is_cancelled() {
                warn!(node = %node, pid = process.pid, "killing node process on drop");
                let _ = Self::signal(&node, process.pid, Signal::SIGKILL);
            }
        }
    }
}
