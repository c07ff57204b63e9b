//! Recording in-memory implementation of the node supervisor for testing purposes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chainboot_supervisor::{Error, NodeSupervisor, Result};
use chainboot_topology::NodeDescriptor;
use parking_lot::Mutex;

/// A recorded supervisor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// `start(node)`.
    Start(String),
    /// `stop(node, _)`.
    Stop(String),
}

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// Records every start and stop and tracks which nodes are up.
#[derive(Clone, Default)]
pub struct RecordingSupervisor {
    events: Arc<Mutex<Vec<SupervisorEvent>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    on_start: Arc<Mutex<Option<Hook>>>,
    running: Arc<Mutex<HashSet<String>>>,
}

impl RecordingSupervisor {
    /// Creates a supervisor with every node stopped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks nodes as already running.
    #[must_use]
    pub fn with_running(self, nodes: &[&str]) -> Self {
        self.running
            .lock()
            .extend(nodes.iter().map(ToString::to_string));
        self
    }

    /// Calls `hook` with the node name on every start.
    pub fn on_start(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_start.lock() = Some(Arc::new(hook));
    }

    /// Makes starts of `node` fail until cleared.
    pub fn fail_starts(&self, node: &str, fail: bool) {
        let mut failing = self.failing.lock();
        if fail {
            failing.insert(node.to_string());
        } else {
            failing.remove(node);
        }
    }

    /// All calls so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<SupervisorEvent> {
        self.events.lock().clone()
    }

    /// Calls so far for `node`.
    #[must_use]
    pub fn events_for(&self, node: &str) -> Vec<SupervisorEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| match event {
                SupervisorEvent::Start(n) | SupervisorEvent::Stop(n) => n == node,
            })
            .cloned()
            .collect()
    }

    /// Number of starts of `node`.
    #[must_use]
    pub fn start_count(&self, node: &str) -> usize {
        self.events_for(node)
            .iter()
            .filter(|event| matches!(event, SupervisorEvent::Start(_)))
            .count()
    }

    /// Number of stops of `node`.
    #[must_use]
    pub fn stop_count(&self, node: &str) -> usize {
        self.events_for(node)
            .iter()
            .filter(|event| matches!(event, SupervisorEvent::Stop(_)))
            .count()
    }

    /// Whether `node` is currently up.
    #[must_use]
    pub fn is_running(&self, node: &str) -> bool {
        self.running.lock().contains(node)
    }
}

#[async_trait]
impl NodeSupervisor for RecordingSupervisor {
    async fn start(&self, node: &NodeDescriptor) -> Result<()> {
        self.events
            .lock()
            .push(SupervisorEvent::Start(node.name.clone()));

        if self.failing.lock().contains(&node.name) {
            return Err(Error::Io(
                "scripted start failure",
                std::io::Error::other(format!("{} refused to start", node.name)),
            ));
        }

        self.running.lock().insert(node.name.clone());

        let hook = self.on_start.lock().clone();
        if let Some(hook) = hook {
            hook(&node.name);
        }

        Ok(())
    }

    async fn stop(&self, node: &NodeDescriptor, _timeout: Duration) -> Result<()> {
        self.events
            .lock()
            .push(SupervisorEvent::Stop(node.name.clone()));
        self.running.lock().remove(&node.name);
        Ok(())
    }
}
