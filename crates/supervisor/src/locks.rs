//! Per-node ownership.
//!
//! At any instant a node's process belongs to exactly one of the sequencer,
//! the migrator or the node's watchdog. Each takes the node's lock before
//! stopping or starting it and holds it for the whole window in which the
//! node must stay in the state it put it in.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Proof of exclusive control over one node's process.
pub struct NodeGuard {
    _guard: OwnedMutexGuard<()>,
    node: String,
}

impl NodeGuard {
    /// The locked node.
    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }
}

impl fmt::Debug for NodeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGuard").field("node", &self.node).finish()
    }
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        trace!(node = %self.node, "node lock released");
    }
}

/// Registry of per-node async mutexes. Clones share the same locks.
#[derive(Clone, Debug, Default)]
pub struct NodeLocks {
    locks: Arc<parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl NodeLocks {
    /// Creates an empty registry. Locks are created on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, node: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(node.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Waits for exclusive control of `node`.
    pub async fn acquire(&self, node: &str) -> NodeGuard {
        let guard = self.lock_for(node).lock_owned().await;
        trace!(node, "node lock acquired");
        NodeGuard {
            _guard: guard,
            node: node.to_string(),
        }
    }

    /// Takes control of `node` only if nobody else holds it.
    #[must_use]
    pub fn try_acquire(&self, node: &str) -> Option<NodeGuard> {
        let guard = self.lock_for(node).try_lock_owned().ok()?;
        trace!(node, "node lock acquired");
        Some(NodeGuard {
            _guard: guard,
            node: node.to_string(),
        })
    }

    /// Locks two nodes, `first` before `second`. Callers pass them in chain
    /// order (upstream first) so that pair locks never deadlock each other.
    pub async fn acquire_pair(&self, first: &str, second: &str) -> (NodeGuard, NodeGuard) {
        let first = self.acquire(first).await;
        let second = self.acquire(second).await;
        (first, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_try_acquire_fails_while_held() {
        let locks = NodeLocks::new();

        let guard = locks.acquire("a").await;
        assert!(locks.try_acquire("a").is_none());
        assert!(locks.try_acquire("b").is_some());

        drop(guard);
        assert!(locks.try_acquire("a").is_some());
    }

    #[tokio::test]
    async fn test_clones_share_locks() {
        let locks = NodeLocks::new();
        let other = locks.clone();

        let (a, b) = locks.acquire_pair("a", "b").await;
        assert_eq!(a.node(), "a");
        assert_eq!(b.node(), "b");
        assert!(other.try_acquire("a").is_none());
        assert!(other.try_acquire("b").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_release() {
        let locks = NodeLocks::new();
        let guard = locks.acquire("a").await;

        let waiter = tokio::spawn({
            let locks = locks.clone();
            async move { locks.acquire("a").await.node().to_string() }
        });

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert_eq!(waiter.await.unwrap(), "a");
    }
}
