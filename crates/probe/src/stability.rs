//! Serve-stability check.

use std::time::Duration;

use chainboot_topology::NodeDescriptor;
use chainboot_util::sleep_or_cancel;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::HealthProber;

/// Whether `node` returns the same block hash for `height` on two consecutive
/// probes `delay` apart.
///
/// A single successful read is not enough: a node mid-reorg or freshly
/// started can answer once with a block it later abandons. Returns `false` if
/// either probe gets no hash or `cancel` fires during the delay.
pub async fn serves_height_stably(
    prober: &dyn HealthProber,
    node: &NodeDescriptor,
    height: u64,
    delay: Duration,
    cancel: &CancellationToken,
) -> bool {
    let Some(first) = prober.block_hash(node, height).await else {
        debug!(node = %node.name, height, "block not served");
        return false;
    };

    if !sleep_or_cancel(delay, cancel).await {
        return false;
    }

    let Some(second) = prober.block_hash(node, height).await else {
        debug!(node = %node.name, height, "block not served on second probe");
        return false;
    };

    if first != second {
        warn!(node = %node.name, height, %first, %second, "block hash changed between probes");
        return false;
    }

    true
}
