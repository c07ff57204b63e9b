//! Forwards node stdout/stderr into tracing.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

pub async fn forward_lines<R>(node: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        // Removing ANSI escape codes for cleaner logs
        let bytes = strip_ansi_escapes::strip(&line);
        if let Ok(s) = std::str::from_utf8(&bytes) {
            debug!(target: "node", node = %node, stream, "{s}");
        }
    }
}
