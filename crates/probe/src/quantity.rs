//! Normalization of the encodings different client versions use.

use serde_json::Value;

/// Parses a height or count sent as a JSON number, a `0x` hex string or a
/// decimal string.
#[must_use]
pub fn parse_quantity(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => {
            let text = text.trim();
            match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                Some("") => None,
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => text.parse().ok(),
            }
        }
        _ => None,
    }
}

/// Normalized `eth_syncing` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// `false`, `null`, absent, or a method the node does not support.
    NotSyncing,

    /// Syncing, with whatever progress numbers the node reported.
    Syncing {
        /// `currentBlock`, if reported.
        current: Option<u64>,
        /// `highestBlock`, if reported.
        highest: Option<u64>,
    },
}

/// Parses an `eth_syncing` result.
#[must_use]
pub fn parse_sync_status(value: &Value) -> SyncStatus {
    match value {
        Value::Bool(true) => SyncStatus::Syncing {
            current: None,
            highest: None,
        },
        Value::Object(fields) => SyncStatus::Syncing {
            current: fields.get("currentBlock").and_then(parse_quantity),
            highest: fields.get("highestBlock").and_then(parse_quantity),
        },
        _ => SyncStatus::NotSyncing,
    }
}
