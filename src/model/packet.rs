use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::routing::{Metric, RouterId};

/// Command code for response packets, the only kind this protocol exchanges.
pub const COMMAND_RESPONSE: u8 = 2;
/// Protocol version.
pub const VERSION: u8 = 2;
/// Address-family tag carried by every route entry.
pub const ADDR_IDENTIFIER: &str = "AF_INET";

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported command {0}")]
    BadCommand(u8),
    #[error("unsupported version {0}")]
    BadVersion(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RipEntry {
    pub addr_identifier: String,
    pub router_id: RouterId,
    pub metric: Metric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub command: u8,
    pub version: u8,
    pub rid: RouterId,
    pub entries: Vec<RipEntry>,
}

/// Serializes an advertisement from `sender` carrying `entries` of
/// (destination, metric) pairs.
pub fn encode(sender: RouterId, entries: &[(RouterId, Metric)]) -> Result<Vec<u8>> {
    let packet = Packet {
        command: COMMAND_RESPONSE,
        version: VERSION,
        rid: sender,
        entries: entries
            .iter()
            .map(|(router_id, metric)| RipEntry {
                addr_identifier: ADDR_IDENTIFIER.to_string(),
                router_id: *router_id,
                metric: *metric,
            })
            .collect(),
    };
    serde_json::to_vec(&packet).context("failed to encode advertisement")
}

/// Deserializes an advertisement into the sender id and its
/// (destination, metric) pairs. Unknown fields are ignored.
pub fn decode(data: &[u8]) -> Result<(RouterId, Vec<(RouterId, Metric)>), PacketError> {
    let packet: Packet = serde_json::from_slice(data)?;
    if packet.command != COMMAND_RESPONSE {
        return Err(PacketError::BadCommand(packet.command));
    }
    if packet.version != VERSION {
        return Err(PacketError::BadVersion(packet.version));
    }
    let entries = packet
        .entries
        .iter()
        .map(|entry| (entry.router_id, entry.metric))
        .collect();
    Ok((packet.rid, entries))
}
