//! Wire and persistence data structures.
//!
//! `Fragment` and `DataBlock` mirror the original implementation's
//! `models/models.go` exactly; `NodeMetadata` mirrors its node-status record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single Shamir share of a dispersed payload's symmetric key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fragment {
    /// Content hash (CIDv1 raw/sha2-256 string) of the associated ciphertext.
    pub hash: String,
    /// Base64 of this share's y-coordinate bytes (the x-coordinate is carried
    /// separately in `x`).
    pub share: String,
    pub x: u8,
    pub threshold: u8,
    pub total: u8,
}

/// The AEAD-encrypted payload, addressed by its content hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataBlock {
    pub hash: String,
    /// Base64 of `nonce ‖ ciphertext‖tag`.
    pub cipher: String,
}

/// Status record for a known node, used by the metrics surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub node_id: String,
    pub address: String,
    pub status: String,
    pub storage_used: u64,
    pub last_ping: DateTime<Utc>,
}

/// A request to disperse a payload, sent over `/upload/1.0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Base64 of the raw plaintext payload to disperse.
    pub data: String,
}

/// The payload sent over `/store/1.0.0` — either a data block or one Shamir
/// fragment, discriminated by which fields are present on the wire rather
/// than by an explicit tag: a fragment carries `share`/`x`/`threshold`/
/// `total`, a block carries `cipher`, and both carry `hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreMessage {
    Fragment(Fragment),
    Block(DataBlock),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_block_only_payload_deserializes_as_block() {
        let line = r#"{"hash":"H","cipher":"Y2lwaGVydGV4dA=="}"#;
        let message: StoreMessage = serde_json::from_str(line).unwrap();
        match message {
            StoreMessage::Block(block) => assert_eq!(block.hash, "H"),
            StoreMessage::Fragment(_) => panic!("expected a block, got a fragment"),
        }
    }

    #[test]
    fn a_fragment_payload_deserializes_as_fragment() {
        let fragment = Fragment {
            hash: "H".to_string(),
            share: "c2hhcmU=".to_string(),
            x: 2,
            threshold: 3,
            total: 5,
        };
        let line = serde_json::to_string(&StoreMessage::Fragment(fragment.clone())).unwrap();
        let message: StoreMessage = serde_json::from_str(&line).unwrap();
        match message {
            StoreMessage::Fragment(f) => assert_eq!(f, fragment),
            StoreMessage::Block(_) => panic!("expected a fragment, got a block"),
        }
    }
}
