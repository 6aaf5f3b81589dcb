//! Node identity: `ID.json` persistence and deterministic test identities.
//!
//! Grounded on the original implementation's `Utils.go` (`BootstrapKeys`,
//! `readPrivateKeyFromFile`) and `core/Utils.go` (`PrivKeyFromSeed`).

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use libp2p::identity::Keypair;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{DfsError, DfsResult};

#[derive(Debug, Serialize, Deserialize)]
struct IdFile {
    private_key: String,
    public_key: String,
}

/// Load the node's Ed25519 keypair from `ID.json`, generating and persisting
/// a new one if the file doesn't exist yet.
pub fn load_or_create(path: &Path) -> DfsResult<Keypair> {
    if path.exists() {
        load(path)
    } else {
        let keypair = Keypair::generate_ed25519();
        save(path, &keypair)?;
        Ok(keypair)
    }
}

pub fn load(path: &Path) -> DfsResult<Keypair> {
    let raw = std::fs::read_to_string(path)?;
    let id_file: IdFile = serde_json::from_str(&raw)?;
    let bytes = BASE64
        .decode(id_file.private_key)
        .map_err(|e| DfsError::KeyManagement(format!("invalid ID.json private_key: {e}")))?;
    Keypair::from_protobuf_encoding(&bytes)
        .map_err(|e| DfsError::KeyManagement(format!("failed to decode keypair: {e}")))
}

pub fn save(path: &Path, keypair: &Keypair) -> DfsResult<()> {
    let private_bytes = keypair
        .to_protobuf_encoding()
        .map_err(|e| DfsError::KeyManagement(format!("failed to encode keypair: {e}")))?;
    let public_bytes = keypair
        .public()
        .encode_protobuf();

    let id_file = IdFile {
        private_key: BASE64.encode(private_bytes),
        public_key: BASE64.encode(public_bytes),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&id_file)?)?;
    Ok(())
}

/// Derive a deterministic Ed25519 identity from an arbitrary seed string, for
/// the `test <seed>` subcommand: SHA-256(seed) is used directly as the
/// Ed25519 private key seed, so the same input always yields the same
/// `PeerId`.
pub fn from_seed(seed: &str) -> DfsResult<Keypair> {
    let digest = Sha256::digest(seed.as_bytes());
    Keypair::ed25519_from_bytes(digest.to_vec())
        .map_err(|e| DfsError::KeyManagement(format!("invalid seed material: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p::PeerId;

    #[test]
    fn seed_identity_is_deterministic() {
        let a = from_seed("alice").unwrap();
        let b = from_seed("alice").unwrap();
        assert_eq!(PeerId::from(a.public()), PeerId::from(b.public()));

        let c = from_seed("bob").unwrap();
        assert_ne!(PeerId::from(a.public()), PeerId::from(c.public()));
    }

    #[test]
    fn roundtrips_through_id_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ID.json");

        let created = load_or_create(&path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(
            PeerId::from(created.public()),
            PeerId::from(loaded.public())
        );
    }
}
