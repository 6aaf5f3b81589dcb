//! Dispersal orchestration: encrypt, split the key, pick peers, and push
//! the ciphertext and shares out over `/store/1.0.0`.
//!
//! Grounded on `core/Crypto.go`'s `Disperse`: seal the payload once, split
//! only the symmetric key, and hand each fragment to a different peer so
//! that no single peer holds enough to reconstruct anything beyond the
//! ciphertext it was asked to keep.

use base64::Engine;
use libp2p::StreamProtocol;
use tracing::warn;

use crate::connectivity::ConnectivityHandle;
use crate::crypto;
use crate::error::DfsResult;
use crate::models::{DataBlock, StoreMessage};
use crate::sss;
use crate::streams::{self, STORE_PROTOCOL};

/// Encrypts `plaintext`, splits its key into threshold shares, and fans the
/// data block and each fragment out to an independently, uniformly drawn
/// connected peer. Each of the six draws (one block, five shares) is
/// independent: the same peer may be picked more than once, and a draw that
/// finds no eligible peer only skips that one slot rather than aborting the
/// whole dispersal. Returns the content hash addressing the dispersed
/// ciphertext.
pub async fn disperse(connectivity: &ConnectivityHandle, plaintext: &[u8]) -> DfsResult<String> {
    let ciphertext = crypto::encrypt(plaintext)?;
    let hash = crypto::content_hash(&ciphertext.envelope);

    let total = connectivity.config.storage.total_shares;
    let threshold = connectivity.config.storage.threshold;
    let fragments = sss::split_key(&ciphertext.key, &hash, threshold, total)?;

    let block = DataBlock {
        hash: hash.clone(),
        cipher: base64::engine::general_purpose::STANDARD.encode(&ciphertext.envelope),
    };

    let protocol = StreamProtocol::new(STORE_PROTOCOL);

    match connectivity.pick_peer().await {
        Ok(peer) => {
            let message = StoreMessage::Block(block);
            if let Err(e) = send_store(connectivity, peer, protocol.clone(), &message).await {
                warn!("failed to disperse data block {hash} to {peer}: {e}");
            }
        }
        Err(e) => warn!("no peer available to disperse data block {hash}: {e}"),
    }

    for fragment in fragments {
        match connectivity.pick_peer().await {
            Ok(peer) => {
                let message = StoreMessage::Fragment(fragment);
                if let Err(e) = send_store(connectivity, peer, protocol.clone(), &message).await {
                    warn!("failed to disperse fragment of {hash} to {peer}: {e}");
                }
            }
            Err(e) => warn!("no peer available to disperse a fragment of {hash}: {e}"),
        }
    }

    Ok(hash)
}

async fn send_store(
    connectivity: &ConnectivityHandle,
    peer: libp2p::PeerId,
    protocol: StreamProtocol,
    message: &StoreMessage,
) -> DfsResult<()> {
    let mut control = connectivity.control.clone();
    let mut line_stream = streams::open_line_stream(&mut control, peer, protocol).await?;
    let payload = serde_json::to_string(message)?;
    line_stream.write_line(&payload).await?;
    line_stream.close().await
}
