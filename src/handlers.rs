//! The three wire protocol handlers bound into the stream framework.
//!
//! Grounded on `core/StreamHandlers.go`'s `handlePrint`/`handleUpload`/
//! `handleStore`.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use libp2p::{PeerId, StreamProtocol};
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityHandle;
use crate::dispersal;
use crate::models::{StoreMessage, UploadRequest};
use crate::persistence::StorageSink;
use crate::streams::{LineStream, StreamHandler, PRINT_PROTOCOL, STORE_PROTOCOL, UPLOAD_PROTOCOL};

/// Reads a single line from the peer and logs it. The simplest possible
/// protocol, useful for liveness checks and manual probing.
pub struct PrintHandler;

#[async_trait]
impl StreamHandler for PrintHandler {
    fn protocol(&self) -> StreamProtocol {
        StreamProtocol::new(PRINT_PROTOCOL)
    }

    async fn handle(&self, peer: PeerId, stream: libp2p::Stream) {
        let mut line_stream = LineStream::new(stream);
        match line_stream.read_line().await {
            Ok(Some(line)) => info!("{peer} says: {line}"),
            Ok(None) => debug!("{peer} opened /print/1.0.0 and closed without sending data"),
            Err(e) => warn!("error reading from {peer} on /print/1.0.0: {e}"),
        }
    }
}

/// Persists any `Fragment` or `DataBlock` sent by a peer. A stream may carry
/// more than one message before closing.
pub struct StoreHandler {
    sink: Arc<dyn StorageSink>,
}

impl StoreHandler {
    pub fn new(sink: Arc<dyn StorageSink>) -> Self {
        StoreHandler { sink }
    }
}

#[async_trait]
impl StreamHandler for StoreHandler {
    fn protocol(&self) -> StreamProtocol {
        StreamProtocol::new(STORE_PROTOCOL)
    }

    async fn handle(&self, peer: PeerId, stream: libp2p::Stream) {
        let mut line_stream = LineStream::new(stream);
        loop {
            let line = match line_stream.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("error reading from {peer} on /store/1.0.0: {e}");
                    break;
                }
            };

            let message: StoreMessage = match serde_json::from_str(&line) {
                Ok(message) => message,
                Err(e) => {
                    warn!("malformed /store/1.0.0 message from {peer}: {e}");
                    continue;
                }
            };

            let result = match message {
                StoreMessage::Fragment(fragment) => self.sink.store_fragment(&fragment),
                StoreMessage::Block(block) => self.sink.store_block(&block),
            };
            if let Err(e) = result {
                warn!("failed to persist /store/1.0.0 message from {peer}: {e}");
            }
        }
    }
}

/// Accepts a dispersal request on behalf of the sending peer: encrypts,
/// splits, and disperses the plaintext the peer handed over. Fire-and-forget
/// like the other two protocols — the sender gets no reply frame and no
/// acknowledgment, successful or otherwise.
pub struct UploadHandler {
    connectivity: ConnectivityHandle,
}

impl UploadHandler {
    pub fn new(connectivity: ConnectivityHandle) -> Self {
        UploadHandler { connectivity }
    }
}

#[async_trait]
impl StreamHandler for UploadHandler {
    fn protocol(&self) -> StreamProtocol {
        StreamProtocol::new(UPLOAD_PROTOCOL)
    }

    async fn handle(&self, peer: PeerId, stream: libp2p::Stream) {
        let mut line_stream = LineStream::new(stream);

        let line = match line_stream.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("{peer} opened /upload/1.0.0 and closed without sending a request");
                return;
            }
            Err(e) => {
                warn!("error reading upload request from {peer}: {e}");
                return;
            }
        };

        let request: UploadRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("malformed upload request from {peer}: {e}");
                return;
            }
        };

        let plaintext = match base64::engine::general_purpose::STANDARD.decode(&request.data) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("upload request from {peer} has invalid base64 payload: {e}");
                return;
            }
        };

        match dispersal::disperse(&self.connectivity, &plaintext).await {
            Ok(hash) => info!("dispersed upload from {peer} as {hash}"),
            Err(e) => warn!("dispersal failed for upload from {peer}: {e}"),
        }

        let _ = line_stream.close().await;
    }
}
