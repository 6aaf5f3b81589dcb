//! Stream-Handler Framework: binds named wire protocols to handlers over
//! `libp2p::stream`, with newline-delimited framing.
//!
//! `libp2p_stream`'s `Control::accept`/`open_stream` is this crate's analogue
//! of `go-libp2p`'s `host.SetStreamHandler`/`host.NewStream`, used throughout
//! `core/StreamHandlers.go`. Framing matches the original's line-oriented
//! JSON protocol; `AsyncBufReadExt::read_line` already treats a final,
//! unterminated line before EOF as an ordinary read rather than an error, so
//! unlike `bufio.Reader.ReadString('\n')` there's no special EOF case to
//! carry through here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use futures::StreamExt;
use libp2p::stream::Control;
use libp2p::{PeerId, StreamProtocol};
use tracing::{debug, warn};

use crate::error::{DfsError, DfsResult};

pub const PRINT_PROTOCOL: &str = "/print/1.0.0";
pub const UPLOAD_PROTOCOL: &str = "/upload/1.0.0";
pub const STORE_PROTOCOL: &str = "/store/1.0.0";

/// Per-protocol dial timeout for outbound streams.
pub fn dial_timeout(protocol: &str) -> Duration {
    match protocol {
        PRINT_PROTOCOL => Duration::from_secs(5),
        UPLOAD_PROTOCOL => Duration::from_secs(10),
        STORE_PROTOCOL => Duration::from_secs(10),
        _ => Duration::from_secs(15),
    }
}

/// A newline-delimited duplex stream. Wraps the halves returned by
/// `futures::AsyncReadExt::split` so repeated `read_line` calls share one
/// buffer instead of discarding buffered bytes between reads.
pub struct LineStream<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> LineStream<S> {
    pub fn new(stream: S) -> Self {
        use futures::AsyncReadExt;
        let (read_half, writer) = stream.split();
        LineStream {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    /// Reads one line, without its trailing `\n`/`\r\n`. Returns `None` on a
    /// clean EOF with nothing buffered.
    pub async fn read_line(&mut self) -> DfsResult<Option<String>> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| DfsError::Network(format!("stream read failed: {e}")))?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    pub async fn write_line(&mut self, line: &str) -> DfsResult<()> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DfsError::Network(format!("stream write failed: {e}")))?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(|e| DfsError::Network(format!("stream write failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| DfsError::Network(format!("stream flush failed: {e}")))
    }

    pub async fn close(mut self) -> DfsResult<()> {
        self.writer
            .close()
            .await
            .map_err(|e| DfsError::Network(format!("stream close failed: {e}")))
    }
}

/// A protocol bound into the framework: a name plus a handler invoked once
/// per inbound stream for that name.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    fn protocol(&self) -> StreamProtocol;
    async fn handle(&self, peer: PeerId, stream: libp2p::Stream);
}

/// Registry mapping protocol names to handlers, and the entry point for
/// opening outbound streams for protocols the framework knows about.
pub struct Framework {
    control: Control,
}

impl Framework {
    pub fn new(control: Control) -> Self {
        Framework { control }
    }

    /// Registers `handler` and spawns a task that runs it against every
    /// inbound stream opened for its protocol, for the life of the node.
    pub fn register(&mut self, handler: Arc<dyn StreamHandler>) -> DfsResult<()> {
        let protocol = handler.protocol();
        let incoming = self.control.accept(protocol.clone()).map_err(|e| {
            DfsError::Network(format!("failed to register handler for {protocol}: {e}"))
        })?;
        tokio::spawn(accept_loop(protocol, incoming, handler));
        Ok(())
    }

    pub fn control(&self) -> Control {
        self.control.clone()
    }
}

async fn accept_loop(
    protocol: StreamProtocol,
    mut incoming: libp2p::stream::IncomingStreams,
    handler: Arc<dyn StreamHandler>,
) {
    while let Some((peer, stream)) = incoming.next().await {
        debug!("inbound {protocol} stream from {peer}");
        let handler = handler.clone();
        tokio::spawn(async move {
            handler.handle(peer, stream).await;
        });
    }
    warn!("accept loop for {protocol} ended");
}

/// Opens an outbound stream to `peer` for `protocol`, bounded by the
/// protocol's dial timeout, and wraps it for line-oriented I/O.
pub async fn open_line_stream(
    control: &mut Control,
    peer: PeerId,
    protocol: StreamProtocol,
) -> DfsResult<LineStream<libp2p::Stream>> {
    let timeout = dial_timeout(protocol.as_ref());
    let stream = tokio::time::timeout(timeout, control.open_stream(peer, protocol.clone()))
        .await
        .map_err(|_| DfsError::Network(format!("timed out opening {protocol} stream to {peer}")))?
        .map_err(|e| {
            DfsError::Network(format!("failed to open {protocol} stream to {peer}: {e}"))
        })?;
    Ok(LineStream::new(stream))
}
