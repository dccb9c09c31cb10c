//! Transport seam for the control sockets. `ControlDialer` and
//! `ControlChannel` keep the reconnect logic testable without a network;
//! `WsDialer` is the production websocket implementation.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

/// Single-key command frame understood by the node and its sync proxy.
///
/// The wire form is an externally tagged object with an empty parameter
/// body: `{"resume":{}}` or `{"restart":{}}`. The protocol defines no
/// acknowledgment for either, so sends are fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Resume {},
    Restart {},
}

impl Command {
    /// Encodes the command as a UTF-8 JSON text frame.
    pub fn to_frame(self) -> Result<String> {
        serde_json::to_string(&self).context("failed to encode command frame")
    }
}

/// One live, writable control socket.
///
/// Inbound frames are never consumed by this crate; a channel only reports
/// that the peer went away via [`ControlChannel::closed`].
pub trait ControlChannel: Send + Sync {
    /// Sends one UTF-8 text frame. An error means the socket is no longer
    /// usable and a fresh channel must be obtained.
    fn send_text<'a>(&'a self, frame: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Resolves once the underlying socket has closed or errored.
    fn closed(&self) -> BoxFuture<'_, ()>;

    /// Whether the socket is already known to be dead.
    fn is_closed(&self) -> bool;
}

/// Opens control sockets. Exactly one dial is in flight per
/// [`PersistentSocket`](crate::net::persistent::PersistentSocket) at any time.
pub trait ControlDialer: Send + Sync {
    fn dial<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<dyn ControlChannel>>>;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Production dialer over `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsDialer;

impl ControlDialer for WsDialer {
    fn dial<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<dyn ControlChannel>>> {
        Box::pin(async move {
            let (stream, _response) = connect_async(url)
                .await
                .with_context(|| format!("failed to open control socket to {url}"))?;
            let channel: Arc<dyn ControlChannel> = Arc::new(WsChannel::new(stream));
            Ok(channel)
        })
    }
}

/// Write half of an open websocket plus a reader task that watches for the
/// peer going away.
struct WsChannel {
    sink: Mutex<WsSink>,
    closed: CancellationToken,
    reader: JoinHandle<()>,
}

impl WsChannel {
    fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        let (sink, source) = stream.split();
        let closed = CancellationToken::new();
        let reader = tokio::spawn(drain_until_closed(source, closed.clone()));
        Self {
            sink: Mutex::new(sink),
            closed,
            reader,
        }
    }
}

impl ControlChannel for WsChannel {
    fn send_text<'a>(&'a self, frame: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut sink = self.sink.lock().await;
            if let Err(err) = sink.send(Message::Text(frame.to_owned())).await {
                self.closed.cancel();
                return Err(err).context("failed to send control frame");
            }
            Ok(())
        })
    }

    fn closed(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.closed.cancelled())
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.reader.abort();
        self.closed.cancel();
    }
}

/// Discards inbound frames until the stream ends, errors, or the peer sends
/// a close frame, then flags the channel closed.
async fn drain_until_closed(mut source: WsSource, closed: CancellationToken) {
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    closed.cancel();
}
