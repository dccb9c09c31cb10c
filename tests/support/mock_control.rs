//! In-process control endpoints for integration tests: a websocket server
//! that records every text frame it receives, and an HTTP stub for the proxy
//! status endpoint.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::accept_async;
use tokio_util::sync::CancellationToken;

/// `(server label, frame)` pairs in receive order, shared across servers so a
/// test can assert cross-socket ordering.
pub type SharedFrameLog = Arc<Mutex<Vec<(String, String)>>>;

pub fn shared_frame_log() -> SharedFrameLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub struct MockControlServer {
    label: String,
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl MockControlServer {
    pub async fn start(label: &str, log: SharedFrameLog) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock control server")?;
        Self::serve(label, listener, log)
    }

    /// Rebinds a fixed address, retrying briefly while the previous listener
    /// winds down. Used to simulate an endpoint restart.
    pub async fn start_on(addr: SocketAddr, label: &str, log: SharedFrameLog) -> Result<Self> {
        let mut last_err = None;
        for _ in 0..50 {
            match TcpListener::bind(addr).await {
                Ok(listener) => return Self::serve(label, listener, log),
                Err(err) => {
                    last_err = Some(err);
                    sleep(Duration::from_millis(20)).await;
                }
            }
        }
        Err(last_err.expect("bind loop always records an error"))
            .with_context(|| format!("failed to rebind mock control server on {addr}"))
    }

    fn serve(label: &str, listener: TcpListener, log: SharedFrameLog) -> Result<Self> {
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let accepted = Arc::new(AtomicUsize::new(0));

        let loop_label = label.to_owned();
        let loop_shutdown = shutdown.clone();
        let loop_accepted = accepted.clone();
        let handle = tokio::spawn(async move {
            loop {
                let stream = tokio::select! {
                    _ = loop_shutdown.cancelled() => break,
                    incoming = listener.accept() => match incoming {
                        Ok((stream, _peer)) => stream,
                        Err(_) => break,
                    },
                };
                loop_accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(record_frames(
                    stream,
                    loop_label.clone(),
                    log.clone(),
                    loop_shutdown.clone(),
                ));
            }
        });

        Ok(Self {
            label: label.to_owned(),
            addr,
            accepted,
            shutdown,
            handle,
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Drops the listener and every open connection.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
        tracing::debug!(server = %self.label, "mock control server stopped");
    }
}

async fn record_frames(
    stream: TcpStream,
    label: String,
    log: SharedFrameLog,
    shutdown: CancellationToken,
) {
    let mut socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(_) => return,
    };

    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => break,
            message = socket.next() => message,
        };
        match message {
            Some(Ok(message)) if message.is_text() => {
                if let Ok(text) = message.into_text() {
                    log.lock()
                        .expect("frame log poisoned")
                        .push((label.clone(), text.to_string()));
                }
            }
            Some(Ok(_)) => {}
            Some(Err(_)) | None => break,
        }
    }
}

pub struct MockStatusServer {
    addr: SocketAddr,
    can_connect: Arc<AtomicBool>,
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl MockStatusServer {
    pub async fn start(can_connect: bool) -> Result<Self> {
        let state = Arc::new(AtomicBool::new(can_connect));

        let service_state = state.clone();
        let make_service = make_service_fn(move |_conn| {
            let state = service_state.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |_req: Request<Body>| {
                    let state = state.clone();
                    async move {
                        let body = json!({ "canConnect": state.load(Ordering::SeqCst) });
                        let response = Response::builder()
                            .header("content-type", "application/json")
                            .body(Body::from(body.to_string()))
                            .expect("status response must build");
                        Ok::<_, Infallible>(response)
                    }
                }))
            }
        });

        let bind_addr: SocketAddr = "127.0.0.1:0".parse().expect("loopback address parses");
        let server = Server::try_bind(&bind_addr)
            .context("failed to bind mock status server")?
            .serve(make_service);
        let addr = server.local_addr();

        let (stop_tx, stop_rx) = oneshot::channel();
        let graceful = server.with_graceful_shutdown(async {
            let _ = stop_rx.await;
        });
        let handle = tokio::spawn(async move {
            let _ = graceful.await;
        });

        Ok(Self {
            addr,
            can_connect: state,
            stop_tx,
            handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_can_connect(&self, can_connect: bool) {
        self.can_connect.store(can_connect, Ordering::SeqCst);
    }

    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.handle.await;
    }
}
