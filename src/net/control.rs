//! Remote control for the node and its sync proxy: a plain status probe plus
//! fire-and-forget resume/restart commands over the persistent sockets.

use crate::net::persistent::PersistentSocket;
use crate::net::socket::{Command, ControlDialer, WsDialer};
use crate::runtime::config::ControlConfig;
use crate::runtime::telemetry::Telemetry;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Failure of the proxy status probe. Command sends report `anyhow::Error`
/// instead; only `is_paused` has a caller-facing taxonomy of its own.
#[derive(Debug)]
pub enum ControlError {
    /// The status request never completed.
    Connectivity { url: String, detail: String },
    /// The status endpoint answered with a body we cannot interpret.
    MalformedStatus { url: String, detail: String },
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Connectivity { url, detail } => {
                write!(f, "status probe to {url} failed: {detail}")
            }
            ControlError::MalformedStatus { url, detail } => {
                write!(f, "status endpoint {url} returned an unreadable body: {detail}")
            }
        }
    }
}

impl std::error::Error for ControlError {}

#[derive(Debug, Deserialize)]
struct ProxyStatus {
    #[serde(rename = "canConnect")]
    can_connect: bool,
}

/// Control session over the sync proxy and the node.
///
/// Holds one [`PersistentSocket`] per endpoint and no further state; each
/// operation snapshots whatever connection is live at call time.
pub struct RemoteControl {
    proxy: PersistentSocket,
    node: PersistentSocket,
    status_url: String,
    http: reqwest::Client,
    telemetry: Arc<Telemetry>,
}

impl RemoteControl {
    /// Builds a control session over real websockets. Performs no I/O until
    /// the first operation is invoked.
    pub fn new(config: &ControlConfig, shutdown: CancellationToken) -> Result<Self> {
        Self::with_dialers(
            config,
            Arc::new(WsDialer),
            Arc::new(WsDialer),
            Arc::new(Telemetry::default()),
            shutdown,
        )
    }

    /// Builds a control session over caller-supplied dialers. This is the
    /// seam both tests and exotic transports plug into.
    pub fn with_dialers(
        config: &ControlConfig,
        proxy_dialer: Arc<dyn ControlDialer>,
        node_dialer: Arc<dyn ControlDialer>,
        telemetry: Arc<Telemetry>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.status_timeout())
            .build()
            .context("failed to build status probe client")?;

        Ok(Self {
            proxy: PersistentSocket::new(
                config.proxy_control_url(),
                proxy_dialer,
                config.connect_backoff_step(),
                telemetry.clone(),
                shutdown.clone(),
            ),
            node: PersistentSocket::new(
                config.node_control_url(),
                node_dialer,
                config.connect_backoff_step(),
                telemetry.clone(),
                shutdown,
            ),
            status_url: config.proxy_status_url().to_owned(),
            http,
            telemetry,
        })
    }

    /// Counters shared with the underlying sockets.
    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Queries the proxy status endpoint. The upstream reports `canConnect`;
    /// paused is its negation. No retry happens here: the caller owns the
    /// retry policy.
    pub async fn is_paused(&self) -> Result<bool, ControlError> {
        self.telemetry.record_status_probe();

        let response = self
            .http
            .get(&self.status_url)
            .send()
            .await
            .map_err(|err| ControlError::Connectivity {
                url: self.status_url.clone(),
                detail: err.to_string(),
            })?;

        let status: ProxyStatus =
            response
                .json()
                .await
                .map_err(|err| ControlError::MalformedStatus {
                    url: self.status_url.clone(),
                    detail: err.to_string(),
                })?;

        Ok(!status.can_connect)
    }

    /// Tells the proxy to resume feeding the node. One-way: the protocol
    /// defines no acknowledgment.
    pub async fn resume(&self) -> Result<()> {
        tracing::info!(url = %self.proxy.url(), "sending resume command to proxy");
        self.send(&self.proxy, Command::Resume {}).await
    }

    /// Tells the node to restart its sync, then resumes the proxy.
    ///
    /// The trailing resume is a protocol invariant, not a convenience: a
    /// restarted node comes back paused-for-sync and nothing else will
    /// unpause it.
    pub async fn restart(&self) -> Result<()> {
        tracing::info!(url = %self.node.url(), "sending restart command to node");
        self.send(&self.node, Command::Restart {}).await?;
        self.resume().await
    }

    async fn send(&self, socket: &PersistentSocket, command: Command) -> Result<()> {
        let frame = command.to_frame()?;
        let channel = socket.current().await?;
        channel.send_text(&frame).await?;
        self.telemetry.record_command_sent();
        Ok(())
    }
}
