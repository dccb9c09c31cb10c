//! Self-healing control socket. A supervisor task owns the reconnect loop
//! and publishes the live channel through a single-writer `watch` cell;
//! callers snapshot the current channel and never mutate it.

use crate::net::socket::{ControlChannel, ControlDialer};
use crate::runtime::telemetry::Telemetry;
use anyhow::{bail, Context, Result};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// A connection handle that outlives any individual socket.
///
/// Construction performs no I/O; the first [`PersistentSocket::current`]
/// call starts the supervisor, which then dials, backs off linearly on
/// failure, and redials forever. Backoff grows by a fixed step after every
/// consecutive failure and resets to zero on a successful connect. There is
/// no terminal failure state: the only way a caller observes a dead target
/// is by waiting.
pub struct PersistentSocket {
    shared: Arc<SocketShared>,
    started: OnceLock<()>,
}

struct SocketShared {
    url: String,
    backoff_step: Duration,
    dialer: Arc<dyn ControlDialer>,
    telemetry: Arc<Telemetry>,
    shutdown: CancellationToken,
    current: watch::Sender<Option<Arc<dyn ControlChannel>>>,
}

impl PersistentSocket {
    pub fn new(
        url: impl Into<String>,
        dialer: Arc<dyn ControlDialer>,
        backoff_step: Duration,
        telemetry: Arc<Telemetry>,
        shutdown: CancellationToken,
    ) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            shared: Arc::new(SocketShared {
                url: url.into(),
                backoff_step,
                dialer,
                telemetry,
                shutdown,
                current,
            }),
            started: OnceLock::new(),
        }
    }

    /// Target URL this socket reconnects to.
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Resolves with the current live channel, waiting through any number of
    /// reconnect cycles. Errs only once the shutdown token has fired.
    ///
    /// Callers already holding a channel keep using it until it breaks; a
    /// caller that comes back here after a break observes the replacement.
    pub async fn current(&self) -> Result<Arc<dyn ControlChannel>> {
        self.ensure_started();
        let mut rx = self.shared.current.subscribe();
        loop {
            let live = rx.borrow_and_update().clone();
            if let Some(channel) = live {
                if !channel.is_closed() {
                    return Ok(channel);
                }
            }
            tokio::select! {
                _ = self.shared.shutdown.cancelled() => {
                    bail!("control socket to {} shut down", self.shared.url);
                }
                changed = rx.changed() => {
                    changed.with_context(|| {
                        format!("control socket supervisor for {} is gone", self.shared.url)
                    })?;
                }
            }
        }
    }

    fn ensure_started(&self) {
        self.started.get_or_init(|| {
            let shared = self.shared.clone();
            tokio::spawn(supervise(shared));
        });
    }
}

/// Reconnect loop. Strictly sequential: never two dials in flight for the
/// same socket.
async fn supervise(shared: Arc<SocketShared>) {
    let mut backoff = Duration::ZERO;

    loop {
        if !backoff.is_zero() {
            tracing::debug!(
                url = %shared.url,
                wait_ms = backoff.as_millis() as u64,
                "waiting before reconnecting control socket"
            );
            tokio::select! {
                _ = shared.shutdown.cancelled() => return,
                _ = sleep(backoff) => {}
            }
        }
        if shared.shutdown.is_cancelled() {
            return;
        }

        shared.telemetry.record_connect_attempt();
        tracing::debug!(url = %shared.url, "connecting control socket");

        let dialed = tokio::select! {
            _ = shared.shutdown.cancelled() => return,
            dialed = shared.dialer.dial(&shared.url) => dialed,
        };

        match dialed {
            Ok(channel) => {
                tracing::info!(url = %shared.url, "control socket connected");
                backoff = Duration::ZERO;
                shared.current.send_replace(Some(channel.clone()));

                tokio::select! {
                    _ = shared.shutdown.cancelled() => return,
                    _ = channel.closed() => {}
                }

                tracing::warn!(url = %shared.url, "control socket disconnected; reconnecting");
                shared.telemetry.record_reconnect();
                shared.current.send_replace(None);
                backoff += shared.backoff_step;
            }
            Err(err) => {
                shared.telemetry.record_connect_failure();
                backoff += shared.backoff_step;
                tracing::warn!(
                    url = %shared.url,
                    error = %err,
                    next_wait_ms = backoff.as_millis() as u64,
                    "control socket connect failed"
                );
            }
        }
    }
}
