use crate::tasks::periodic::run_every;
use std::future::Future;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Coordinates the indexer poll loop and handles OS signals for graceful shutdowns.
pub struct PollDriver {
    interval: Duration,
    shutdown: CancellationToken,
}

impl PollDriver {
    /// Creates a driver with a fresh root [`CancellationToken`].
    pub fn new(interval: Duration) -> Self {
        Self::with_cancellation_token(interval, CancellationToken::new())
    }

    /// Creates a driver on an externally owned token so callers can integrate
    /// with their own signal handlers or cancellation strategies.
    pub fn with_cancellation_token(interval: Duration, shutdown: CancellationToken) -> Self {
        Self { interval, shutdown }
    }

    /// Returns a clone of the root shutdown token. Hand this to the control
    /// session and retry loops so one cancel stops everything.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the poll loop until the token is cancelled.
    pub async fn run<F, Fut>(&self, tick: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        run_every(self.interval, &self.shutdown, tick).await;
    }

    /// Runs the poll loop until a Ctrl-C (SIGINT) is received or the shutdown
    /// token is cancelled elsewhere.
    pub async fn run_until_ctrl_c<F, Fut>(&self, tick: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            "poll driver started; waiting for Ctrl-C (SIGINT) to initiate shutdown"
        );

        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; shutting down poll driver");
            }
            _ = self.run(tick) => {
                tracing::info!("poll driver shutdown token cancelled");
            }
        }

        self.shutdown.cancel();
    }

    /// Stops the loop by cancelling the root token.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}
