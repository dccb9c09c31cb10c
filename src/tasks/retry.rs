use crate::runtime::telemetry::Telemetry;
use anyhow::{anyhow, Result};
use std::future::Future;
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Policy for [`retry_forever`]: a fixed wait between attempts, no growth,
/// no attempt cap.
#[derive(Clone, Copy)]
pub struct RetryForever<'a> {
    pub interval: Duration,
    pub cancellation: Option<&'a CancellationToken>,
    pub telemetry: Option<&'a Telemetry>,
}

impl<'a> RetryForever<'a> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            cancellation: None,
            telemetry: None,
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_telemetry(mut self, telemetry: &'a Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }
}

/// Repeats `operation` until it succeeds, waiting `policy.interval` between
/// attempts and logging every failure under `operation_name`.
///
/// A permanently failing operation never returns; the only bounded exit is
/// the policy's cancellation token, which turns the loop into an error.
pub async fn retry_forever<T, F, Fut>(
    operation_name: &str,
    policy: RetryForever<'_>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;

    loop {
        if let Some(token) = policy.cancellation {
            if token.is_cancelled() {
                return Err(anyhow!("{operation_name} cancelled"));
            }
        }

        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if let Some(telemetry) = policy.telemetry {
                    telemetry.record_retry();
                }
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    wait_ms = policy.interval.as_millis() as u64,
                    error = %err,
                    "operation failed; retrying"
                );
                sleep_with_cancellation(policy.interval, policy.cancellation)
                    .await
                    .map_err(|_| anyhow!("{operation_name} cancelled"))?;
            }
        }
    }
}

async fn sleep_with_cancellation(
    delay: Duration,
    cancellation: Option<&CancellationToken>,
) -> Result<()> {
    if delay.is_zero() {
        yield_now().await;
        return Ok(());
    }

    if let Some(token) = cancellation {
        tokio::select! {
            _ = token.cancelled() => Err(anyhow!("wait cancelled")),
            _ = sleep(delay) => Ok(()),
        }
    } else {
        sleep(delay).await;
        Ok(())
    }
}
