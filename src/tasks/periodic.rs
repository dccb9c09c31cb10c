use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Invokes `tick` immediately, then again `interval` after each completion,
/// until `cancellation` fires.
///
/// The interval is anchored to the previous invocation's completion, not to
/// wall-clock cadence: a slow tick delays the next run but never overlaps
/// it. Errors are not part of this contract; a fallible tick composes its
/// own [`retry_forever`](crate::tasks::retry::retry_forever) internally.
pub async fn run_every<F, Fut>(interval: Duration, cancellation: &CancellationToken, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        if cancellation.is_cancelled() {
            return;
        }

        tick().await;

        tokio::select! {
            _ = cancellation.cancelled() => return,
            _ = sleep(interval) => {}
        }
    }
}
