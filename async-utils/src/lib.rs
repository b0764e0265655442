//! Cancellation-aware future helpers for the sync workers.
//!
//! The polling scheduler races every suspension point (remote rounds, the
//! inter-tick sleep) against a `CancellationToken` so that `stopPolling`
//! and teardown take effect at the next await without aborting work that
//! has already produced results.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// A future lost its race against a cancelled token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Race a future against a cancellation token.
pub trait OrCancel: Future + Sized {
    /// Resolve to `Ok(output)` if the future completes first, or
    /// `Err(Cancelled)` once the token is cancelled.
    fn or_cancel(
        self,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<Self::Output, Cancelled>>;
}

impl<F: Future> OrCancel for F {
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, Cancelled> {
        tokio::select! {
            _ = token.cancelled() => Err(Cancelled),
            output = self => Ok(output),
        }
    }
}

/// Sleep that wakes early when the token is cancelled.
///
/// Returns `Err(Cancelled)` if the token fired before the duration elapsed.
pub async fn sleep_or_cancel(
    duration: Duration,
    token: &CancellationToken,
) -> Result<(), Cancelled> {
    tokio::time::sleep(duration).or_cancel(token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::time::sleep;

    #[tokio::test]
    async fn future_completing_first_wins() {
        let token = CancellationToken::new();
        assert_eq!(Ok(42), async { 42 }.or_cancel(&token).await);
    }

    #[tokio::test]
    async fn cancellation_first_wins() {
        let token = CancellationToken::new();
        let background = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(5)).await;
            background.cancel();
        });

        let result = sleep(Duration::from_secs(5)).or_cancel(&token).await;
        assert_eq!(Err(Cancelled), result);
    }

    #[tokio::test]
    async fn already_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            Err(Cancelled),
            sleep_or_cancel(Duration::from_secs(5), &token).await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_or_cancel_completes_without_cancellation() {
        let token = CancellationToken::new();
        assert_eq!(
            Ok(()),
            sleep_or_cancel(Duration::from_secs(1), &token).await
        );
    }
}
