//! Transport-level retry for requests to k6forge services.
//!
//! A build can sit behind a compile that takes minutes, so clients are
//! expected to be patient with the transport without being patient with
//! the protocol: only failures to obtain a response at all (connect,
//! timeout) are retried. Any HTTP response, whatever its status, goes
//! straight back to the caller — status interpretation belongs to the
//! protocol layer, where for instance a 412 from the store is a duplicate
//! to recover from, not a failure to repeat.

use std::future::Future;
use std::time::Duration;

/// Retry policy for a k6forge client. Attempts are total (the first try
/// counts); the delay doubles after every failed attempt.
///
/// The default is tuned for a coordinator talking to a store service on
/// the same network: four attempts spanning roughly two seconds. Callers
/// fronting a far-away build service can widen it via
/// [`BuildServiceClient::with_backoff`](crate::BuildServiceClient::with_backoff)
/// or [`StoreClient::with_backoff`](crate::StoreClient::with_backoff).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt; doubled for each one after.
    pub base_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: 4,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl Backoff {
    /// Run `send` until it yields a response or the attempts are spent.
    /// `endpoint` names the target in retry logs.
    pub(crate) async fn run<F, Fut>(
        &self,
        endpoint: &str,
        send: F,
    ) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay;
        for attempt in 1..=attempts {
            match send().await {
                Ok(response) => return Ok(response),
                Err(e) if attempt == attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        endpoint,
                        attempt,
                        attempts,
                        "transport failure, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
        unreachable!("the final attempt either returned or errored")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn spends_exactly_the_configured_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();

        let policy = Backoff {
            attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        // Nothing listens on port 1; every attempt is a transport failure.
        let result = policy
            .run("nowhere", || {
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    reqwest::Client::builder()
                        .timeout(Duration::from_millis(50))
                        .build()
                        .unwrap()
                        .get("http://127.0.0.1:1/")
                        .send()
                        .await
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_sends_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();

        let policy = Backoff {
            attempts: 0,
            base_delay: Duration::from_millis(1),
        };
        let result = policy
            .run("nowhere", || {
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    reqwest::Client::builder()
                        .timeout(Duration::from_millis(50))
                        .build()
                        .unwrap()
                        .get("http://127.0.0.1:1/")
                        .send()
                        .await
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
