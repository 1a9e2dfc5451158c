//! Bounded retry of Dgraph mutations.
//!
//! Each attempt opens a fresh transaction, mutates, and commits. The
//! transaction is discarded after every attempt whatever the outcome
//! (discarding a committed transaction does nothing). Only transport
//! failures are retried; anything else propagates at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use log::{debug, warn};
use prairie_core::{Error, Result};

use crate::client::{MutationOutcome, Transport, Txn};

/// Retries a mutation with exponential backoff.
///
/// Delays are `2 × unit`, `4 × unit`, ... between attempts. Clones share
/// the counter of scheduled delays.
#[derive(Clone, Debug)]
pub struct MutationRetrier {
    max_attempts: u32,
    unit: Duration,
    delays: Arc<AtomicU64>,
}

/// A committed mutation and how many attempts it took.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryOutcome {
    /// What the committed mutation created.
    pub mutation: MutationOutcome,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

impl Default for MutationRetrier {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            unit: Duration::from_secs(1),
            delays: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl MutationRetrier {
    /// Three attempts with a one-second unit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total number of attempts (at least 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the backoff time unit.
    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Total attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff delays scheduled so far across every run.
    pub fn delays_scheduled(&self) -> u64 {
        self.delays.load(Ordering::SeqCst)
    }

    fn backoff(&self) -> ExponentialBuilder {
        let retries = self.max_attempts.saturating_sub(1);
        ExponentialBuilder::default()
            .with_min_delay(self.unit * 2)
            .with_factor(2.0)
            .with_max_delay(self.unit * 2u32.saturating_pow(self.max_attempts))
            .with_max_times(retries as usize)
    }

    /// Mutate and commit `nquads`, retrying transport failures.
    pub async fn run<T>(&self, transport: &T, nquads: &str) -> Result<RetryOutcome>
    where
        T: Transport + ?Sized,
    {
        let attempts = AtomicU32::new(0);

        let result = (|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            let mut txn = Txn::new();
            let outcome = attempt(transport, &mut txn, nquads).await;
            if let Err(e) = transport.discard(&mut txn).await {
                warn!("failed to discard transaction: {e}");
            }
            outcome
        })
        .retry(self.backoff())
        .when(Error::is_transient)
        .notify(|err: &Error, delay: Duration| {
            self.delays.fetch_add(1, Ordering::SeqCst);
            warn!("mutation failed ({err}); retrying in {delay:?}");
        })
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        match result {
            Ok(mutation) => {
                debug!("mutation committed after {attempts} attempt(s)");
                Ok(RetryOutcome { mutation, attempts })
            }
            Err(e) if e.is_transient() => Err(Error::backend(format!(
                "retries exhausted after {attempts} attempts: {e}"
            ))),
            Err(e) => Err(e),
        }
    }
}

async fn attempt<T>(transport: &T, txn: &mut Txn, nquads: &str) -> Result<MutationOutcome>
where
    T: Transport + ?Sized,
{
    let outcome = transport.mutate(txn, nquads).await?;
    transport.commit(txn).await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counters {
        mutates: u32,
        commits: u32,
        discards: u32,
        effective_discards: u32,
    }

    /// Fails the first `failures` mutations with `failure`.
    struct FlakyTransport {
        failures: u32,
        failure: fn() -> Error,
        counters: Mutex<Counters>,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            Self::failing_with(failures, || Error::transport("connection reset"))
        }

        fn failing_with(failures: u32, failure: fn() -> Error) -> Self {
            Self {
                failures,
                failure,
                counters: Mutex::new(Counters::default()),
            }
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn mutate(&self, txn: &mut Txn, _nquads: &str) -> Result<MutationOutcome> {
            let mut c = self.counters.lock().unwrap();
            c.mutates += 1;
            txn.start_ts = Some(u64::from(c.mutates));
            if c.mutates <= self.failures {
                return Err((self.failure)());
            }
            let mut outcome = MutationOutcome::default();
            outcome.uids.insert("node".into(), "0x1".into());
            Ok(outcome)
        }

        async fn commit(&self, txn: &mut Txn) -> Result<()> {
            self.counters.lock().unwrap().commits += 1;
            txn.finished = true;
            Ok(())
        }

        async fn discard(&self, txn: &mut Txn) -> Result<()> {
            let mut c = self.counters.lock().unwrap();
            c.discards += 1;
            if !txn.finished {
                c.effective_discards += 1;
                txn.finished = true;
            }
            Ok(())
        }
    }

    fn fast() -> MutationRetrier {
        MutationRetrier::new().with_unit(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let transport = FlakyTransport::new(0);
        let retrier = fast();
        let outcome = retrier.run(&transport, "_:node <n> \"A\" .").await.unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.mutation.uid("node"), Some("0x1"));
        assert_eq!(retrier.delays_scheduled(), 0);
        let c = transport.counters.lock().unwrap();
        assert_eq!(c.commits, 1);
        assert_eq!(c.discards, 1);
        assert_eq!(c.effective_discards, 0);
    }

    #[tokio::test]
    async fn test_two_failures_then_success() {
        let transport = FlakyTransport::new(2);
        let retrier = fast();
        let outcome = retrier.run(&transport, "").await.unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(retrier.delays_scheduled(), 2);
        let c = transport.counters.lock().unwrap();
        assert_eq!(c.mutates, 3);
        assert_eq!(c.commits, 1);
        assert_eq!(c.discards, 3);
        assert_eq!(c.effective_discards, 2);
    }

    #[tokio::test]
    async fn test_exhaustion_is_fatal() {
        let transport = FlakyTransport::new(3);
        let retrier = fast();
        let err = retrier.run(&transport, "").await.unwrap_err();

        assert!(matches!(err, Error::Backend(_)), "got {err:?}");
        assert_eq!(
            retrier.delays_scheduled(),
            u64::from(retrier.max_attempts() - 1)
        );
        assert!(err.to_string().contains("retries exhausted"));
        let c = transport.counters.lock().unwrap();
        assert_eq!(c.mutates, 3);
        assert_eq!(c.commits, 0);
        assert_eq!(c.discards, 3);
    }

    #[tokio::test]
    async fn test_non_transient_error_aborts_immediately() {
        let transport = FlakyTransport::failing_with(5, || Error::backend("schema mismatch"));
        let retrier = fast();
        let err = retrier.run(&transport, "").await.unwrap_err();

        assert!(err.to_string().contains("schema mismatch"));
        assert_eq!(retrier.delays_scheduled(), 0);
        let c = transport.counters.lock().unwrap();
        assert_eq!(c.mutates, 1);
        assert_eq!(c.discards, 1);
    }

    #[tokio::test]
    async fn test_single_attempt_budget() {
        let transport = FlakyTransport::new(1);
        let retrier = fast().with_max_attempts(1);
        assert!(retrier.run(&transport, "").await.is_err());
        assert_eq!(transport.counters.lock().unwrap().mutates, 1);
        assert_eq!(retrier.delays_scheduled(), 0);
    }

    #[test]
    fn test_builder() {
        let retrier = MutationRetrier::new()
            .with_max_attempts(0)
            .with_unit(Duration::from_millis(5));
        assert_eq!(retrier.max_attempts(), 1);
        assert_eq!(retrier.unit, Duration::from_millis(5));
    }
}
