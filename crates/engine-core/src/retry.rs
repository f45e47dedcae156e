use model::execution::errors::{BackendError, RecordError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// How the loader treats a backend error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Resubmit the record.
    Retry,
    /// Stop the whole job.
    Abort,
    /// Fail this record only.
    Reject,
}

pub fn classify_backend_error(err: &BackendError) -> RetryDisposition {
    match err {
        BackendError::Transient(_) => RetryDisposition::Retry,
        BackendError::CapacityExhausted(_) | BackendError::Storage(_) => RetryDisposition::Abort,
        BackendError::Rejected(_) => RetryDisposition::Reject,
    }
}

/// What to do with a record whose operation failed.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordVerdict {
    /// Load it again; `attempt` is the retry number, starting at 1.
    Resubmit { attempt: u32 },
    /// Complete it with this error.
    Fail(RecordError),
    /// The failure is fatal for the job.
    Abort(BackendError),
}

/// Per-record retry ceiling for transient backend errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    max_retries: u32,
}

impl RetryBudget {
    pub fn new(max_retries: u32) -> Self {
        RetryBudget { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// `attempts` is the number of retries the record has already used.
    pub fn judge(&self, attempts: u32, err: BackendError) -> RecordVerdict {
        match classify_backend_error(&err) {
            RetryDisposition::Retry if attempts < self.max_retries => RecordVerdict::Resubmit {
                attempt: attempts + 1,
            },
            RetryDisposition::Retry => RecordVerdict::Fail(RecordError::RetriesExhausted {
                attempts: attempts + 1,
                last: err,
            }),
            RetryDisposition::Reject => RecordVerdict::Fail(RecordError::Backend(err)),
            RetryDisposition::Abort => RecordVerdict::Abort(err),
        }
    }
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    Fatal(E),
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) | RetryError::AttemptsExceeded(e) => e,
        }
    }
}

/// Backoff policy for whole-call retries, such as opening a destination.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts {
                            return Err(RetryError::AttemptsExceeded(err));
                        }

                        let delay = self.backoff_delay(attempt);
                        tracing::warn!(attempt = attempt + 1, ?delay, "Retrying after transient failure");
                        sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDisposition::Abort | RetryDisposition::Reject => {
                        return Err(RetryError::Fatal(err));
                    }
                },
            }
        }
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::from_millis(0);
        }

        let factor = 1u128 << attempt.min(6);
        let base_ms = self.base_delay.as_millis();
        let delay_ms = base_ms.saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }
}
