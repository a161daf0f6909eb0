//! Retry logic with exponential backoff for remote recovery operations.
//!
//! Policy is carried per call site as an explicit `RetryConfig`; nothing here
//! reads or mutates process-wide state, and every wait is bounded and
//! cancellable through a `CancellationToken`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use crate::error::{RecoveryError, RecoveryResult};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial try (default: 3).
    pub max_retries: u32,
    /// Initial backoff duration (default: 100ms).
    pub initial_backoff: Duration,
    /// Maximum backoff duration (default: 10 seconds).
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff (default: 2.0).
    pub backoff_multiplier: f64,
    /// Whether to add random jitter to backoff (default: true).
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Shared flag for aborting in-flight retry loops, e.g. on device shutdown.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. All clones of this token observe it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Outcome of a retry operation.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// Operation succeeded.
    Success(T),
    /// All retries exhausted or a non-retryable error occurred.
    Exhausted {
        /// The last error that occurred.
        last_error: RecoveryError,
        /// Total number of attempts made.
        attempts: u32,
    },
    /// Cancellation was requested before the operation could succeed.
    Cancelled {
        /// Number of attempts made before cancellation.
        attempts: u32,
    },
}

/// Executor for retry operations.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new RetryExecutor with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute an operation with retry logic.
    ///
    /// Runs the operation, retrying on transient failure with exponential
    /// backoff. Permanent errors fail immediately. The token is checked
    /// before each attempt and during every backoff wait.
    pub fn execute<T, F>(&self, cancel: &CancellationToken, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> RecoveryResult<T>,
    {
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return RetryOutcome::Cancelled { attempts: attempt };
            }
            attempt += 1;

            match operation() {
                Ok(value) => return RetryOutcome::Success(value),
                Err(e) => {
                    let retryable = is_retryable(&e);
                    let maxed_out = attempt > self.config.max_retries;

                    if !retryable || maxed_out {
                        return RetryOutcome::Exhausted {
                            last_error: e,
                            attempts: attempt,
                        };
                    }

                    let backoff = self.compute_backoff(attempt - 1);
                    debug!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "retrying after backoff"
                    );
                    if !sleep_cancellable(backoff, cancel) {
                        return RetryOutcome::Cancelled { attempts: attempt };
                    }
                }
            }
        }
    }

    fn compute_backoff(&self, prior_attempts: u32) -> Duration {
        let exp = self.config.backoff_multiplier.powi(prior_attempts as i32);
        let base_ms = self.config.initial_backoff.as_millis() as f64 * exp;
        let capped_ms = base_ms.min(self.config.max_backoff.as_millis() as f64);
        let final_ms = if self.config.jitter {
            capped_ms * rand::thread_rng().gen_range(0.5..=1.0)
        } else {
            capped_ms
        };
        Duration::from_millis(final_ms as u64)
    }
}

/// Whether the error class is worth retrying.
///
/// Connectivity problems are transient; I/O errors against local disk are
/// not — retrying the same write will not make the disk healthier.
pub fn is_retryable(error: &RecoveryError) -> bool {
    match error {
        RecoveryError::Http(e) => e.is_timeout() || e.is_connect(),
        RecoveryError::Unavailable { .. } => true,
        RecoveryError::Io(_) => false,
    }
}

/// Sleep for `total`, waking early if the token is cancelled.
///
/// Returns false if cancellation was observed.
fn sleep_cancellable(total: Duration, cancel: &CancellationToken) -> bool {
    const SLICE: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + total;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        std::thread::sleep(remaining.min(SLICE));
    }
}
