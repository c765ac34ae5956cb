//! Queue processor: drains pending payments one at a time in FIFO order.
//!
//! Each pass opens a transaction, locks the oldest claimable payment, runs
//! the settlement step while holding the lock, and commits the new status in
//! the same transaction. The row lock is the only mutual-exclusion
//! mechanism, so several processors may share one store.
//!
//! Error policy:
//!
//! - empty backlog: wait one poll interval, poll again;
//! - store failure (begin, claim, write, commit): back off exponentially
//!   from the poll interval up to `max_backoff`, retry forever;
//! - settlement failure: count the attempt and keep the payment `pending`,
//!   or mark it `failed` once `max_attempts` is reached.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::settlement::Settlement;
use crate::config::AppConfig;
use crate::domain::{PaymentId, PaymentStatus};
use crate::error::PaymentError;
use crate::persistence::{ClaimedPayment, PaymentQueue};

/// Floor for the poll interval. A zero interval would turn the idle pause
/// and every store-error backoff into a busy loop.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Timing and retry knobs for [`QueueProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Pause after an empty poll; base of the store-error backoff. Values
    /// below [`MIN_POLL_INTERVAL`] are raised to it.
    pub poll_interval: Duration,
    /// Upper bound for the store-error backoff.
    pub max_backoff: Duration,
    /// Failed settlement attempts before a payment is marked `failed`.
    pub max_attempts: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl From<&AppConfig> for ProcessorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.queue_poll_interval_ms)
                .max(MIN_POLL_INTERVAL),
            max_backoff: Duration::from_millis(config.queue_max_backoff_ms),
            max_attempts: config.queue_max_attempts.max(1),
        }
    }
}

impl ProcessorConfig {
    /// Effective pause after an empty poll, never below
    /// [`MIN_POLL_INTERVAL`].
    #[must_use]
    pub fn idle_delay(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }

    /// Delay before the next pass after `consecutive_failures` store errors
    /// in a row: the poll interval doubled per failure, capped at
    /// `max_backoff`.
    #[must_use]
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1).min(16);
        let base = self.idle_delay();
        base.saturating_mul(1u32 << exponent)
            .min(self.max_backoff.max(base))
    }
}

/// Result of a single processor pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing was claimable.
    Idle,
    /// The payment was settled and marked `processed`.
    Processed(PaymentId),
    /// Settlement failed; the payment stays `pending` for another attempt.
    Retrying {
        /// Payment that failed to settle.
        id: PaymentId,
        /// Failed attempts recorded so far.
        attempts: i32,
    },
    /// Settlement failed for the last allowed time; marked `failed`.
    Failed(PaymentId),
    /// Shutdown arrived mid-settlement; the claim was rolled back.
    Interrupted(PaymentId),
}

/// Single-consumer loop over a [`PaymentQueue`].
#[derive(Debug)]
pub struct QueueProcessor<Q, S> {
    queue: Q,
    settlement: S,
    config: ProcessorConfig,
}

impl<Q, S> QueueProcessor<Q, S>
where
    Q: PaymentQueue,
    S: Settlement,
{
    /// Creates a processor over `queue` using `settlement` for the
    /// per-payment work.
    #[must_use]
    pub fn new(queue: Q, settlement: S, config: ProcessorConfig) -> Self {
        Self {
            queue,
            settlement,
            config,
        }
    }

    /// Runs one claim-settle-commit pass.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PersistenceError`] if the claim or the final
    /// write fails. A failed write leaves the payment `pending`, so a later
    /// pass selects it again.
    pub async fn run_once(&self, shutdown: &CancellationToken) -> Result<PassOutcome, PaymentError> {
        let Some(claim) = self.queue.claim_next().await? else {
            tracing::trace!("no pending payments");
            return Ok(PassOutcome::Idle);
        };

        let mut payment = claim.payment().clone();
        let id = payment.id;
        tracing::info!(
            payment_id = %id,
            user_id = %payment.user_id,
            product_id = %payment.product_id,
            amount = %payment.amount,
            attempt = payment.attempts.saturating_add(1),
            "processing payment"
        );

        let settled = tokio::select! {
            biased;
            () = shutdown.cancelled() => None,
            result = self.settlement.settle(&payment) => Some(result),
        };
        let Some(settled) = settled else {
            tracing::warn!(payment_id = %id, "shutdown during settlement, releasing payment");
            claim.rollback().await?;
            return Ok(PassOutcome::Interrupted(id));
        };

        let now = Utc::now();
        let outcome = match settled {
            Ok(()) => {
                payment.mark_processed(now);
                PassOutcome::Processed(id)
            }
            Err(e) => {
                let reason = e.to_string();
                match payment.record_settlement_failure(&reason, self.config.max_attempts, now) {
                    PaymentStatus::Failed => PassOutcome::Failed(id),
                    _ => PassOutcome::Retrying {
                        id,
                        attempts: payment.attempts,
                    },
                }
            }
        };

        if let Err(e) = claim.commit(&payment).await {
            tracing::error!(payment_id = %id, error = %e, "failed to update payment, rolled back");
            return Err(e);
        }

        if matches!(outcome, PassOutcome::Processed(_) | PassOutcome::Failed(_)) {
            self.settlement.release(&payment);
        }

        match outcome {
            PassOutcome::Processed(_) => tracing::info!(payment_id = %id, "payment processed"),
            PassOutcome::Failed(_) => tracing::error!(
                payment_id = %id,
                attempts = payment.attempts,
                last_error = payment.last_error.as_deref().unwrap_or_default(),
                "payment failed permanently"
            ),
            PassOutcome::Retrying { attempts, .. } => tracing::warn!(
                payment_id = %id,
                attempts,
                last_error = payment.last_error.as_deref().unwrap_or_default(),
                "settlement failed, payment left pending"
            ),
            PassOutcome::Idle | PassOutcome::Interrupted(_) => {}
        }
        Ok(outcome)
    }

    /// Processes payments until `shutdown` is cancelled.
    ///
    /// The token is checked between passes and interrupts both backoff
    /// sleeps and in-flight settlement. No error ends the loop.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            poll_interval = ?self.config.idle_delay(),
            max_attempts = self.config.max_attempts,
            "queue processor started"
        );
        let mut consecutive_failures: u32 = 0;

        while !shutdown.is_cancelled() {
            let pause = match self.run_once(&shutdown).await {
                Ok(PassOutcome::Processed(_) | PassOutcome::Failed(_)) => {
                    consecutive_failures = 0;
                    Duration::ZERO
                }
                Ok(PassOutcome::Idle | PassOutcome::Retrying { .. }) => {
                    consecutive_failures = 0;
                    self.config.idle_delay()
                }
                Ok(PassOutcome::Interrupted(_)) => break,
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    let delay = self.config.backoff_delay(consecutive_failures);
                    tracing::error!(
                        error = %e,
                        consecutive_failures,
                        retry_in = ?delay,
                        "queue pass failed"
                    );
                    delay
                }
            };

            if !pause.is_zero() {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(pause) => {}
                }
            }
        }

        tracing::info!("queue processor stopped");
    }
}
