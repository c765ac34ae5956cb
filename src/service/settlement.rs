//! Settlement step performed while a payment is claimed.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use uuid::Uuid;

use crate::domain::Payment;
use crate::error::PaymentError;

/// External effect applied to a claimed payment (a charge, a ledger post).
///
/// Implementations receive the payment's `idempotency_key` and must treat a
/// repeated key as already applied: a payment whose status write failed is
/// claimed again and settled a second time.
pub trait Settlement: Send + Sync {
    /// Settles `payment`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::SettlementFailed`] if the effect was refused
    /// or could not be applied.
    fn settle(&self, payment: &Payment) -> impl Future<Output = Result<(), PaymentError>> + Send;

    /// Called once the payment's terminal status is committed. It can no
    /// longer be claimed, so any state kept for its key may be dropped.
    fn release(&self, _payment: &Payment) {}
}

impl<T: Settlement> Settlement for Arc<T> {
    fn settle(&self, payment: &Payment) -> impl Future<Output = Result<(), PaymentError>> + Send {
        (**self).settle(payment)
    }

    fn release(&self, payment: &Payment) {
        (**self).release(payment);
    }
}

/// Stand-in for a payment gateway: waits a fixed duration, then succeeds.
///
/// Remembers the idempotency keys it settled and returns immediately for a
/// key it has already seen. A key is kept until [`Settlement::release`]
/// reports the payment's status as committed.
#[derive(Debug)]
pub struct SimulatedSettlement {
    duration: Duration,
    settled: Mutex<HashSet<Uuid>>,
    applied: AtomicUsize,
}

impl SimulatedSettlement {
    /// Creates a settlement step that takes `duration` per payment.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            settled: Mutex::new(HashSet::new()),
            applied: AtomicUsize::new(0),
        }
    }

    /// Number of times the settlement effect was actually applied.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }

    /// Keys settled but not yet released.
    #[must_use]
    pub fn retained_keys(&self) -> usize {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn already_settled(&self, key: &Uuid) -> bool {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

impl Settlement for SimulatedSettlement {
    async fn settle(&self, payment: &Payment) -> Result<(), PaymentError> {
        let key = payment.idempotency_key;
        if self.already_settled(&key) {
            tracing::info!(payment_id = %payment.id, idempotency_key = %key, "settlement already applied, skipping");
            return Ok(());
        }

        tokio::time::sleep(self.duration).await;

        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self, payment: &Payment) {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&payment.idempotency_key);
    }
}
