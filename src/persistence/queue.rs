//! Claim protocol shared by every payment store.

use std::future::Future;

use crate::domain::Payment;
use crate::error::PaymentError;

/// A pending payment locked inside an open store transaction.
///
/// The lock is held until [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). Dropping a claim rolls it back.
pub trait ClaimedPayment: Send {
    /// The payment as it was read under the lock.
    fn payment(&self) -> &Payment;

    /// Writes the mutable fields of `updated` and commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PersistenceError`] if the write or the commit
    /// fails; the transaction is rolled back in that case.
    fn commit(
        self,
        updated: &Payment,
    ) -> impl Future<Output = Result<Payment, PaymentError>> + Send;

    /// Abandons the claim, leaving the stored payment untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PersistenceError`] if the store rejects the
    /// rollback.
    fn rollback(self) -> impl Future<Output = Result<(), PaymentError>> + Send;
}

/// Source of pending payments for the queue processor.
pub trait PaymentQueue: Send + Sync {
    /// Claim handle produced by this store.
    type Claim: ClaimedPayment;

    /// Locks the oldest claimable payment (pending, not soft-deleted).
    ///
    /// Payments already locked by another claim are skipped. Returns
    /// `Ok(None)` when nothing is claimable.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PersistenceError`] if the transaction cannot
    /// be opened or the locking read fails.
    fn claim_next(&self) -> impl Future<Output = Result<Option<Self::Claim>, PaymentError>> + Send;
}
