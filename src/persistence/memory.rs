//! In-process payment store.
//!
//! Keeps payments in a `BTreeMap` behind a [`std::sync::Mutex`] and emulates
//! row locks with a set of claimed IDs, giving the same skip-locked claim
//! semantics as the Postgres store. Nothing survives a restart.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use super::queue::{ClaimedPayment, PaymentQueue};
use crate::domain::{NewPayment, Payment, PaymentId, PaymentStatus};
use crate::error::PaymentError;

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    rows: BTreeMap<PaymentId, Payment>,
    locked: HashSet<PaymentId>,
}

/// Shared-handle in-memory payment store. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryPaymentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new `pending` payment stamped with `now`.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the Postgres store.
    pub async fn insert(
        &self,
        new: &NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Payment, PaymentError> {
        let mut state = lock(&self.state);
        state.last_id += 1;
        let payment = Payment {
            id: PaymentId::new(state.last_id),
            user_id: new.user_id.clone(),
            product_id: new.product_id.clone(),
            amount: new.amount,
            status: PaymentStatus::Pending,
            idempotency_key: new.idempotency_key,
            attempts: 0,
            last_error: None,
            timestamp: now,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.rows.insert(payment.id, payment.clone());
        Ok(payment)
    }

    /// Lists non-deleted payments by ascending ID, optionally by status.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the Postgres store.
    pub async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<Payment>, PaymentError> {
        let state = lock(&self.state);
        Ok(state
            .rows
            .values()
            .filter(|p| p.deleted_at.is_none())
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect())
    }

    /// Fetches one non-deleted payment.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PaymentNotFound`] if the payment does not
    /// exist or was soft-deleted.
    pub async fn get(&self, id: PaymentId) -> Result<Payment, PaymentError> {
        let state = lock(&self.state);
        state
            .rows
            .get(&id)
            .filter(|p| p.deleted_at.is_none())
            .cloned()
            .ok_or(PaymentError::PaymentNotFound(id))
    }

    /// Marks a payment as soft-deleted.
    ///
    /// Unlike Postgres, deleting a claimed payment does not wait for the
    /// claim to finish. The outcome is the same as the serialized order
    /// there (commit, then delete): the claim's commit writes only the
    /// status columns, so the row ends up both settled and deleted.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PaymentNotFound`] if no live payment has this
    /// ID.
    pub async fn soft_delete(&self, id: PaymentId, now: DateTime<Utc>) -> Result<(), PaymentError> {
        let mut state = lock(&self.state);
        match state.rows.get_mut(&id) {
            Some(p) if p.deleted_at.is_none() => {
                p.deleted_at = Some(now);
                p.updated_at = now;
                Ok(())
            }
            _ => Err(PaymentError::PaymentNotFound(id)),
        }
    }

    /// Always reachable.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the Postgres store.
    pub async fn ping(&self) -> Result<(), PaymentError> {
        Ok(())
    }

    /// Number of payments currently claimed.
    #[must_use]
    pub fn locked_count(&self) -> usize {
        lock(&self.state).locked.len()
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PaymentQueue for InMemoryPaymentStore {
    type Claim = MemoryClaim;

    async fn claim_next(&self) -> Result<Option<MemoryClaim>, PaymentError> {
        let mut state = lock(&self.state);
        let next = state
            .rows
            .values()
            .filter(|p| p.is_claimable() && !state.locked.contains(&p.id))
            .min_by_key(|p| (p.created_at, p.id))
            .cloned();

        Ok(next.map(|payment| {
            state.locked.insert(payment.id);
            MemoryClaim {
                state: Arc::clone(&self.state),
                payment,
                open: true,
            }
        }))
    }
}

/// A payment claimed from the in-memory store.
#[derive(Debug)]
pub struct MemoryClaim {
    state: Arc<Mutex<MemoryState>>,
    payment: Payment,
    open: bool,
}

impl MemoryClaim {
    fn release(&mut self, state: &mut MemoryState) {
        if self.open {
            state.locked.remove(&self.payment.id);
            self.open = false;
        }
    }
}

impl ClaimedPayment for MemoryClaim {
    fn payment(&self) -> &Payment {
        &self.payment
    }

    async fn commit(mut self, updated: &Payment) -> Result<Payment, PaymentError> {
        let state_handle = Arc::clone(&self.state);
        let mut state = lock(&state_handle);
        let id = self.payment.id;

        let written = match state.rows.get_mut(&id) {
            Some(row) => {
                row.status = updated.status;
                row.attempts = updated.attempts;
                row.last_error.clone_from(&updated.last_error);
                row.updated_at = updated.updated_at;
                Ok(row.clone())
            }
            None => Err(PaymentError::PersistenceError(format!(
                "payment {id} vanished while claimed"
            ))),
        };
        self.release(&mut state);
        written
    }

    async fn rollback(mut self) -> Result<(), PaymentError> {
        let state_handle = Arc::clone(&self.state);
        let mut state = lock(&state_handle);
        self.release(&mut state);
        Ok(())
    }
}

impl Drop for MemoryClaim {
    fn drop(&mut self) {
        if self.open {
            let state_handle = Arc::clone(&self.state);
            let mut state = lock(&state_handle);
            self.release(&mut state);
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;

    fn new_payment(user: &str) -> NewPayment {
        let Ok(p) = NewPayment::new(user, "prod1", dec!(10)) else {
            panic!("valid payment rejected");
        };
        p
    }

    async fn claim(store: &InMemoryPaymentStore) -> MemoryClaim {
        let Ok(Some(claim)) = store.claim_next().await else {
            panic!("expected a claimable payment");
        };
        claim
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids_and_pending_status() {
        let store = InMemoryPaymentStore::new();
        let now = Utc::now();
        let (Ok(a), Ok(b)) = (
            store.insert(&new_payment("a"), now).await,
            store.insert(&new_payment("b"), now).await,
        ) else {
            panic!("insert failed");
        };
        assert_eq!(a.id, PaymentId::new(1));
        assert_eq!(b.id, PaymentId::new(2));
        assert_eq!(a.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn delete_during_claim_keeps_deletion_after_commit() {
        let store = InMemoryPaymentStore::new();
        let Ok(p) = store.insert(&new_payment("a"), Utc::now()).await else {
            panic!("insert failed");
        };
        let claim = claim(&store).await;
        assert!(store.soft_delete(p.id, Utc::now()).await.is_ok());

        let mut settled = claim.payment().clone();
        settled.mark_processed(Utc::now());
        let Ok(written) = claim.commit(&settled).await else {
            panic!("commit failed");
        };
        assert_eq!(written.status, PaymentStatus::Processed);
        assert!(written.deleted_at.is_some());
        assert!(store.get(p.id).await.is_err());
        assert!(matches!(store.claim_next().await, Ok(None)));
        assert_eq!(store.locked_count(), 0);
    }

    #[tokio::test]
    async fn claims_oldest_created_first() {
        let store = InMemoryPaymentStore::new();
        let t1 = Utc::now();
        let t0 = t1 - Duration::seconds(5);
        let _ = store.insert(&new_payment("late"), t1).await;
        let _ = store.insert(&new_payment("early"), t0).await;

        let first = claim(&store).await;
        assert_eq!(first.payment().user_id, "early");
    }

    #[tokio::test]
    async fn locked_payment_is_skipped_by_second_claim() {
        let store = InMemoryPaymentStore::new();
        let now = Utc::now();
        let _ = store.insert(&new_payment("a"), now).await;
        let _ = store.insert(&new_payment("b"), now).await;

        let first = claim(&store).await;
        let second = claim(&store).await;
        assert_ne!(first.payment().id, second.payment().id);

        let Ok(third) = store.claim_next().await else {
            panic!("claim failed");
        };
        assert!(third.is_none());
    }

    #[tokio::test]
    async fn dropped_claim_releases_lock() {
        let store = InMemoryPaymentStore::new();
        let _ = store.insert(&new_payment("a"), Utc::now()).await;

        let first = claim(&store).await;
        let id = first.payment().id;
        assert_eq!(store.locked_count(), 1);
        drop(first);
        assert_eq!(store.locked_count(), 0);

        let again = claim(&store).await;
        assert_eq!(again.payment().id, id);
    }

    #[tokio::test]
    async fn commit_writes_only_mutable_fields() {
        let store = InMemoryPaymentStore::new();
        let _ = store.insert(&new_payment("a"), Utc::now()).await;

        let claimed = claim(&store).await;
        let mut updated = claimed.payment().clone();
        updated.mark_processed(Utc::now());
        updated.user_id = "tampered".to_string();
        let Ok(written) = claimed.commit(&updated).await else {
            panic!("commit failed");
        };

        assert_eq!(written.status, PaymentStatus::Processed);
        assert_eq!(written.user_id, "a");
        assert_eq!(store.locked_count(), 0);
        let Ok(None) = store.claim_next().await else {
            panic!("processed payment must not be claimable");
        };
    }

    #[tokio::test]
    async fn soft_deleted_payments_are_hidden_and_unclaimable() {
        let store = InMemoryPaymentStore::new();
        let Ok(p) = store.insert(&new_payment("a"), Utc::now()).await else {
            panic!("insert failed");
        };
        assert!(store.soft_delete(p.id, Utc::now()).await.is_ok());

        assert!(matches!(
            store.get(p.id).await,
            Err(PaymentError::PaymentNotFound(_))
        ));
        assert!(store.list(None).await.is_ok_and(|l| l.is_empty()));
        assert!(store.claim_next().await.is_ok_and(|c| c.is_none()));
        assert!(store.soft_delete(p.id, Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let store = InMemoryPaymentStore::new();
        let _ = store.insert(&new_payment("a"), Utc::now()).await;
        let _ = store.insert(&new_payment("b"), Utc::now()).await;
        let claimed = claim(&store).await;
        let mut updated = claimed.payment().clone();
        updated.mark_processed(Utc::now());
        let _ = claimed.commit(&updated).await;

        let Ok(processed) = store.list(Some(PaymentStatus::Processed)).await else {
            panic!("list failed");
        };
        assert_eq!(processed.len(), 1);
        let Ok(all) = store.list(None).await else {
            panic!("list failed");
        };
        assert_eq!(all.len(), 2);
    }
}
