//! Payment service: validates intake and talks to the store.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::domain::{NewPayment, Payment, PaymentId, PaymentStatus};
use crate::error::PaymentError;
use crate::persistence::PaymentStore;

/// Orchestration layer for the payment endpoints.
///
/// Every new payment is written as `pending`; the queue processor picks it
/// up from the store independently of the request that created it.
#[derive(Debug, Clone)]
pub struct PaymentService {
    store: PaymentStore,
}

impl PaymentService {
    /// Creates a new `PaymentService`.
    #[must_use]
    pub fn new(store: PaymentStore) -> Self {
        Self { store }
    }

    /// Returns a reference to the inner [`PaymentStore`].
    #[must_use]
    pub fn store(&self) -> &PaymentStore {
        &self.store
    }

    /// Validates and enqueues a payment.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InvalidRequest`] on invalid fields, or a
    /// [`PaymentError::PersistenceError`] if the insert fails.
    pub async fn enqueue(
        &self,
        user_id: &str,
        product_id: &str,
        amount: Decimal,
    ) -> Result<Payment, PaymentError> {
        let new = NewPayment::new(user_id, product_id, amount)?;
        let payment = self.store.insert(&new, Utc::now()).await?;

        tracing::info!(
            payment_id = %payment.id,
            user_id = %payment.user_id,
            amount = %payment.amount,
            product_id = %payment.product_id,
            "payment enqueued"
        );
        Ok(payment)
    }

    /// Lists live payments, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError::PersistenceError`] on store failure.
    pub async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<Payment>, PaymentError> {
        let payments = self.store.list(status).await?;
        tracing::debug!(count = payments.len(), "listed payments");
        Ok(payments)
    }

    /// Fetches one payment.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PaymentNotFound`] if the payment does not
    /// exist or was soft-deleted.
    pub async fn get(&self, id: PaymentId) -> Result<Payment, PaymentError> {
        self.store.get(id).await
    }

    /// Soft-deletes a payment, hiding it from reads and from the queue.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PaymentNotFound`] if the payment does not
    /// exist or was already deleted.
    pub async fn delete(&self, id: PaymentId) -> Result<(), PaymentError> {
        self.store.soft_delete(id, Utc::now()).await?;
        tracing::info!(payment_id = %id, "payment soft-deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::persistence::InMemoryPaymentStore;

    fn service() -> PaymentService {
        PaymentService::new(PaymentStore::Memory(InMemoryPaymentStore::new()))
    }

    #[tokio::test]
    async fn enqueue_stores_pending_payment() {
        let svc = service();
        let Ok(p) = svc.enqueue("user1", "prod1", dec!(9.99)).await else {
            panic!("enqueue failed");
        };
        assert_eq!(p.status, PaymentStatus::Pending);
        assert_eq!(p.timestamp, p.created_at);

        let Ok(fetched) = svc.get(p.id).await else {
            panic!("get failed");
        };
        assert_eq!(fetched, p);
    }

    #[tokio::test]
    async fn enqueue_rejects_invalid_input_without_writing() {
        let svc = service();
        let result = svc.enqueue("user 1", "prod1", dec!(1)).await;
        assert!(matches!(result, Err(PaymentError::InvalidRequest(_))));
        assert!(svc.list(None).await.is_ok_and(|l| l.is_empty()));
    }

    #[tokio::test]
    async fn delete_hides_payment() {
        let svc = service();
        let Ok(p) = svc.enqueue("user1", "prod1", dec!(1)).await else {
            panic!("enqueue failed");
        };
        assert!(svc.delete(p.id).await.is_ok());
        assert!(matches!(
            svc.get(p.id).await,
            Err(PaymentError::PaymentNotFound(_))
        ));
        assert!(matches!(
            svc.delete(p.id).await,
            Err(PaymentError::PaymentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let result = service().get(PaymentId::new(404)).await;
        assert!(matches!(result, Err(PaymentError::PaymentNotFound(id)) if id.get() == 404));
    }
}
