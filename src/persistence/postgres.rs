//! PostgreSQL implementation of the payment store.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::models::{PAYMENT_COLUMNS, PaymentRow};
use super::queue::{ClaimedPayment, PaymentQueue};
use crate::domain::{NewPayment, Payment, PaymentId, PaymentStatus};
use crate::error::PaymentError;

/// PostgreSQL-backed payment store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    /// Creates a new store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), PaymentError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts a new `pending` payment stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError::PersistenceError`] on database failure.
    pub async fn insert(
        &self,
        new: &NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Payment, PaymentError> {
        let sql = format!(
            "INSERT INTO payments \
             (user_id, product_id, amount, status, idempotency_key, \"timestamp\", created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6, $6) RETURNING {PAYMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(&new.user_id)
            .bind(&new.product_id)
            .bind(new.amount)
            .bind(PaymentStatus::Pending.as_str())
            .bind(new.idempotency_key)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Payment::try_from(row)
    }

    /// Lists non-deleted payments by ascending ID, optionally by status.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError::PersistenceError`] on database failure.
    pub async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<Payment>, PaymentError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE deleted_at IS NULL AND ($1::text IS NULL OR status = $1) \
             ORDER BY id ASC"
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(status.map(PaymentStatus::as_str))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    /// Fetches one non-deleted payment.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PaymentNotFound`] if the payment does not
    /// exist or was soft-deleted, or a [`PaymentError::PersistenceError`] on
    /// database failure.
    pub async fn get(&self, id: PaymentId) -> Result<Payment, PaymentError> {
        let sql =
            format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(PaymentError::PaymentNotFound(id))
            .and_then(Payment::try_from)
    }

    /// Marks a payment as soft-deleted.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PaymentNotFound`] if no live payment has this
    /// ID, or a [`PaymentError::PersistenceError`] on database failure.
    pub async fn soft_delete(&self, id: PaymentId, now: DateTime<Utc>) -> Result<(), PaymentError> {
        let result = sqlx::query(
            "UPDATE payments SET deleted_at = $2, updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.get())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PaymentError::PaymentNotFound(id));
        }
        Ok(())
    }

    /// Round-trips a trivial query to check connectivity.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError::PersistenceError`] if the database is
    /// unreachable.
    pub async fn ping(&self) -> Result<(), PaymentError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl PaymentQueue for PostgresPaymentStore {
    type Claim = PostgresClaim;

    async fn claim_next(&self) -> Result<Option<PostgresClaim>, PaymentError> {
        let mut tx = self.pool.begin().await?;

        // SKIP LOCKED lets a second consumer move on to the next-oldest row
        // instead of queueing behind a payment that is mid-settlement.
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE status = 'pending' AND deleted_at IS NULL \
             ORDER BY created_at ASC, id ASC \
             LIMIT 1 FOR UPDATE SKIP LOCKED"
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .fetch_optional(&mut *tx)
            .await;

        match row {
            Ok(Some(row)) => match Payment::try_from(row) {
                Ok(payment) => Ok(Some(PostgresClaim { tx, payment })),
                Err(e) => {
                    tx.rollback().await?;
                    Err(e)
                }
            },
            Ok(None) => {
                tx.rollback().await?;
                Ok(None)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after failed claim also failed");
                }
                Err(e.into())
            }
        }
    }
}

/// A payment row locked by `SELECT ... FOR UPDATE` inside an open transaction.
pub struct PostgresClaim {
    tx: Transaction<'static, Postgres>,
    payment: Payment,
}

impl std::fmt::Debug for PostgresClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresClaim")
            .field("payment_id", &self.payment.id)
            .finish_non_exhaustive()
    }
}

impl ClaimedPayment for PostgresClaim {
    fn payment(&self) -> &Payment {
        &self.payment
    }

    async fn commit(self, updated: &Payment) -> Result<Payment, PaymentError> {
        let Self { mut tx, payment } = self;

        let sql = format!(
            "UPDATE payments SET status = $2, attempts = $3, last_error = $4, updated_at = $5 \
             WHERE id = $1 RETURNING {PAYMENT_COLUMNS}"
        );
        let written = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(payment.id.get())
            .bind(updated.status.as_str())
            .bind(updated.attempts)
            .bind(updated.last_error.as_deref())
            .bind(updated.updated_at)
            .fetch_one(&mut *tx)
            .await;

        let row = match written {
            Ok(row) => row,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(payment_id = %payment.id, error = %rollback_err, "rollback after failed write also failed");
                }
                return Err(e.into());
            }
        };

        tx.commit().await?;
        Payment::try_from(row)
    }

    async fn rollback(self) -> Result<(), PaymentError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
