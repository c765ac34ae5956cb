//! Database row model for the `payments` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Payment, PaymentId};
use crate::error::PaymentError;

/// Column list shared by every query that returns whole payment rows.
pub const PAYMENT_COLUMNS: &str = "id, user_id, product_id, amount, status, idempotency_key, \
     attempts, last_error, \"timestamp\", created_at, updated_at, deleted_at";

/// A raw row from the `payments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    /// `BIGSERIAL` primary key.
    pub id: i64,
    /// Paying user.
    pub user_id: String,
    /// Purchased product.
    pub product_id: String,
    /// `NUMERIC` amount.
    pub amount: Decimal,
    /// Status in storage form.
    pub status: String,
    /// Settlement idempotency token.
    pub idempotency_key: Uuid,
    /// Failed settlement attempts.
    pub attempts: i32,
    /// Last settlement error.
    pub last_error: Option<String>,
    /// Intake time.
    pub timestamp: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last rewrite.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = PaymentError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|_| {
            PaymentError::PersistenceError(format!(
                "payment {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;
        Ok(Self {
            id: PaymentId::new(row.id),
            user_id: row.user_id,
            product_id: row.product_id,
            amount: row.amount,
            status,
            idempotency_key: row.idempotency_key,
            attempts: row.attempts,
            last_error: row.last_error,
            timestamp: row.timestamp,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}
