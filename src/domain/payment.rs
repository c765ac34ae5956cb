//! Payment aggregate and its status lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::PaymentId;
use crate::error::PaymentError;

/// Processing status of a payment.
///
/// `Pending` is the only status the queue selects. `Processed` and `Failed`
/// are terminal: nothing moves a payment back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting settlement.
    Pending,
    /// Settled successfully.
    Processed,
    /// Gave up after exhausting settlement attempts.
    Failed,
}

impl PaymentStatus {
    /// Storage representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` for statuses the queue never touches again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            other => Err(PaymentError::InvalidRequest(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// A stored payment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    /// Store-assigned identifier.
    pub id: PaymentId,
    /// Paying user (alphanumeric, immutable).
    pub user_id: String,
    /// Purchased product (alphanumeric, immutable).
    pub product_id: String,
    /// Positive amount, serialized as a decimal string.
    #[schema(value_type = String, example = "19.99")]
    pub amount: Decimal,
    /// Current lifecycle status.
    pub status: PaymentStatus,
    /// Token handed to the settlement step so a re-run cannot double-apply.
    pub idempotency_key: Uuid,
    /// Number of settlement attempts that ended in an error.
    pub attempts: i32,
    /// Message of the most recent settlement error, if any.
    pub last_error: Option<String>,
    /// Intake time.
    pub timestamp: DateTime<Utc>,
    /// Creation time; the FIFO ordering key of the queue.
    pub created_at: DateTime<Utc>,
    /// Time of the last rewrite.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Returns `true` if the queue may select this payment.
    #[must_use]
    pub fn is_claimable(&self) -> bool {
        self.status == PaymentStatus::Pending && self.deleted_at.is_none()
    }

    /// Transitions a settled payment to `processed`.
    pub fn mark_processed(&mut self, now: DateTime<Utc>) {
        self.status = PaymentStatus::Processed;
        self.last_error = None;
        self.updated_at = now;
    }

    /// Records a failed settlement attempt.
    ///
    /// The payment stays `pending` until `max_attempts` failures have been
    /// recorded, after which it becomes `failed`. Returns the new status.
    pub fn record_settlement_failure(
        &mut self,
        reason: &str,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> PaymentStatus {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(reason.to_string());
        self.updated_at = now;
        let exhausted = u32::try_from(self.attempts).unwrap_or(u32::MAX) >= max_attempts;
        if exhausted {
            self.status = PaymentStatus::Failed;
        }
        self.status
    }
}

/// Fractional digits the `amount` column keeps.
pub const AMOUNT_SCALE: u32 = 4;

/// Integer digits the `amount` column keeps (`NUMERIC(20, 4)`).
const AMOUNT_INTEGER_DIGITS: u32 = 16;

/// A validated payment awaiting insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    /// Paying user.
    pub user_id: String,
    /// Purchased product.
    pub product_id: String,
    /// Positive amount.
    pub amount: Decimal,
    /// Settlement idempotency token.
    pub idempotency_key: Uuid,
}

impl NewPayment {
    /// Validates intake fields and assigns a fresh idempotency key.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InvalidRequest`] if an identifier is empty or
    /// not ASCII alphanumeric, or if `amount` is not strictly positive or
    /// does not fit the stored precision ([`AMOUNT_SCALE`] decimal places,
    /// 16 integer digits).
    pub fn new(user_id: &str, product_id: &str, amount: Decimal) -> Result<Self, PaymentError> {
        validate_identifier("user_id", user_id)?;
        validate_identifier("product_id", product_id)?;
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidRequest(
                "amount must be greater than zero".to_string(),
            ));
        }
        validate_precision(amount)?;
        Ok(Self {
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            amount,
            idempotency_key: Uuid::new_v4(),
        })
    }
}

fn validate_precision(amount: Decimal) -> Result<(), PaymentError> {
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(PaymentError::InvalidRequest(format!(
            "amount must have at most {AMOUNT_SCALE} decimal places"
        )));
    }
    if amount.trunc() >= Decimal::from(10_i64.pow(AMOUNT_INTEGER_DIGITS)) {
        return Err(PaymentError::InvalidRequest(format!(
            "amount must be below 10^{AMOUNT_INTEGER_DIGITS}"
        )));
    }
    Ok(())
}

fn validate_identifier(field: &str, value: &str) -> Result<(), PaymentError> {
    if value.is_empty() {
        return Err(PaymentError::InvalidRequest(format!("{field} is required")));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PaymentError::InvalidRequest(format!(
            "{field} must be alphanumeric"
        )));
    }
    Ok(())
}
