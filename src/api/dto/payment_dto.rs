//! Payment intake and listing DTOs.

use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::PaymentStatus;

/// Request body for `POST /payments`.
///
/// `id` and `status` are assigned by the service; if present in the body
/// they are ignored.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    /// Paying user (ASCII alphanumeric).
    #[schema(example = "user42")]
    pub user_id: String,
    /// Purchased product (ASCII alphanumeric).
    #[schema(example = "sku1001")]
    pub product_id: String,
    /// Amount greater than zero.
    #[schema(value_type = String, example = "19.99")]
    pub amount: Decimal,
}

/// Query parameters for `GET /payments`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPaymentsQuery {
    /// Only return payments in this status.
    #[serde(default)]
    pub status: Option<PaymentStatus>,
}
