//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::CreatePaymentRequest;
use super::handlers::{payment, system};
use crate::domain::{Payment, PaymentId, PaymentStatus};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI description, served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "Payment Queue API",
        description = "Payment intake with asynchronous, lock-based settlement"
    ),
    paths(
        payment::create_payment,
        payment::list_payments,
        payment::get_payment,
        payment::delete_payment,
        system::health_handler,
    ),
    components(schemas(
        Payment,
        PaymentId,
        PaymentStatus,
        CreatePaymentRequest,
        ErrorResponse,
        ErrorBody,
        system::HealthResponse,
    )),
    tags(
        (name = "Payments", description = "Payment intake and lookup"),
        (name = "System", description = "Operational endpoints"),
    )
)]
pub struct ApiDoc;
