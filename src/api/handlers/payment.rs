//! Payment handlers: enqueue, list, get, delete.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CreatePaymentRequest, ListPaymentsQuery};
use crate::app_state::AppState;
use crate::domain::{Payment, PaymentId};
use crate::error::{ErrorResponse, PaymentError};

/// `POST /payments`: Enqueue a new payment.
///
/// # Errors
///
/// Returns [`PaymentError::InvalidRequest`] on malformed JSON or invalid
/// fields.
#[utoipa::path(
    post,
    path = "/payments",
    tag = "Payments",
    summary = "Enqueue a payment",
    description = "Stores the payment with status `pending` and the current timestamp. The queue processor settles it asynchronously.",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment enqueued", body = Payment),
        (status = 400, description = "Invalid payment", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn create_payment(
    State(state): State<AppState>,
    body: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, PaymentError> {
    let Json(req) = body.map_err(|e| PaymentError::InvalidRequest(e.body_text()))?;

    let payment = state
        .payment_service
        .enqueue(&req.user_id, &req.product_id, req.amount)
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

/// `GET /payments`: List payments.
///
/// # Errors
///
/// Returns [`PaymentError::InvalidRequest`] on an unknown status filter.
#[utoipa::path(
    get,
    path = "/payments",
    tag = "Payments",
    summary = "List payments",
    description = "Returns every payment that has not been deleted, oldest first, optionally filtered by status.",
    params(ListPaymentsQuery),
    responses(
        (status = 200, description = "Payment list", body = Vec<Payment>),
        (status = 400, description = "Invalid status filter", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
    )
)]
pub async fn list_payments(
    State(state): State<AppState>,
    query: Result<Query<ListPaymentsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, PaymentError> {
    let Query(query) = query.map_err(|e| PaymentError::InvalidRequest(e.body_text()))?;
    let payments = state.payment_service.list(query.status).await?;
    Ok(Json(payments))
}

/// `GET /payments/{id}`: Get one payment.
///
/// # Errors
///
/// Returns [`PaymentError::InvalidRequest`] on a non-numeric ID and
/// [`PaymentError::PaymentNotFound`] if the payment does not exist.
#[utoipa::path(
    get,
    path = "/payments/{id}",
    tag = "Payments",
    summary = "Get a payment",
    params(
        ("id" = i64, Path, description = "Payment ID"),
    ),
    responses(
        (status = 200, description = "Payment details", body = Payment),
        (status = 400, description = "Invalid payment ID", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
    )
)]
pub async fn get_payment(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, PaymentError> {
    let id = payment_id(id)?;
    let payment = state.payment_service.get(id).await?;
    Ok(Json(payment))
}

/// `DELETE /payments/{id}`: Soft-delete a payment.
///
/// # Errors
///
/// Returns [`PaymentError::PaymentNotFound`] if the payment does not exist
/// or was already deleted.
#[utoipa::path(
    delete,
    path = "/payments/{id}",
    tag = "Payments",
    summary = "Delete a payment",
    description = "Marks the payment deleted. It disappears from reads and is never selected by the queue.",
    params(
        ("id" = i64, Path, description = "Payment ID"),
    ),
    responses(
        (status = 204, description = "Payment deleted"),
        (status = 400, description = "Invalid payment ID", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
    )
)]
pub async fn delete_payment(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, PaymentError> {
    let id = payment_id(id)?;
    state.payment_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn payment_id(path: Result<Path<i64>, PathRejection>) -> Result<PaymentId, PaymentError> {
    let Path(id) = path.map_err(|e| PaymentError::InvalidRequest(e.body_text()))?;
    Ok(PaymentId::new(id))
}

/// Payment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments", get(list_payments).post(create_payment))
        .route("/payments/{id}", get(get_payment).delete(delete_payment))
}
