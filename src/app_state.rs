//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::RateLimiter;
use crate::service::PaymentService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Payment service for intake and lookups.
    pub payment_service: Arc<PaymentService>,
    /// Admission controller consulted before every request.
    pub rate_limiter: Arc<RateLimiter>,
    /// Key clients on `X-Forwarded-For` instead of the peer address.
    pub trust_forwarded_for: bool,
}
