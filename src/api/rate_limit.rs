//! Admission-control middleware.
//!
//! Runs before every handler. The client key is the peer IP from
//! [`ConnectInfo`], or the first `X-Forwarded-For` hop when the service is
//! configured to trust its proxy. Requests without either share the
//! `"unknown"` key.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::app_state::AppState;
use crate::domain::Admission;
use crate::error::PaymentError;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Rejects the request with `429` when its client key is over the limit.
///
/// # Errors
///
/// Returns [`PaymentError::RateLimited`] when the request is not admitted.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, PaymentError> {
    let key = client_key(&request, state.trust_forwarded_for);
    match state.rate_limiter.check(&key) {
        Admission::Admitted { .. } => Ok(next.run(request).await),
        Admission::Rejected { retry_after } => {
            let retry_after_ms = millis_ceil(retry_after);
            tracing::debug!(client = %key, retry_after_ms, "request rejected by rate limiter");
            Err(PaymentError::RateLimited { retry_after_ms })
        }
    }
}

fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}

fn millis_ceil(d: Duration) -> u64 {
    let whole = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
    if d.subsec_nanos() % 1_000_000 == 0 {
        whole
    } else {
        whole.saturating_add(1)
    }
}
