//! Domain layer: payment records, their lifecycle, and admission control.
//!
//! This module holds the store-independent model: the payment aggregate
//! and its status transitions, the typed identifier, and the sliding-window
//! rate limiter that gates inbound requests.

pub mod payment;
pub mod payment_id;
pub mod rate_limiter;

pub use payment::{NewPayment, Payment, PaymentStatus};
pub use payment_id::PaymentId;
pub use rate_limiter::{Admission, RateLimiter};
