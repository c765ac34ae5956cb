//! # payment-queue
//!
//! Payment intake API backed by a relational store, with asynchronous
//! settlement by a lock-based job queue and per-client admission control.
//!
//! Requests pass the sliding-window [`domain::RateLimiter`] before reaching
//! a handler. Handlers write new payments as `pending`; the
//! [`service::QueueProcessor`] claims the oldest pending payment under a
//! row lock, settles it, and commits its new status in the same
//! transaction.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── Rate limiter middleware (api/rate_limit)
//!     ├── REST Handlers (api/)
//!     │
//!     ├── PaymentService (service/)
//!     │
//!     ├── PaymentStore (persistence/) ◄── QueueProcessor (service/)
//!     │                                        │
//!     └── PostgreSQL / in-memory               └── Settlement
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
