//! Data Transfer Objects for REST request/response serialization.
//!
//! Amounts are decimals; responses serialize them as JSON strings to keep
//! precision, requests accept either a string or a number.

pub mod payment_dto;

pub use payment_dto::*;
