//! Type-safe payment identifier.
//!
//! [`PaymentId`] is a newtype wrapper around the store-assigned `BIGSERIAL`
//! key so that payment identifiers cannot be confused with other integers
//! (attempt counters, limits, durations).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a payment record.
///
/// Assigned by the store on insert and immutable thereafter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct PaymentId(i64);

impl PaymentId {
    /// Wraps a raw store key.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw store key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PaymentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<i64> for PaymentId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<PaymentId> for i64 {
    fn from(id: PaymentId) -> Self {
        id.0
    }
}
