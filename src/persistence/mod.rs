//! Persistence layer: payment storage and the transactional claim protocol.
//!
//! [`PaymentQueue`] is the seam the queue processor works against: a claim
//! holds an open transaction and an exclusive lock on one pending payment
//! until it is committed or rolled back. Two backends implement it,
//! [`PostgresPaymentStore`] on `sqlx::PgPool` and [`InMemoryPaymentStore`]
//! for development and tests. [`PaymentStore`] selects one at startup.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod queue;
pub mod store;

pub use memory::InMemoryPaymentStore;
pub use postgres::PostgresPaymentStore;
pub use queue::{ClaimedPayment, PaymentQueue};
pub use store::{PaymentStore, StoreClaim};
