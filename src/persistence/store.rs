//! Backend selection for the payment store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;

use super::memory::{InMemoryPaymentStore, MemoryClaim};
use super::postgres::{PostgresClaim, PostgresPaymentStore};
use super::queue::{ClaimedPayment, PaymentQueue};
use crate::config::{AppConfig, StorageBackend};
use crate::domain::{NewPayment, Payment, PaymentId, PaymentStatus};
use crate::error::PaymentError;

/// Store handle shared by the HTTP layer and the queue processor.
///
/// Built once at startup from [`AppConfig`] and cloned into each component.
#[derive(Debug, Clone)]
pub enum PaymentStore {
    /// PostgreSQL via `sqlx`.
    Postgres(PostgresPaymentStore),
    /// Process-local map, for development and tests.
    Memory(InMemoryPaymentStore),
}

impl PaymentStore {
    /// Connects to the configured backend, applying migrations when enabled.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError::PersistenceError`] if the database cannot
    /// be reached or a migration fails.
    pub async fn connect(config: &AppConfig) -> Result<Self, PaymentError> {
        match config.storage_backend {
            StorageBackend::Memory => {
                tracing::warn!("using in-memory payment store; data is lost on restart");
                Ok(Self::Memory(InMemoryPaymentStore::new()))
            }
            StorageBackend::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.database_max_connections)
                    .min_connections(config.database_min_connections)
                    .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
                    .connect(&config.database_url)
                    .await?;
                let store = PostgresPaymentStore::new(pool);
                if config.database_run_migrations {
                    store.migrate().await?;
                    tracing::info!("database migrations applied");
                }
                Ok(Self::Postgres(store))
            }
        }
    }

    /// Inserts a new `pending` payment stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError::PersistenceError`] on store failure.
    pub async fn insert(
        &self,
        new: &NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Payment, PaymentError> {
        match self {
            Self::Postgres(s) => s.insert(new, now).await,
            Self::Memory(s) => s.insert(new, now).await,
        }
    }

    /// Lists non-deleted payments, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError::PersistenceError`] on store failure.
    pub async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<Payment>, PaymentError> {
        match self {
            Self::Postgres(s) => s.list(status).await,
            Self::Memory(s) => s.list(status).await,
        }
    }

    /// Fetches one non-deleted payment.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PaymentNotFound`] if absent or soft-deleted.
    pub async fn get(&self, id: PaymentId) -> Result<Payment, PaymentError> {
        match self {
            Self::Postgres(s) => s.get(id).await,
            Self::Memory(s) => s.get(id).await,
        }
    }

    /// Soft-deletes a payment.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::PaymentNotFound`] if absent or already deleted.
    pub async fn soft_delete(&self, id: PaymentId, now: DateTime<Utc>) -> Result<(), PaymentError> {
        match self {
            Self::Postgres(s) => s.soft_delete(id, now).await,
            Self::Memory(s) => s.soft_delete(id, now).await,
        }
    }

    /// Checks store connectivity.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError::PersistenceError`] if the store is
    /// unreachable.
    pub async fn ping(&self) -> Result<(), PaymentError> {
        match self {
            Self::Postgres(s) => s.ping().await,
            Self::Memory(s) => s.ping().await,
        }
    }

    /// Short backend name for logs and health output.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

impl PaymentQueue for PaymentStore {
    type Claim = StoreClaim;

    async fn claim_next(&self) -> Result<Option<StoreClaim>, PaymentError> {
        Ok(match self {
            Self::Postgres(s) => s.claim_next().await?.map(StoreClaim::Postgres),
            Self::Memory(s) => s.claim_next().await?.map(StoreClaim::Memory),
        })
    }
}

/// Claim produced by [`PaymentStore`].
#[derive(Debug)]
pub enum StoreClaim {
    /// Row lock inside a Postgres transaction.
    Postgres(PostgresClaim),
    /// Emulated lock in the in-memory store.
    Memory(MemoryClaim),
}

impl ClaimedPayment for StoreClaim {
    fn payment(&self) -> &Payment {
        match self {
            Self::Postgres(c) => c.payment(),
            Self::Memory(c) => c.payment(),
        }
    }

    async fn commit(self, updated: &Payment) -> Result<Payment, PaymentError> {
        match self {
            Self::Postgres(c) => c.commit(updated).await,
            Self::Memory(c) => c.commit(updated).await,
        }
    }

    async fn rollback(self) -> Result<(), PaymentError> {
        match self {
            Self::Postgres(c) => c.rollback().await,
            Self::Memory(c) => c.rollback().await,
        }
    }
}
