//! Service layer: intake orchestration and asynchronous settlement.
//!
//! [`PaymentService`] backs the HTTP handlers. [`QueueProcessor`] runs as a
//! background task that claims pending payments and settles them through a
//! [`Settlement`] implementation.

pub mod payment_service;
pub mod queue_processor;
pub mod settlement;

pub use payment_service::PaymentService;
pub use queue_processor::{PassOutcome, ProcessorConfig, QueueProcessor};
pub use settlement::{Settlement, SimulatedSettlement};
