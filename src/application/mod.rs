//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Identity registry (storage of per-identity ledgers)
//! - Throttle gate (cache probe, waits, recording)
//! - Cache probe adapter and metrics
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod gate;
pub mod metrics;
pub mod ports;
pub mod probe;
pub mod registry;
