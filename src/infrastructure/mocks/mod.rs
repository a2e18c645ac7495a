//! Test doubles for the gate's ports.
//!
//! Compiled for this crate's own tests and, with the `test-helpers` feature,
//! for downstream test suites.

pub mod cache;
pub mod clock;
pub mod layer;

pub use cache::{MockCacheError, MockCacheStore};
pub use clock::MockClock;
pub use layer::{CapturedEvent, MockCaptureLayer};
