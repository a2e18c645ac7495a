//! Domain layer - pure business logic with no external dependencies.
//!
//! This layer contains the core concepts and invariants of the throttle:
//! - Caller identities that scope rate limits
//! - Validated limiter configuration
//! - Call ledgers with rolling-window and minimum-interval accounting
//!
//! All types in this layer take time as an argument and are easily testable.

pub mod config;
pub mod identity;
pub mod ledger;
