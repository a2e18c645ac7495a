//! Central registry for per-identity call ledgers.
//!
//! The registry owns one ledger per identity, created lazily on first use and
//! kept for the lifetime of the registry. Each ledger sits behind its own async
//! mutex so that a caller waiting out its identity's limits only blocks other
//! callers of that same identity.

use crate::application::ports::{Clock, Storage};
use crate::domain::{config::LimiterConfig, identity::Identity, ledger::CallLedger};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Shared, lockable ledger for one identity.
pub type LedgerSlot = Arc<Mutex<CallLedger>>;

/// Read-only view of one identity's rate-limit state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySnapshot {
    /// The identity described
    pub identity: Identity,
    /// Actual calls that still count toward the rolling window
    pub calls_in_window: usize,
    /// When the most recent actual call was recorded
    pub last_call: Option<Instant>,
    /// Delay an actual call issued now would incur
    pub next_call_delay: Duration,
}

/// Registry managing all per-identity ledgers.
///
/// Uses the Storage port for concurrent access. The storage only hands out
/// clones of the ledger slot; no storage lock is held while a ledger is in use.
///
/// This type is generic over the storage implementation, allowing different
/// storage backends to be used. In production, use `Arc<ShardedStorage>`.
#[derive(Clone)]
pub struct IdentityRegistry<S>
where
    S: Storage<Identity, LedgerSlot> + Clone,
{
    storage: S,
    clock: Arc<dyn Clock>,
    config: Arc<LimiterConfig>,
}

impl<S> IdentityRegistry<S>
where
    S: Storage<Identity, LedgerSlot> + Clone,
{
    /// Create a new registry with storage, clock, and the limiter configuration.
    pub fn new(storage: S, clock: Arc<dyn Clock>, config: LimiterConfig) -> Self {
        Self {
            storage,
            clock,
            config: Arc::new(config),
        }
    }

    /// Get the ledger slot for an identity, creating an empty one on first use.
    pub(crate) fn ledger(&self, identity: &Identity) -> LedgerSlot {
        self.storage.with_entry_mut(
            identity.clone(),
            || Arc::new(Mutex::new(CallLedger::new())),
            |slot| Arc::clone(slot),
        )
    }

    /// Get the ledger slot for an identity only if it is already tracked.
    pub(crate) fn existing_ledger(&self, identity: &Identity) -> Option<LedgerSlot> {
        self.storage.with_entry(identity, Arc::clone)
    }

    /// Describe an identity's current state without mutating it.
    ///
    /// Waits for the identity's lock, so a snapshot taken while another caller
    /// is waiting out a limit reflects the state after that caller records.
    /// Returns `None` for identities that have never made an actual call.
    pub async fn snapshot(&self, identity: &Identity) -> Option<IdentitySnapshot> {
        let slot = self.existing_ledger(identity)?;
        let ledger = slot.lock().await;
        let now = self.clock.now();

        Some(IdentitySnapshot {
            identity: identity.clone(),
            calls_in_window: ledger.calls_within(now, self.config.window()),
            last_call: ledger.last_call(),
            next_call_delay: ledger.projected_delay(now, &self.config),
        })
    }

    /// Names of all tracked identities.
    pub fn identities(&self) -> Vec<Identity> {
        let mut identities = Vec::with_capacity(self.storage.len());
        self.storage
            .for_each(|identity, _| identities.push(identity.clone()));
        identities
    }

    /// Get the limiter configuration.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Get the clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Get the number of tracked identities.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
