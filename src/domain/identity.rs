//! Caller identities for rate-limit scoping.
//!
//! An identity names one logical rate-limit scope, typically the provider
//! client issuing the calls. All limiter state is partitioned by identity, so
//! calls under different identities never delay each other.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Opaque key identifying an independent rate-limit scope.
///
/// Cloning is cheap: the name is reference counted and shared between the
/// registry and every caller holding the identity.
///
/// # Example
/// ```
/// use throttle_gate::Identity;
///
/// let quotes = Identity::from("quotes-api");
/// let fundamentals = Identity::new(String::from("fundamentals-api"));
///
/// assert_ne!(quotes, fundamentals);
/// assert_eq!(quotes.as_str(), "quotes-api");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Arc<str>);

impl Identity {
    /// Create an identity from any string-like name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Identity(name.into())
    }

    /// The identity's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Identity::new(name)
    }
}

impl From<String> for Identity {
    fn from(name: String) -> Self {
        Identity::new(name)
    }
}

impl From<&Identity> for Identity {
    fn from(identity: &Identity) -> Self {
        identity.clone()
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
