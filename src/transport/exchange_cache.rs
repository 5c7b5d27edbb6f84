use std::collections::HashSet;

use parking_lot::RwLock;

use super::{Session, TransportError};

/// Exchanges already confirmed to exist.
///
/// Append-only: once an exchange is verified it is never checked again for
/// the lifetime of the cache. Share one cache between publishers with an
/// `Arc` if they talk to the same broker.
#[derive(Debug, Default)]
pub struct ExchangeCache {
    verified: RwLock<HashSet<String>>,
}

impl ExchangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_verified(&self, exchange: &str) -> bool {
        self.verified.read().contains(exchange)
    }

    pub fn len(&self) -> usize {
        self.verified.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.verified.read().is_empty()
    }

    /// Check `exchange` through `session` unless it was verified before.
    pub fn verify(&self, session: &mut dyn Session, exchange: &str) -> Result<(), TransportError> {
        if self.is_verified(exchange) {
            return Ok(());
        }
        session.verify_exchange(exchange)?;
        self.verified.write().insert(exchange.to_string());
        Ok(())
    }
}
