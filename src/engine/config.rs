//! Context configuration.
//!
//! [`ContextConfig`] is a plain value built from `Default` plus chained
//! `with_*` setters and handed to [`Context::with_config`].
//!
//! [`Context::with_config`]: crate::engine::context::Context::with_config

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::types::DEFAULT_STORE_CAPACITY;

/// Tunables of one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContextConfig {
    /// Backing capacity of a freshly created store.
    pub initial_store_capacity: usize,

    /// Re-validate the order of every store after each structural mutation.
    /// Panics on violation.
    pub verify_order: bool,

    /// Maximum number of queued commands. `None` means unbounded.
    pub max_deferred: Option<usize>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            initial_store_capacity: DEFAULT_STORE_CAPACITY,
            verify_order: cfg!(debug_assertions),
            max_deferred: None,
        }
    }
}

impl ContextConfig {
    /// Sets the backing capacity of new stores.
    pub fn with_initial_store_capacity(mut self, capacity: usize) -> Self {
        self.initial_store_capacity = capacity;
        self
    }

    /// Turns order verification on or off.
    pub fn with_verify_order(mut self, verify: bool) -> Self {
        self.verify_order = verify;
        self
    }

    /// Caps the deferred command queue.
    pub fn with_max_deferred(mut self, limit: usize) -> Self {
        self.max_deferred = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_chain() {
        let config = ContextConfig::default()
            .with_initial_store_capacity(64)
            .with_verify_order(false)
            .with_max_deferred(8);
        assert_eq!(config.initial_store_capacity, 64);
        assert!(!config.verify_order);
        assert_eq!(config.max_deferred, Some(8));
    }

    #[test]
    fn defaults() {
        let config = ContextConfig::default();
        assert_eq!(config.initial_store_capacity, 4);
        assert_eq!(config.verify_order, cfg!(debug_assertions));
        assert_eq!(config.max_deferred, None);
    }
}
