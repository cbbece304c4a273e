//! Registry configuration.
//!
//! ```rust,ignore
//! let registry = Registry::with_config(
//!     Config::new().with_capacity(256).with_shard_amount(16),
//! )?;
//! ```

use crate::error::{Error, Result};

/// Construction options for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Initial capacity of the host map.
    pub capacity: usize,

    /// Number of shards in the host map. `None` lets `DashMap` pick based on the core count.
    pub shard_amount: Option<usize>,

    /// Whether the registry starts initialized. When `false`, [`init`](crate::Registry::init)
    /// must be called before the first attach.
    pub initialized: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 0,
            shard_amount: None,
            initialized: true,
        }
    }
}

impl Config {
    /// Create the default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial host map capacity.
    #[inline]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the host map shard amount.
    #[inline]
    pub fn with_shard_amount(mut self, shard_amount: usize) -> Self {
        self.shard_amount = Some(shard_amount);
        self
    }

    /// Start the registry uninitialized.
    #[inline]
    pub fn uninitialized(mut self) -> Self {
        self.initialized = false;
        self
    }

    /// Check the configuration can build a host map.
    pub fn validate(&self) -> Result<()> {
        if let Some(amount) = self.shard_amount
            && (amount < 2 || !amount.is_power_of_two())
        {
            return Err(Error::InvalidShardAmount(amount));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid_and_initialized() {
        // Given
        let config = Config::default();

        // Then
        assert!(config.validate().is_ok());
        assert!(config.initialized);
        assert_eq!(config.shard_amount, None);
    }

    #[test]
    fn shard_amount_must_be_power_of_two() {
        assert!(Config::new().with_shard_amount(8).validate().is_ok());
        assert_eq!(
            Config::new().with_shard_amount(6).validate(),
            Err(Error::InvalidShardAmount(6))
        );
        assert_eq!(
            Config::new().with_shard_amount(1).validate(),
            Err(Error::InvalidShardAmount(1))
        );
        assert_eq!(
            Config::new().with_shard_amount(0).validate(),
            Err(Error::InvalidShardAmount(0))
        );
    }

    #[test]
    fn builder_setters() {
        // When
        let config = Config::new()
            .with_capacity(64)
            .with_shard_amount(4)
            .uninitialized();

        // Then
        assert_eq!(config.capacity, 64);
        assert_eq!(config.shard_amount, Some(4));
        assert!(!config.initialized);
    }
}
