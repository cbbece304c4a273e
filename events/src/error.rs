use std::fmt;

/// Errors surfaced by the host registry.
///
/// Stale dispatches and duplicate registrations are resolved internally and never show up here.
/// Only call-site ordering bugs and bad configuration do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A listener was attached before [`init`](crate::Registry::init) or after
    /// [`deinit`](crate::Registry::deinit).
    Uninitialized,

    /// The configured shard amount is not a power of two greater than one.
    InvalidShardAmount(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Uninitialized => write!(f, "host registry is not initialized"),
            Error::InvalidShardAmount(amount) => write!(
                f,
                "invalid shard amount {amount}: must be a power of two greater than one"
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias for registry operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            Error::Uninitialized.to_string(),
            "host registry is not initialized"
        );
        assert!(Error::InvalidShardAmount(3).to_string().contains("3"));
    }
}
