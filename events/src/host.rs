//! Host identity.
//!
//! A host is whatever owns a set of listeners: a widget, a game object, a session. The registry
//! never looks inside a host. It only needs a [`HostKey`], an opaque token whose equality is
//! identity: two keys are equal only if one was copied from the other.
//!
//! Hosts that want their listeners silenced automatically can hold a [`Host`] guard, which
//! detaches its key from the registry when dropped:
//!
//! ```rust,ignore
//! let registry = Registry::new();
//! let mut on_resize = Chain::<(u32, u32)>::new();
//!
//! let widget = registry.host();
//! registry.attach(&mut on_resize, |w: u32, h: u32| layout(w, h), &widget)?;
//!
//! drop(widget); // listener is inert from here on
//! ```

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::registry::Registry;

/// Source of process-unique host keys. Zero is never handed out.
static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a host.
///
/// Keys are minted from a process-wide counter and never reused, so comparing keys compares
/// identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostKey(u64);

impl HostKey {
    /// Mint a fresh key, distinct from every other key in the process.
    #[inline]
    pub fn new() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw token value.
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Every default key is a fresh identity.
impl Default for HostKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host#{}", self.0)
    }
}

/// Anything that can name a host.
pub trait AsHostKey {
    /// The key identifying this host in a registry.
    fn host_key(&self) -> HostKey;
}

impl AsHostKey for HostKey {
    #[inline]
    fn host_key(&self) -> HostKey {
        *self
    }
}

impl<T: AsHostKey + ?Sized> AsHostKey for &T {
    #[inline]
    fn host_key(&self) -> HostKey {
        (**self).host_key()
    }
}

/// An owning host guard. Dropping it detaches every listener attached under its key.
///
/// Created by [`Registry::host`].
pub struct Host {
    key: HostKey,
    registry: Registry,
}

impl Host {
    pub(crate) fn new(registry: Registry) -> Self {
        Self {
            key: HostKey::new(),
            registry,
        }
    }

    /// The key of this host.
    #[inline]
    pub fn key(&self) -> HostKey {
        self.key
    }

    /// Detach now and return how many subscriptions were invalidated.
    pub fn detach(self) -> usize {
        // Drop runs afterwards and finds nothing left to remove.
        self.registry.detach(&self.key)
    }
}

impl AsHostKey for Host {
    #[inline]
    fn host_key(&self) -> HostKey {
        self.key
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.registry.detach(&self.key);
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").field("key", &self.key).finish()
    }
}
