//! Subscriptions: the dispatch wrappers stored in chains.
//!
//! A [`Subscription`] binds one host to one listener. It is the unit the registry tracks, and
//! the entry appended to a [`Chain`](crate::Chain). Every time the chain fires, the subscription
//! asks the registry whether it is still live and only then forwards the call.
//!
//! Identity is by instance: each subscription gets a unique [`Id`] at creation, and the registry
//! stores ids, never fields. Two subscriptions with the same host and listener are still two
//! different entries unless the cleanup pass merges them.

use std::{
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use log::trace;

use crate::{
    host::HostKey,
    listener::{Listener, MethodId},
    registry,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Instance identity of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

impl Id {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A host-scoped listener registration.
///
/// Host and listener are fixed at attach time and never re-resolved. The registry is held
/// weakly: a dropped registry reads the same as an uninitialized one.
pub struct Subscription<Args> {
    id: Id,
    host: HostKey,
    listener: Listener<Args>,
    registry: Weak<registry::Inner>,
}

impl<Args: 'static> Subscription<Args> {
    pub(crate) fn new(
        host: HostKey,
        listener: Listener<Args>,
        registry: Weak<registry::Inner>,
    ) -> Self {
        Self {
            id: Id::next(),
            host,
            listener,
            registry,
        }
    }

    /// The instance identity of this subscription.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// The host this subscription belongs to.
    #[inline]
    pub fn host(&self) -> HostKey {
        self.host
    }

    /// The wrapped listener.
    #[inline]
    pub fn listener(&self) -> &Listener<Args> {
        &self.listener
    }

    /// The method identity of the wrapped listener.
    #[inline]
    pub fn method(&self) -> MethodId {
        self.listener.method()
    }

    /// Whether this subscription was created by the registry behind `inner`.
    #[inline]
    pub(crate) fn belongs_to(&self, inner: &Arc<registry::Inner>) -> bool {
        std::ptr::eq(self.registry.as_ptr(), Arc::as_ptr(inner))
    }

    /// Whether the registry still authorizes this subscription to fire.
    pub fn is_live(&self) -> bool {
        match self.registry.upgrade() {
            Some(inner) => !inner.is_invalid(self.host, self.id),
            None => false,
        }
    }

    /// Forward `args` to the listener if the subscription is live.
    ///
    /// A stale subscription returns `false` without calling anything. This is a normal outcome:
    /// a detach may race an in-flight chain invocation, and either result is acceptable.
    pub fn dispatch(&self, args: Args) -> bool {
        if !self.is_live() {
            trace!("Skipping stale {} of {}", self.id, self.host);
            return false;
        }
        self.listener.call(args);
        true
    }
}

impl<Args> fmt::Debug for Subscription<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("listener", &self.listener)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::{chain::Chain, registry::Registry};

    #[test]
    fn ids_are_unique() {
        // Given
        let mut ids: Vec<_> = (0..100).map(|_| Id::next()).collect();

        // When
        let pre_len = ids.len();
        ids.sort();
        ids.dedup();

        // Then
        assert_eq!(pre_len, ids.len());
    }

    #[test]
    fn dispatch_forwards_when_live() {
        // Given
        let registry = Registry::new();
        let host = HostKey::new();
        let mut chain = Chain::<(usize,)>::new();
        let total = Arc::new(AtomicUsize::new(0));
        let sink = total.clone();
        let subscription = registry
            .attach(
                &mut chain,
                move |n: usize| {
                    sink.fetch_add(n, Ordering::Relaxed);
                },
                &host,
            )
            .unwrap();

        // When
        let fired = subscription.dispatch((5,));

        // Then
        assert!(fired);
        assert!(subscription.is_live());
        assert_eq!(total.load(Ordering::Relaxed), 5);
        assert_eq!(subscription.host(), host);
    }

    #[test]
    fn dispatch_declines_after_detach() {
        // Given
        let registry = Registry::new();
        let host = HostKey::new();
        let mut chain = Chain::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = calls.clone();
        let subscription = registry
            .attach(
                &mut chain,
                move || {
                    sink.fetch_add(1, Ordering::Relaxed);
                },
                &host,
            )
            .unwrap();

        // When
        registry.detach(&host);

        // Then
        assert!(!subscription.dispatch(()));
        assert!(!subscription.is_live());
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn dispatch_declines_once_registry_is_dropped() {
        // Given
        let registry = Registry::new();
        let host = HostKey::new();
        let mut chain = Chain::<()>::new();
        let subscription = registry.attach(&mut chain, || {}, &host).unwrap();

        // When
        drop(registry);

        // Then
        assert!(!subscription.is_live());
        assert!(!subscription.dispatch(()));
    }

    #[test]
    fn belongs_to_its_registry_only() {
        // Given
        let first = Registry::new();
        let second = Registry::new();
        let mut chain = Chain::<()>::new();
        let subscription = first.attach(&mut chain, || {}, &HostKey::new()).unwrap();

        // Then
        assert!(subscription.belongs_to(first.inner()));
        assert!(!subscription.belongs_to(second.inner()));
    }
}
