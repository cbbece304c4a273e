//! Multicast broadcaster chains.
//!
//! A [`Chain`] is an ordered list of callables fired together. It is owned by whoever raises the
//! event, typically as a field next to the state it reports on. The registry never holds a chain;
//! it only appends subscriptions to one during [`attach`](crate::Registry::attach) and evicts
//! stale or duplicate subscriptions from it during that same call.
//!
//! A chain can also carry plain listeners pushed directly with [`Chain::push`]. Those are not
//! host-scoped and the registry leaves them alone.
//!
//! ```rust,ignore
//! let mut on_damage = Chain::<(u32,)>::new();
//! on_damage.push(|amount: u32| println!("took {amount}"));
//! registry.attach(&mut on_damage, |amount: u32| flash_red(amount), &enemy)?;
//!
//! let fired = on_damage.invoke((10,));
//! ```

use std::{fmt, sync::Arc};

use crate::{
    listener::{Callable, Listener, MethodId},
    subscription::Subscription,
};

/// One callable in a chain.
pub enum Entry<Args> {
    /// A plain listener, always called.
    Listener(Listener<Args>),
    /// A host-scoped dispatch wrapper, called only while live.
    Subscription(Arc<Subscription<Args>>),
}

impl<Args: 'static> Entry<Args> {
    /// The method identity of the underlying listener.
    pub fn method(&self) -> MethodId {
        match self {
            Entry::Listener(listener) => listener.method(),
            Entry::Subscription(subscription) => subscription.method(),
        }
    }

    /// The subscription behind this entry, if it is a dispatch wrapper.
    pub fn as_subscription(&self) -> Option<&Arc<Subscription<Args>>> {
        match self {
            Entry::Listener(_) => None,
            Entry::Subscription(subscription) => Some(subscription),
        }
    }

    /// Call the entry and report whether the listener actually ran.
    fn call(&self, args: Args) -> bool {
        match self {
            Entry::Listener(listener) => {
                listener.call(args);
                true
            }
            Entry::Subscription(subscription) => subscription.dispatch(args),
        }
    }
}

impl<Args> Clone for Entry<Args> {
    fn clone(&self) -> Self {
        match self {
            Entry::Listener(listener) => Entry::Listener(listener.clone()),
            Entry::Subscription(subscription) => Entry::Subscription(Arc::clone(subscription)),
        }
    }
}

impl<Args> fmt::Debug for Entry<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Listener(listener) => f.debug_tuple("Listener").field(listener).finish(),
            Entry::Subscription(subscription) => {
                f.debug_tuple("Subscription").field(subscription).finish()
            }
        }
    }
}

/// An ordered multicast chain of callables taking the argument tuple `Args`.
///
/// Cloning a chain is cheap: entries are reference counted, and a clone shares subscriptions with
/// the original, so detaching a host silences it in both.
pub struct Chain<Args> {
    entries: Vec<Entry<Args>>,
}

impl<Args: 'static> Chain<Args> {
    /// Create an empty chain.
    #[inline]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of entries, live or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain has no entries at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a plain, unscoped listener and return its method identity.
    pub fn push<F: Callable<Args>>(&mut self, listener: F) -> MethodId {
        let listener = Listener::new(listener);
        let method = listener.method();
        self.entries.push(Entry::Listener(listener));
        method
    }

    /// Remove the last plain listener with the given method identity.
    ///
    /// Subscriptions are never removed this way; they leave a chain through the cleanup pass.
    /// Returns `true` if a listener was removed.
    pub fn remove_method(&mut self, method: MethodId) -> bool {
        let position = self.entries.iter().rposition(
            |entry| matches!(entry, Entry::Listener(listener) if listener.method() == method),
        );
        match position {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Iterate over every entry in invocation order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry<Args>> {
        self.entries.iter()
    }

    /// Iterate over the subscriptions in the chain, live or stale.
    pub fn subscriptions(&self) -> impl Iterator<Item = &Arc<Subscription<Args>>> {
        self.entries.iter().filter_map(Entry::as_subscription)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append a dispatch wrapper.
    pub(crate) fn push_subscription(&mut self, subscription: Arc<Subscription<Args>>) {
        self.entries.push(Entry::Subscription(subscription));
    }

    /// Take out every entry for which `evict` returns `true`, preserving the order of the rest.
    ///
    /// Evicted entries are handed back rather than dropped here, so the caller decides when their
    /// listeners are released.
    pub(crate) fn evict(
        &mut self,
        mut evict: impl FnMut(&Entry<Args>) -> bool,
    ) -> Vec<Entry<Args>> {
        let (evicted, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| evict(entry));
        self.entries = kept;
        evicted
    }
}

impl<Args: Clone + 'static> Chain<Args> {
    /// Fire every entry in order with a clone of `args`.
    ///
    /// Stale subscriptions are skipped silently. Returns how many listeners ran.
    pub fn invoke(&self, args: Args) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.call(args.clone()))
            .count()
    }
}

impl<Args: 'static> Default for Chain<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Clone for Chain<Args> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<Args> fmt::Debug for Chain<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{host::HostKey, registry::Registry};

    #[test]
    fn new_chain_is_empty() {
        let chain = Chain::<()>::new();
        assert!(chain.is_empty());
        assert_eq!(chain.invoke(()), 0);
    }

    #[test]
    fn invoke_runs_entries_in_order() {
        // Given
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut chain = Chain::<(u32,)>::new();
        let first = order.clone();
        chain.push(move |n: u32| first.lock().unwrap().push(("first", n)));
        let second = order.clone();
        chain.push(move |n: u32| second.lock().unwrap().push(("second", n)));

        // When
        let fired = chain.invoke((7,));

        // Then
        assert_eq!(fired, 2);
        assert_eq!(*order.lock().unwrap(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn remove_method_removes_last_match_only() {
        // Given
        let calls = Arc::new(AtomicUsize::new(0));
        let mut chain = Chain::<()>::new();
        let mut method = None;
        for _ in 0..2 {
            let sink = calls.clone();
            method = Some(chain.push(move || {
                sink.fetch_add(1, Ordering::Relaxed);
            }));
        }
        chain.push(|| {});

        // When
        let removed = chain.remove_method(method.unwrap());

        // Then
        assert!(removed);
        assert_eq!(chain.len(), 2);
        chain.invoke(());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn remove_method_ignores_subscriptions() {
        // Given
        let registry = Registry::new();
        let mut chain = Chain::<()>::new();
        let subscription = registry.attach(&mut chain, || {}, &HostKey::new()).unwrap();

        // When
        let removed = chain.remove_method(subscription.method());

        // Then
        assert!(!removed);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn subscriptions_skip_plain_listeners() {
        // Given
        let registry = Registry::new();
        let mut chain = Chain::<()>::new();
        chain.push(|| {});
        let subscription = registry.attach(&mut chain, || {}, &HostKey::new()).unwrap();

        // When
        let found: Vec<_> = chain.subscriptions().map(|s| s.id()).collect();

        // Then
        assert_eq!(found, vec![subscription.id()]);
        assert_eq!(chain.entries().count(), 2);
    }

    #[test]
    fn clones_share_liveness() {
        // Given
        let registry = Registry::new();
        let host = HostKey::new();
        let mut chain = Chain::<()>::new();
        registry.attach(&mut chain, || {}, &host).unwrap();
        let copy = chain.clone();

        // When
        registry.detach(&host);

        // Then
        assert_eq!(chain.invoke(()), 0);
        assert_eq!(copy.invoke(()), 0);
        assert_eq!(copy.len(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let mut chain = Chain::<()>::new();
        chain.push(|| {});
        chain.clear();
        assert!(chain.is_empty());
    }
}
