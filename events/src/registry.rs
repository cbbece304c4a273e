//! The host registry: single source of truth for subscription liveness.
//!
//! # Overview
//!
//! The registry maps each [`HostKey`] to the set of its live subscription ids. A subscription is
//! live iff:
//!
//! - the registry is initialized, and
//! - it has an entry for the subscription's host, and
//! - that entry contains this exact subscription id.
//!
//! Everything else follows from that one predicate ([`Registry::is_invalid`]):
//!
//! - **Attach** registers a new subscription, runs the cleanup pass over the caller's chain and
//!   appends the new dispatch wrapper.
//! - **Detach** drops the host's entry. It never touches a chain: the wrappers left behind fail
//!   the liveness check and go quiet immediately.
//! - **Cleanup pass** runs on every attach. It evicts from the chain any wrapper for the same host
//!   and listener method (so re-attaching never double fires), plus any wrapper that is no longer
//!   live.
//!
//! # Retention
//!
//! Eviction is lazy. A detached host's wrappers stay in each chain, inert, until that chain goes
//! through [`attach`](Registry::attach) again. A chain that is never attached to again keeps them
//! for as long as it lives. The registry never records which chains a host subscribed to.
//!
//! # Lifecycle
//!
//! A registry is either initialized or not. [`deinit`](Registry::deinit) discards every host entry
//! at once and leaves the registry uninitialized, after which attach fails with
//! [`Error::Uninitialized`] and detach is a no-op. [`init`](Registry::init) is idempotent.
//!
//! # Thread Safety
//!
//! - The lifecycle state sits behind a `crossbeam` `ShardedLock`: every liveness check takes a
//!   cheap read lock, only init and deinit write.
//! - Host sets live in a `DashMap`. A liveness check reads a set under its shard lock, so it never
//!   sees a half-updated set, and a detach is visible to every check that starts after it returns.
//! - An invocation already past its liveness check may still run after a concurrent detach. That
//!   is accepted.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = Registry::new();
//! let mut on_tick = Chain::<(f32,)>::new();
//! let player = HostKey::new();
//!
//! registry.attach(&mut on_tick, |dt: f32| animate(dt), &player)?;
//! on_tick.invoke((0.016,)); // fires
//!
//! registry.detach(&player);
//! on_tick.invoke((0.016,)); // silent
//! ```

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, PoisonError},
};

use crossbeam::sync::{ShardedLock, ShardedLockReadGuard, ShardedLockWriteGuard};
use dashmap::DashMap;
use log::{debug, error, info, warn};

use crate::{
    chain::{Chain, Entry},
    config::Config,
    error::{Error, Result},
    host::{AsHostKey, Host, HostKey},
    listener::{Callable, Listener},
    subscription::{self, Subscription},
};

/// Live subscription ids of one host. Owned solely by the registry.
type HostSet = HashSet<subscription::Id>;

/// Host key to live subscriptions.
type HostMap = DashMap<HostKey, HostSet>;

/// Shared registry state. Subscriptions point back at this weakly.
pub(crate) struct Inner {
    config: Config,

    /// `None` while uninitialized.
    hosts: ShardedLock<Option<HostMap>>,
}

impl Inner {
    fn build_map(config: &Config) -> HostMap {
        match config.shard_amount {
            Some(amount) => DashMap::with_capacity_and_shard_amount(config.capacity, amount),
            None => DashMap::with_capacity(config.capacity),
        }
    }

    // Map state stays consistent even if a listener panicked while a guard was held, so poisoning
    // is ignored.
    fn read(&self) -> ShardedLockReadGuard<'_, Option<HostMap>> {
        self.hosts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> ShardedLockWriteGuard<'_, Option<HostMap>> {
        self.hosts.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The liveness predicate, shared by dispatch and the cleanup pass.
    pub(crate) fn is_invalid(&self, host: HostKey, id: subscription::Id) -> bool {
        Self::is_invalid_in(self.read().as_ref(), host, id)
    }

    /// The liveness predicate against an already locked map.
    fn is_invalid_in(hosts: Option<&HostMap>, host: HostKey, id: subscription::Id) -> bool {
        match hosts {
            None => true,
            Some(map) => !map.get(&host).is_some_and(|set| set.contains(&id)),
        }
    }

    /// Evict duplicate and stale subscriptions from `chain`, returning the evicted entries.
    ///
    /// An entry is evicted when it wraps the same host and listener method as the listener being
    /// attached, or when it is no longer live. Plain listeners are left untouched. No shard guard
    /// is held across entries, so looking up other hosts cannot deadlock.
    fn clean<Args: 'static>(
        self: &Arc<Self>,
        hosts: &HostMap,
        chain: &mut Chain<Args>,
        listener: &Listener<Args>,
        host: HostKey,
    ) -> Vec<Entry<Args>> {
        chain.evict(|entry| {
            let Entry::Subscription(existing) = entry else {
                return false;
            };
            if existing.belongs_to(self) {
                let duplicate =
                    existing.host() == host && existing.listener().same_method(listener);
                duplicate || Self::is_invalid_in(Some(hosts), existing.host(), existing.id())
            } else {
                // Wrapper from another registry: only its own registry can judge it.
                !existing.is_live()
            }
        })
    }
}

/// A handle to a host registry.
///
/// Handles are cheap to clone and all clones share the same state. Use one registry per process
/// (see [`global`](crate::global)) or create independent ones, e.g. per test or per world.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an initialized registry with the default configuration.
    pub fn new() -> Self {
        Self::from_config(Config::default())
    }

    /// Create a registry from a configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: Config) -> Self {
        let hosts = config.initialized.then(|| Inner::build_map(&config));
        Self {
            inner: Arc::new(Inner {
                config,
                hosts: ShardedLock::new(hosts),
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &Arc<Inner> {
        &self.inner
    }

    /// The configuration this registry was built with.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Initialize the registry. Does nothing if it is already initialized; existing subscriptions
    /// survive.
    pub fn init(&self) {
        let mut hosts = self.inner.write();
        if hosts.is_some() {
            return;
        }
        *hosts = Some(Inner::build_map(&self.inner.config));
        info!("Host registry initialized");
    }

    /// Discard every host entry and leave the registry uninitialized.
    ///
    /// Every existing subscription goes stale at once. Any attach after this is a call-site bug
    /// and fails with [`Error::Uninitialized`] until [`init`](Self::init) is called again.
    pub fn deinit(&self) {
        if let Some(map) = self.inner.write().take() {
            info!("Host registry deinitialized, dropped {} hosts", map.len());
        }
    }

    /// Whether the registry is initialized.
    pub fn is_initialized(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Create a host guard that detaches itself from this registry when dropped.
    pub fn host(&self) -> Host {
        Host::new(self.clone())
    }

    /// Attach `listener` for `host` to `chain`.
    ///
    /// Runs the cleanup pass over `chain` first, so attaching the same listener method for the
    /// same host twice leaves a single live entry, and wrappers of detached hosts are evicted.
    /// Returns the new subscription, which is live until its host is detached or a later attach
    /// on the same chain replaces it.
    ///
    /// # Errors
    ///
    /// [`Error::Uninitialized`] if the registry is not initialized. The chain is left untouched.
    pub fn attach<Args, F>(
        &self,
        chain: &mut Chain<Args>,
        listener: F,
        host: &impl AsHostKey,
    ) -> Result<Arc<Subscription<Args>>>
    where
        Args: 'static,
        F: Callable<Args>,
    {
        self.attach_listener(chain, Listener::new(listener), host)
    }

    /// Attach an already wrapped [`Listener`]. See [`attach`](Self::attach).
    pub fn attach_listener<Args: 'static>(
        &self,
        chain: &mut Chain<Args>,
        listener: Listener<Args>,
        host: &impl AsHostKey,
    ) -> Result<Arc<Subscription<Args>>> {
        let host = host.host_key();
        let (subscription, evicted) = self.register(chain, listener, host)?;
        debug!(
            "Attached {} for {}, evicted {} stale or duplicate entries",
            subscription.id(),
            host,
            evicted.len()
        );
        // Released outside the lifecycle lock: an evicted listener may own a `Host`, and dropping
        // it detaches.
        drop(evicted);
        Ok(subscription)
    }

    /// Run the cleanup pass and register a new subscription under the lifecycle read lock.
    fn register<Args: 'static>(
        &self,
        chain: &mut Chain<Args>,
        listener: Listener<Args>,
        host: HostKey,
    ) -> Result<(Arc<Subscription<Args>>, Vec<Entry<Args>>)> {
        let hosts = self.inner.read();
        let Some(map) = hosts.as_ref() else {
            error!(
                "Attempted to attach {:?} for {} to an uninitialized host registry",
                listener.method(),
                host
            );
            return Err(Error::Uninitialized);
        };

        map.entry(host).or_default();
        let evicted = self.inner.clean(map, chain, &listener, host);

        let subscription = Arc::new(Subscription::new(
            host,
            listener,
            Arc::downgrade(&self.inner),
        ));
        {
            // A concurrent detach may have dropped the entry since; re-create it.
            let mut set = map.entry(host).or_default();
            for entry in &evicted {
                if let Some(existing) = entry.as_subscription() {
                    set.remove(&existing.id());
                }
            }
            set.insert(subscription.id());
        }
        chain.push_subscription(Arc::clone(&subscription));
        Ok((subscription, evicted))
    }

    /// Detach every subscription of `host`, across every chain it was ever attached to.
    ///
    /// Returns how many subscriptions were invalidated. Chains are not touched; their wrappers go
    /// inert now and are evicted on the next attach to each chain. Does nothing on an
    /// uninitialized registry.
    pub fn detach(&self, host: &impl AsHostKey) -> usize {
        let host = host.host_key();
        let hosts = self.inner.read();
        let Some(map) = hosts.as_ref() else {
            warn!("Ignoring detach of {host}: host registry is not initialized");
            return 0;
        };
        match map.remove(&host) {
            Some((_, mut set)) => {
                let count = set.len();
                set.clear();
                debug!("Detached {host}, invalidated {count} subscriptions");
                count
            }
            None => 0,
        }
    }

    /// Whether `subscription` is not authorized to fire for `host`.
    ///
    /// True if the registry is uninitialized, has no entry for `host`, or that entry does not
    /// contain this exact subscription. A subscription created by another registry is always
    /// invalid here.
    pub fn is_invalid<Args: 'static>(
        &self,
        host: HostKey,
        subscription: &Subscription<Args>,
    ) -> bool {
        !subscription.belongs_to(&self.inner) || self.inner.is_invalid(host, subscription.id())
    }

    /// Whether `subscription` may fire for its own host.
    pub fn is_live<Args: 'static>(&self, subscription: &Subscription<Args>) -> bool {
        !self.is_invalid(subscription.host(), subscription)
    }

    /// Number of hosts with an entry. Zero when uninitialized.
    pub fn host_count(&self) -> usize {
        self.inner.read().as_ref().map_or(0, |map| map.len())
    }

    /// Number of live subscriptions held for `host`.
    pub fn subscription_count(&self, host: &impl AsHostKey) -> usize {
        let hosts = self.inner.read();
        hosts
            .as_ref()
            .and_then(|map| map.get(&host.host_key()).map(|set| set.len()))
            .unwrap_or(0)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("initialized", &self.is_initialized())
            .field("hosts", &self.host_count())
            .finish()
    }
}
