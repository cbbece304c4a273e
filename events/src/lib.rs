//! Host-scoped listener registry.
//!
//! Attach listener callbacks to multicast [`Chain`]s on behalf of a *host* (a widget, a game
//! object, a session) and have every one of them go quiet the moment the host is detached,
//! without ever walking the chains they live in.
//!
//! # Overview
//!
//! - **[`Chain`]**: an ordered list of callables owned by whoever raises the event.
//! - **[`Registry`]**: maps each [`HostKey`] to its live subscriptions. The single source of truth
//!   for whether a subscription may fire.
//! - **[`Subscription`]**: the dispatch wrapper stored in a chain. It re-checks liveness on every
//!   call and silently does nothing once stale.
//!
//! Attaching runs a cleanup pass over the chain: older entries for the same host and listener
//! method are replaced, and entries left behind by detached hosts are evicted. Detaching never
//! touches a chain; its entries linger, inert, until the chain's next attach.
//!
//! # Example
//!
//! ```rust,ignore
//! use rusty_events::{Chain, HostKey, Registry};
//!
//! let registry = Registry::new();
//! let mut on_score = Chain::<(u32,)>::new();
//! let hud = HostKey::new();
//!
//! registry.attach(&mut on_score, |score: u32| println!("score: {score}"), &hud)?;
//! on_score.invoke((10,)); // prints
//!
//! registry.detach(&hud);
//! on_score.invoke((20,)); // silent
//! ```
//!
//! # Process-wide registry
//!
//! The free functions [`init`], [`deinit`], [`attach`] and [`detach`] operate on a lazily created
//! [`global`] registry. Prefer passing a [`Registry`] handle around where possible; the global is
//! there for call sites with no other way to reach one.

#[macro_use]
mod macros;

pub mod chain;
pub mod config;
pub mod error;
pub mod host;
pub mod listener;
pub mod registry;
pub mod subscription;

use std::sync::{Arc, OnceLock};

pub use chain::{Chain, Entry};
pub use config::Config;
pub use error::{Error, Result};
pub use host::{AsHostKey, Host, HostKey};
pub use listener::{Callable, Listener, MethodId};
pub use registry::Registry;
pub use subscription::{Id as SubscriptionId, Subscription};

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry, created initialized on first use.
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(Registry::new)
}

/// Initialize the process-wide registry. Idempotent.
pub fn init() {
    global().init();
}

/// Tear down the process-wide registry. Every later [`attach`] fails until [`init`] is called.
pub fn deinit() {
    global().deinit();
}

/// Attach `listener` for `host` to `chain` through the process-wide registry.
///
/// See [`Registry::attach`].
pub fn attach<Args, F>(
    chain: &mut Chain<Args>,
    listener: F,
    host: &impl AsHostKey,
) -> Result<Arc<Subscription<Args>>>
where
    Args: 'static,
    F: Callable<Args>,
{
    global().attach(chain, listener, host)
}

/// Detach every subscription of `host` from the process-wide registry.
///
/// See [`Registry::detach`].
pub fn detach(host: &impl AsHostKey) -> usize {
    global().detach(host)
}
