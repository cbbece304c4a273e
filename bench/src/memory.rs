//! Heap held by stale subscriptions, measured with dhat.
//!
//! A detached host leaves its dispatch wrappers in every chain it joined until that chain's next
//! attach. [`measure_eviction`] runs one such attach and reports how much heap it gave back, which
//! is what the lingering entries were costing.
//!
//! ```bash
//! cargo bench -p rusty_events_bench --features memory_profiling
//! ```
//!
//! Without the feature every byte count reads zero; entry counts are always exact.

use std::{fmt, sync::Arc};

use rusty_events::{AsHostKey, Callable, Chain, Registry, Result, Subscription};

/// What one evicting attach released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Retention {
    /// Entries that were no longer live before the attach.
    pub stale_entries: usize,
    /// Entries the cleanup pass removed, stale or duplicate.
    pub evicted_entries: usize,
    /// Heap bytes given back by the attach, net of the entry it added.
    pub reclaimed_bytes: u64,
}

impl Retention {
    /// Build a measurement from live heap sizes taken around the attach.
    pub fn between(stale_entries: usize, evicted_entries: usize, before: u64, after: u64) -> Self {
        Self {
            stale_entries,
            evicted_entries,
            reclaimed_bytes: before.saturating_sub(after),
        }
    }

    /// Average bytes each evicted entry was holding.
    pub fn bytes_per_evicted_entry(&self) -> f64 {
        if self.evicted_entries == 0 {
            0.0
        } else {
            self.reclaimed_bytes as f64 / self.evicted_entries as f64
        }
    }

    /// Fold another measurement into this one, e.g. one per chain.
    pub fn absorb(&mut self, other: Retention) {
        self.stale_entries += other.stale_entries;
        self.evicted_entries += other.evicted_entries;
        self.reclaimed_bytes += other.reclaimed_bytes;
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stale, {} evicted, {} bytes reclaimed ({:.1} bytes/entry)",
            self.stale_entries,
            self.evicted_entries,
            self.reclaimed_bytes,
            self.bytes_per_evicted_entry()
        )
    }
}

/// Heap profiling guard. Only one may be active at a time, and it must be started before the
/// chains being measured are built.
#[cfg(feature = "memory_profiling")]
pub struct HeapProfiler {
    _profiler: dhat::Profiler,
}

#[cfg(feature = "memory_profiling")]
impl HeapProfiler {
    /// Start heap profiling. `dhat-heap.json` is written when the guard drops.
    pub fn start() -> Self {
        Self {
            _profiler: dhat::Profiler::new_heap(),
        }
    }

    /// Bytes currently live on the heap.
    pub fn live_bytes(&self) -> u64 {
        dhat::HeapStats::get().curr_bytes as u64
    }
}

#[cfg(not(feature = "memory_profiling"))]
pub struct HeapProfiler;

#[cfg(not(feature = "memory_profiling"))]
impl HeapProfiler {
    /// No-op when memory profiling is disabled.
    pub fn start() -> Self {
        Self
    }

    /// Always zero when memory profiling is disabled.
    pub fn live_bytes(&self) -> u64 {
        0
    }
}

/// Attach `listener` for `host` to `chain`, measuring what the cleanup pass releases.
pub fn measure_eviction<Args, F>(
    profiler: &HeapProfiler,
    registry: &Registry,
    chain: &mut Chain<Args>,
    listener: F,
    host: &impl AsHostKey,
) -> Result<(Arc<Subscription<Args>>, Retention)>
where
    Args: 'static,
    F: Callable<Args>,
{
    let stale_entries = chain
        .subscriptions()
        .filter(|subscription| !subscription.is_live())
        .count();
    let entries_before = chain.len();

    let heap_before = profiler.live_bytes();
    let subscription = registry.attach(chain, listener, host)?;
    let heap_after = profiler.live_bytes();

    let evicted_entries = entries_before + 1 - chain.len();
    let retention = Retention::between(stale_entries, evicted_entries, heap_before, heap_after);
    Ok((subscription, retention))
}

#[cfg(test)]
mod tests {
    use rusty_events::HostKey;

    use super::*;

    #[test]
    fn eviction_counts_stale_entries() {
        // Given - Three hosts, two of them gone
        let profiler = HeapProfiler::start();
        let registry = Registry::new();
        let mut chain = Chain::<()>::new();
        let hosts: Vec<_> = (0..3).map(|_| HostKey::new()).collect();
        for host in &hosts {
            registry.attach(&mut chain, || {}, host).unwrap();
        }
        registry.detach(&hosts[0]);
        registry.detach(&hosts[1]);

        // When - The survivor attaches another listener
        let (subscription, retention) =
            measure_eviction(&profiler, &registry, &mut chain, || {}, &hosts[2]).unwrap();

        // Then
        assert_eq!(retention.stale_entries, 2);
        assert_eq!(retention.evicted_entries, 2);
        assert_eq!(chain.len(), 2);
        assert!(registry.is_live(&subscription));
    }

    #[test]
    fn retention_arithmetic() {
        // Given
        let mut total = Retention::between(2, 2, 1_000, 800);

        // When
        total.absorb(Retention::between(1, 2, 500, 300));

        // Then
        assert_eq!(total.stale_entries, 3);
        assert_eq!(total.evicted_entries, 4);
        assert_eq!(total.reclaimed_bytes, 400);
        assert!((total.bytes_per_evicted_entry() - 100.0).abs() < f64::EPSILON);
        assert!(total.to_string().contains("400 bytes reclaimed"));
    }

    #[test]
    fn growing_heap_reclaims_nothing() {
        let retention = Retention::between(0, 0, 100, 200);
        assert_eq!(retention.reclaimed_bytes, 0);
        assert_eq!(retention.bytes_per_evicted_entry(), 0.0);
    }
}
