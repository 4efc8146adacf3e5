//! In-memory cache of loaded book archives.
//!
//! The cache is the only mutable state shared between requests. Entries are
//! created by [`ArchiveCache::load`], resolved exactly once, and never mutated
//! afterwards; a failed attempt is forgotten so that the next request retries.

pub mod error;

use crate::error::{ErrorKind, Result};
use folio_archive::error::ErrorKind as ArchiveErrorKind;
use folio_archive::{ArchiveHandle, LoaderHandle, Locator};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Outcome = std::result::Result<ArchiveHandle, ArchiveErrorKind>;
type PendingLoad = Shared<BoxFuture<'static, Outcome>>;

enum Entry {
    /// A load is in flight. `attempt` tells a finished waiter whether the
    /// entry it is about to settle is still the one it waited on.
    Pending { attempt: u64, load: PendingLoad },
    Resolved { archive: ArchiveHandle, last_used: u64 },
}

#[derive(Default)]
struct Entries {
    map: HashMap<Locator, Entry>,
    tick: u64,
    attempts: u64,
}

enum Lookup {
    Hit(ArchiveHandle),
    Wait(u64, PendingLoad),
}

/// Deduplicating, memoizing archive cache.
///
/// - At most one load is in flight per locator; concurrent callers attach to
///   it and all observe the same archive or the same failure.
/// - Resolved archives are returned immediately.
/// - Failures are not cached.
/// - Optionally bounded: with a capacity, least-recently-used archives are
///   evicted once a new one resolves, skipping any archive that is still
///   referenced outside the cache.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use folio_archive::{Locator, MockLoader};
/// use folio_cache::ArchiveCache;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let loader = MockLoader::default().with_book("a.cbz", [("001.png", b"png".to_vec())]);
/// let loader = Arc::new(loader);
/// let cache = ArchiveCache::new(loader.clone());
/// let locator = Locator::parse("a.cbz").unwrap();
/// let first = cache.load(&locator).await.unwrap();
/// let second = cache.load(&locator).await.unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
/// assert_eq!(loader.loads(), 1);
/// # }
/// ```
pub struct ArchiveCache {
    loader: LoaderHandle,
    capacity: Option<NonZeroUsize>,
    entries: Mutex<Entries>,
}
impl ArchiveCache {
    /// Create an unbounded cache.
    pub fn new(loader: LoaderHandle) -> Self {
        Self { loader, capacity: None, entries: Mutex::default() }
    }

    /// Bound the number of resolved archives kept. `None` means unbounded.
    pub fn with_capacity(mut self, capacity: Option<NonZeroUsize>) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    /// Load the archive for `locator`, sharing any in-flight load.
    pub async fn load(&self, locator: &Locator) -> Result<ArchiveHandle> {
        let (attempt, load) = match self.lookup(locator) {
            Lookup::Hit(archive) => return Ok(archive),
            Lookup::Wait(attempt, load) => (attempt, load),
        };
        let outcome = load.await;
        self.settle(locator, attempt, &outcome);
        outcome.map_err(|kind| ErrorKind::Archive(kind).into())
    }

    /// Whether a resolved archive is cached for `locator`.
    pub fn contains(&self, locator: &Locator) -> bool {
        matches!(self.lock().map.get(locator), Some(Entry::Resolved { .. }))
    }

    /// Whether a load for `locator` is currently in flight.
    pub fn is_pending(&self, locator: &Locator) -> bool {
        matches!(self.lock().map.get(locator), Some(Entry::Pending { .. }))
    }

    /// Number of entries, pending or resolved.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the resolved archive for `locator`. Pending loads are left alone.
    /// Returns `true` if something was evicted.
    pub fn evict(&self, locator: &Locator) -> bool {
        let mut guard = self.lock();
        if !matches!(guard.map.get(locator), Some(Entry::Resolved { .. })) {
            return false;
        }
        guard.map.remove(locator);
        tracing::debug!(locator = %locator, "Evicted archive");
        true
    }

    /// Drop every resolved archive. Pending loads are left alone.
    pub fn clear(&self) {
        let mut guard = self.lock();
        guard.map.retain(|_, entry| matches!(entry, Entry::Pending { .. }));
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Nothing panics while holding the lock, and every critical section
        // leaves the map consistent anyway.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, locator: &Locator) -> Lookup {
        let mut guard = self.lock();
        let entries = &mut *guard;
        entries.tick += 1;
        match entries.map.get_mut(locator) {
            Some(Entry::Resolved { archive, last_used }) => {
                *last_used = entries.tick;
                tracing::trace!(locator = %locator, "Archive cache hit");
                Lookup::Hit(archive.clone())
            },
            Some(Entry::Pending { attempt, load }) => {
                tracing::trace!(locator = %locator, attempt = *attempt, "Attaching to in-flight archive load");
                Lookup::Wait(*attempt, load.clone())
            },
            None => {
                entries.attempts += 1;
                let attempt = entries.attempts;
                let loader = self.loader.clone();
                let owned = locator.clone();
                let load = async move {
                    tracing::info!(locator = %owned, loader = loader.name(), "Loading archive");
                    loader.load(&owned).await.map(Arc::new).map_err(|err| (*err).clone())
                }
                .boxed()
                .shared();
                entries.map.insert(locator.clone(), Entry::Pending { attempt, load: load.clone() });
                Lookup::Wait(attempt, load)
            },
        }
    }

    fn settle(&self, locator: &Locator, attempt: u64, outcome: &Outcome) {
        let mut guard = self.lock();
        let entries = &mut *guard;
        // The first waiter to finish settles the entry; everyone after it finds
        // it already resolved (or gone, or replaced by a newer attempt).
        if !matches!(entries.map.get(locator), Some(Entry::Pending { attempt: current, .. }) if *current == attempt) {
            return;
        }
        match outcome {
            Ok(archive) => {
                entries.tick += 1;
                let last_used = entries.tick;
                entries.map.insert(locator.clone(), Entry::Resolved { archive: archive.clone(), last_used });
                tracing::info!(locator = %locator, entries = archive.len(), bytes = archive.size(), "Archive loaded");
                if let Some(capacity) = self.capacity {
                    evict_least_recently_used(entries, capacity);
                }
            },
            Err(kind) => {
                entries.map.remove(locator);
                tracing::warn!(locator = %locator, error = %kind, "Archive load failed");
            },
        }
    }
}

fn evict_least_recently_used(entries: &mut Entries, capacity: NonZeroUsize) {
    let resolved = entries.map.values().filter(|entry| matches!(entry, Entry::Resolved { .. })).count();
    let mut excess = resolved.saturating_sub(capacity.get());
    if excess == 0 {
        return;
    }
    // Only archives nobody else holds (no request or session using them).
    let mut idle: Vec<(u64, Locator)> = entries
        .map
        .iter()
        .filter_map(|(locator, entry)| match entry {
            Entry::Resolved { archive, last_used } if Arc::strong_count(archive) == 1 => {
                Some((*last_used, locator.clone()))
            },
            _ => None,
        })
        .collect();
    idle.sort_unstable_by_key(|(last_used, _)| *last_used);
    for (_, locator) in idle.into_iter().take(excess) {
        entries.map.remove(&locator);
        excess -= 1;
        tracing::debug!(locator = %locator, "Evicted least recently used archive");
    }
    if excess > 0 {
        tracing::debug!(excess, "Archive cache over capacity; remaining archives are in use");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_archive::MockLoader;

    fn locator(raw: &str) -> Locator {
        Locator::parse(raw).unwrap()
    }

    fn book() -> [(&'static str, Vec<u8>); 1] {
        [("001.png", b"png".to_vec())]
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_attempt() {
        let (loader, gate) = MockLoader::default().with_book("a.cbz", book()).gated();
        let loader = Arc::new(loader);
        let cache = ArchiveCache::new(loader.clone());
        let a = locator("a.cbz");
        let (first, second, third) = tokio::join!(cache.load(&a), cache.load(&a), async {
            tokio::task::yield_now().await;
            assert!(cache.is_pending(&a));
            gate.open();
            cache.load(&a).await
        });
        let (first, second, third) = (first.unwrap(), second.unwrap(), third.unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(loader.loads(), 1);
        assert!(cache.contains(&a));
    }

    #[tokio::test]
    async fn test_concurrent_failure_reaches_every_waiter() {
        let (loader, gate) = MockLoader::default().with_failure("x.cbz", "network error").gated();
        let loader = Arc::new(loader);
        let cache = ArchiveCache::new(loader.clone());
        let x = locator("x.cbz");
        let (first, second) = tokio::join!(cache.load(&x), async {
            tokio::task::yield_now().await;
            gate.open();
            cache.load(&x).await
        });
        for result in [first, second] {
            let err = result.unwrap_err();
            assert_eq!((*err).to_string(), "network error");
        }
        assert_eq!(loader.loads(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_sticky() {
        let loader = Arc::new(MockLoader::default().with_failure("a.cbz", "network error"));
        let cache = ArchiveCache::new(loader.clone());
        let a = locator("a.cbz");
        assert!(cache.load(&a).await.is_err());
        assert!(cache.is_empty());
        loader.set_book("a.cbz", book()).await;
        assert!(cache.load(&a).await.is_ok());
        assert_eq!(loader.loads(), 2);
    }

    #[tokio::test]
    async fn test_distinct_locators_load_separately() {
        let loader = Arc::new(MockLoader::default().with_book("a.cbz", book()).with_book("b.cbz", book()));
        let cache = ArchiveCache::new(loader.clone());
        let (loc_a, loc_b) = (locator("a.cbz"), locator("b.cbz"));
        let (a, b) = tokio::join!(cache.load(&loc_a), cache.load(&loc_b));
        assert!(!Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(loader.loads(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let loader = Arc::new(MockLoader::default().with_book("a.cbz", book()).with_book("b.cbz", book()));
        let cache = ArchiveCache::new(loader.clone()).with_capacity(NonZeroUsize::new(1));
        let (a, b) = (locator("a.cbz"), locator("b.cbz"));
        drop(cache.load(&a).await.unwrap());
        drop(cache.load(&b).await.unwrap());
        assert!(!cache.contains(&a));
        assert!(cache.contains(&b));
        drop(cache.load(&a).await.unwrap());
        assert_eq!(loader.loads(), 3);
    }

    #[tokio::test]
    async fn test_lru_keeps_archives_in_use() {
        let loader = Arc::new(MockLoader::default().with_book("a.cbz", book()).with_book("b.cbz", book()));
        let cache = ArchiveCache::new(loader.clone()).with_capacity(NonZeroUsize::new(1));
        let (a, b) = (locator("a.cbz"), locator("b.cbz"));
        let held = cache.load(&a).await.unwrap();
        drop(cache.load(&b).await.unwrap());
        assert!(cache.contains(&a));
        drop(held);
        assert!(cache.contains(&a));
    }

    #[tokio::test]
    async fn test_evict_and_clear() {
        let loader = Arc::new(MockLoader::default().with_book("a.cbz", book()).with_book("b.cbz", book()));
        let cache = ArchiveCache::new(loader.clone());
        let (a, b) = (locator("a.cbz"), locator("b.cbz"));
        cache.load(&a).await.unwrap();
        cache.load(&b).await.unwrap();
        assert!(cache.evict(&a));
        assert!(!cache.evict(&a));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
