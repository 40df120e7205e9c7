//! Memoized tasks with reference-counted cooperative cancellation.
//!
//! Shared work is only torn down once every interested caller has withdrawn.
//! Each entry keeps an interest counter driven by compare-and-swap:
//!
//! ```text
//!   n > 0  live, n callers are waiting
//!   0      cancelled; terminal, rejects joins
//!   DONE   work finished; joins succeed without counting
//! ```
//!
//! A caller that finds an entry in the cancelled state removes it and retries
//! as on a miss, so interest is never attached to work that is being torn
//! down.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::util::cancel::{CancellationSource, CancellationToken};
use crate::util::task_cache::{TaskError, TaskHandle};

const CANCELLED: isize = 0;
const DONE: isize = -1;

struct Slot<V> {
    interest: AtomicIsize,
    source: CancellationSource,
    handle: TaskHandle<V>,
}

impl<V> Slot<V> {
    /// Register one more interested party. Fails once the slot is cancelled.
    fn try_join(&self) -> bool {
        let mut current = self.interest.load(Ordering::Acquire);
        loop {
            match current {
                DONE => return true,
                CANCELLED => return false,
                n => match self.interest.compare_exchange_weak(
                    current,
                    n + 1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return true,
                    Err(actual) => current = actual,
                },
            }
        }
    }

    /// Drop one interested party. Returns `true` if this was the last one and
    /// the slot is now cancelled.
    fn withdraw(&self) -> bool {
        let mut current = self.interest.load(Ordering::Acquire);
        loop {
            match current {
                DONE | CANCELLED => return false,
                n => match self.interest.compare_exchange_weak(
                    current,
                    n - 1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return n - 1 == CANCELLED,
                    Err(actual) => current = actual,
                },
            }
        }
    }

    /// Pin the slot as finished. A slot that was already cancelled stays so.
    fn mark_done(&self) {
        let mut current = self.interest.load(Ordering::Acquire);
        while current > CANCELLED {
            match self.interest.compare_exchange_weak(
                current,
                DONE,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

type SlotMap<K, V> = DashMap<K, Arc<Slot<V>>>;

/// Interest held by one caller; withdrawn on drop.
struct Interest<K, V>
where
    K: Eq + Hash + Clone,
{
    slots: Arc<SlotMap<K, V>>,
    key: K,
    slot: Arc<Slot<V>>,
}

impl<K, V> Drop for Interest<K, V>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        if self.slot.withdraw() {
            self.slot.source.cancel();
            let slot = &self.slot;
            self.slots.remove_if(&self.key, |_, current| Arc::ptr_eq(current, slot));
        }
    }
}

/// A [`TaskCache`](crate::util::task_cache::TaskCache) whose entries are
/// cancelled once nobody is waiting for them any more.
pub struct ReferenceCancellableCache<K, V> {
    slots: Arc<SlotMap<K, V>>,
}

impl<K, V> Clone for ReferenceCancellableCache<K, V> {
    fn clone(&self) -> Self {
        ReferenceCancellableCache {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<K, V> ReferenceCancellableCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        ReferenceCancellableCache {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Join the work for `key`, starting it with `factory` if needed.
    ///
    /// `factory` receives the token of the shared work; it fires once every
    /// caller has withdrawn. The caller's interest is registered before this
    /// returns and withdrawn when the returned future completes, is dropped,
    /// or observes `token` being cancelled (yielding [`TaskError::Cancelled`]).
    pub fn get_or_add<F, Fut>(
        &self,
        key: K,
        factory: F,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<V, TaskError>> + Send + 'static
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let interest = self.join_or_create(key, factory);
        let token = token.clone();

        async move {
            tokio::select! {
                biased;
                outcome = interest.slot.handle.wait() => outcome,
                _ = token.cancelled() => {
                    tracing::debug!(key = ?interest.key, "caller withdrew from shared task");
                    Err(TaskError::Cancelled)
                }
            }
        }
    }

    fn join_or_create<F, Fut>(&self, key: K, factory: F) -> Interest<K, V>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        loop {
            match self.slots.entry(key.clone()) {
                Entry::Occupied(existing) => {
                    let slot = Arc::clone(existing.get());
                    if slot.try_join() {
                        tracing::trace!(key = ?key, "joined shared task");
                        return Interest {
                            slots: Arc::clone(&self.slots),
                            key,
                            slot,
                        };
                    }
                    // Mid-teardown: clear it out and retry as a miss.
                    existing.remove();
                }
                Entry::Vacant(vacant) => {
                    let (handle, completer) = TaskHandle::pending();
                    let slot = Arc::new(Slot {
                        interest: AtomicIsize::new(1),
                        source: CancellationSource::new(),
                        handle,
                    });
                    vacant.insert(Arc::clone(&slot));

                    tracing::trace!(key = ?key, "starting shared task");
                    let work = factory(slot.source.token());
                    let finished = Arc::clone(&slot);
                    completer.spawn(async move {
                        let value = work.await;
                        finished.mark_done();
                        value
                    });

                    return Interest {
                        slots: Arc::clone(&self.slots),
                        key,
                        slot,
                    };
                }
            }
        }
    }

    /// Current interest count for `key`; `None` if absent, `Some(-1)` once done.
    pub fn interest(&self, key: &K) -> Option<isize> {
        self.slots
            .get(key)
            .map(|slot| slot.interest.load(Ordering::Acquire))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Forget a finished or abandoned entry so the next caller starts afresh.
    pub fn remove(&self, key: &K) -> bool {
        self.slots.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K, V> Default for ReferenceCancellableCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    use crate::util::cancel::CancellationSource;

    /// Work that runs until its shared token is cancelled.
    fn until_cancelled(
        fired: Arc<AtomicBool>,
    ) -> impl FnOnce(CancellationToken) -> std::pin::Pin<Box<dyn Future<Output = u32> + Send>> {
        move |work_token| {
            Box::pin(async move {
                work_token.cancelled().await;
                fired.store(true, Ordering::SeqCst);
                0
            })
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_work_survives_until_last_withdrawal() {
        let cache: ReferenceCancellableCache<&'static str, u32> = ReferenceCancellableCache::new();
        let fired = Arc::new(AtomicBool::new(false));

        let first = CancellationSource::new();
        let second = CancellationSource::new();

        let a = tokio::spawn(cache.get_or_add("m", until_cancelled(fired.clone()), &first.token()));
        let b = tokio::spawn(cache.get_or_add(
            "m",
            |_| async { 99 },
            &second.token(),
        ));
        settle().await;
        assert_eq!(cache.interest(&"m"), Some(2));

        first.cancel();
        assert_eq!(a.await.unwrap(), Err(TaskError::Cancelled));
        settle().await;
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(cache.interest(&"m"), Some(1));

        second.cancel();
        assert_eq!(b.await.unwrap(), Err(TaskError::Cancelled));
        settle().await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(!cache.contains_key(&"m"));
    }

    #[tokio::test]
    async fn test_dropping_future_withdraws() {
        let cache: ReferenceCancellableCache<u32, u32> = ReferenceCancellableCache::new();
        let fired = Arc::new(AtomicBool::new(false));

        let pending = cache.get_or_add(1, until_cancelled(fired.clone()), &CancellationToken::none());
        assert_eq!(cache.interest(&1), Some(1));
        drop(pending);

        settle().await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_completed_work_stays_memoized() {
        let cache: ReferenceCancellableCache<u32, u32> = ReferenceCancellableCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value = cache
                .get_or_add(
                    9,
                    move |_| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        7
                    },
                    &CancellationToken::none(),
                )
                .await;
            assert_eq!(value, Ok(7));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.interest(&9), Some(DONE));
    }

    #[tokio::test]
    async fn test_cancelled_entry_is_replaced() {
        let cache: ReferenceCancellableCache<u32, u32> = ReferenceCancellableCache::new();
        let source = CancellationSource::new();
        let fired = Arc::new(AtomicBool::new(false));

        let first = tokio::spawn(cache.get_or_add(1, until_cancelled(fired), &source.token()));
        settle().await;
        source.cancel();
        assert_eq!(first.await.unwrap(), Err(TaskError::Cancelled));

        let second = cache
            .get_or_add(1, |_| async { 11 }, &CancellationToken::none())
            .await;
        assert_eq!(second, Ok(11));
    }

    #[test]
    fn test_slot_state_machine() {
        let (handle, _completer) = TaskHandle::<u32>::pending();
        let slot = Slot {
            interest: AtomicIsize::new(1),
            source: CancellationSource::new(),
            handle,
        };

        assert!(slot.try_join());
        assert!(!slot.withdraw());
        assert!(slot.withdraw());
        assert!(!slot.try_join(), "cancelled slot must reject joins");

        let (handle, _completer) = TaskHandle::<u32>::pending();
        let done = Slot {
            interest: AtomicIsize::new(2),
            source: CancellationSource::new(),
            handle,
        };
        done.mark_done();
        assert!(done.try_join());
        assert!(!done.withdraw());
        assert_eq!(done.interest.load(Ordering::SeqCst), DONE);
    }
}
