//! Memoized asynchronous tasks keyed by identity.
//!
//! A [`TaskCache`] guarantees that the work registered for a key is started at
//! most once and that every caller observes the same outcome. Outcomes are
//! shared by cloning, so `V` is usually an `Arc` or a `Result` of `Arc`s.

use std::fmt;
use std::future::Future;
use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::watch;

/// Failure to obtain a task outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("no task registered for `{0}`")]
    NotFound(String),

    #[error("task was cancelled")]
    Cancelled,

    #[error("task terminated without producing a result")]
    Abandoned,
}

/// A shareable handle to the eventual outcome of a task.
pub struct TaskHandle<V> {
    rx: watch::Receiver<Option<V>>,
}

impl<V> Clone for TaskHandle<V> {
    fn clone(&self) -> Self {
        TaskHandle {
            rx: self.rx.clone(),
        }
    }
}

impl<V> fmt::Debug for TaskHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("complete", &self.rx.borrow().is_some())
            .finish()
    }
}

/// The write side of a [`TaskHandle`], held by whoever starts the work.
pub struct TaskCompleter<V> {
    tx: watch::Sender<Option<V>>,
}

impl<V: Clone + Send + Sync + 'static> TaskHandle<V> {
    /// Create an unresolved handle together with its completer.
    pub fn pending() -> (TaskHandle<V>, TaskCompleter<V>) {
        let (tx, rx) = watch::channel(None);
        (TaskHandle { rx }, TaskCompleter { tx })
    }

    /// Spawn `work` on the current Tokio runtime and return its handle.
    pub fn spawn<Fut>(work: Fut) -> TaskHandle<V>
    where
        Fut: Future<Output = V> + Send + 'static,
    {
        let (handle, completer) = TaskHandle::pending();
        completer.spawn(work);
        handle
    }

    /// Wait for the outcome.
    pub async fn wait(&self) -> Result<V, TaskError> {
        if let Some(value) = self.rx.borrow().as_ref() {
            return Ok(value.clone());
        }
        let mut rx = self.rx.clone();
        let value = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| TaskError::Abandoned)?
            .clone();
        value.ok_or(TaskError::Abandoned)
    }

    /// The outcome, if the task has already finished.
    pub fn try_result(&self) -> Option<V> {
        self.rx.borrow().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

impl<V: Send + Sync + 'static> TaskCompleter<V> {
    /// Resolve the handle with `value`.
    pub fn complete(self, value: V) {
        // No receivers left is fine; the outcome is simply unobserved.
        let _ = self.tx.send(Some(value));
    }

    /// Drive `work` to completion on the runtime and resolve the handle.
    ///
    /// If `work` panics the completer is dropped and waiters observe
    /// [`TaskError::Abandoned`].
    pub fn spawn<Fut>(self, work: Fut)
    where
        Fut: Future<Output = V> + Send + 'static,
    {
        tokio::spawn(async move {
            let value = work.await;
            self.complete(value);
        });
    }
}

/// Memoized futures keyed by `K`.
///
/// Must be used from within a Tokio runtime: the first caller for a key spawns
/// the work.
pub struct TaskCache<K, V> {
    tasks: DashMap<K, TaskHandle<V>>,
}

impl<K, V> TaskCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        TaskCache {
            tasks: DashMap::new(),
        }
    }

    /// Return the task for `key`, starting it with `factory` if absent.
    ///
    /// The pending handle is installed before `factory` runs, so racing
    /// callers never invoke the factory twice. `factory` itself runs outside
    /// the map lock and may use this cache.
    pub fn get_or_add<F, Fut>(&self, key: K, factory: F) -> TaskHandle<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (handle, completer) = match self.tasks.entry(key.clone()) {
            Entry::Occupied(existing) => {
                tracing::trace!(key = ?key, "task cache hit");
                return existing.get().clone();
            }
            Entry::Vacant(slot) => {
                let (handle, completer) = TaskHandle::pending();
                slot.insert(handle.clone());
                (handle, completer)
            }
        };

        tracing::trace!(key = ?key, "task cache miss, starting work");
        completer.spawn(factory());
        handle
    }

    /// Look up an existing task without creating one.
    pub fn get(&self, key: &K) -> Result<TaskHandle<V>, TaskError> {
        self.tasks
            .get(key)
            .map(|h| h.clone())
            .ok_or_else(|| TaskError::NotFound(format!("{:?}", key)))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.tasks.contains_key(key)
    }

    /// Forget the task for `key`. Running work is not interrupted.
    pub fn remove(&self, key: &K) -> bool {
        self.tasks.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.tasks.clear();
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<K, V> Default for TaskCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
