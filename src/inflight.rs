//! In-flight request collapsing.
//!
//! Each distinct [`Signature`] maps to one shared completion handle. A call
//! that finds a live entry for its signature joins it instead of issuing a
//! second network request; every waiter receives the same `Result`.
//!
//! The work behind an entry runs as its own spawned task, so it completes
//! (and applies its cache writes once) even if every waiter is dropped.

use crate::error::{Error, Result};
use crate::key::Signature;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Completion handle shared by every waiter on one signature.
pub type Pending<V> = Shared<BoxFuture<'static, Result<V>>>;

struct InFlightEntry<V> {
    id: u64,
    future: Pending<V>,
    /// Attach count. Never decremented; the entry is dropped on settlement.
    waiters: Arc<AtomicUsize>,
}

/// Outcome of registering with the tracker.
pub struct Joined<V> {
    pub future: Pending<V>,
    /// True if this caller attached to an existing entry.
    pub collapsed: bool,
}

/// Map of signature to the call currently servicing it.
///
/// # Example
///
/// ```
/// use resource_kit::inflight::InFlightTracker;
/// use resource_kit::key::{CacheKey, Params, Signature};
/// use resource_kit::transport::Method;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let tracker: InFlightTracker<u32> = InFlightTracker::new();
/// let sig = Signature::new(Method::Get, "detail", CacheKey::entity("user", "1", &Params::new()));
///
/// let first = tracker.run(sig.clone(), true, async { Ok(7) });
/// let second = tracker.run(sig, true, async { Ok(8) });
///
/// assert!(second.collapsed);
/// assert_eq!(first.future.await.unwrap(), 7);
/// assert_eq!(second.future.await.unwrap(), 7);
/// # }
/// ```
pub struct InFlightTracker<V> {
    entries: Arc<DashMap<Signature, InFlightEntry<V>>>,
    next_id: AtomicU64,
}

impl<V> Default for InFlightTracker<V> {
    fn default() -> Self {
        InFlightTracker {
            entries: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> InFlightTracker<V> {
    pub fn new() -> Self {
        InFlightTracker::default()
    }

    /// Join the call servicing `signature`, or start `work` as that call.
    ///
    /// With `collapse == false` a new call is always started; it still takes
    /// over the entry so later collapsing callers join it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run<F>(&self, signature: Signature, collapse: bool, work: F) -> Joined<V>
    where
        F: Future<Output = Result<V>> + Send + 'static,
    {
        match self.entries.entry(signature.clone()) {
            Entry::Occupied(entry) if collapse => {
                let waiters = entry.get().waiters.fetch_add(1, Ordering::SeqCst) + 1;
                debug!("✓ In-flight JOIN {} ({} waiters)", signature, waiters);
                Joined {
                    future: entry.get().future.clone(),
                    collapsed: true,
                }
            }
            entry => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let entries = Arc::clone(&self.entries);
                let settled = signature.clone();

                // The shard lock is held until the entry is inserted below, so
                // the task cannot remove its entry before it exists.
                let task = tokio::spawn(async move {
                    let outcome = work.await;
                    entries.remove_if(&settled, |_, current| current.id == id);
                    outcome
                });

                let future = async move {
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => Err(Error::Other(format!("in-flight task failed: {}", e))),
                    }
                }
                .boxed()
                .shared();

                let fresh = InFlightEntry {
                    id,
                    future: future.clone(),
                    waiters: Arc::new(AtomicUsize::new(1)),
                };
                match entry {
                    Entry::Occupied(mut occupied) => {
                        debug!("» In-flight REPLACE {}", signature);
                        occupied.insert(fresh);
                    }
                    Entry::Vacant(vacant) => {
                        debug!("» In-flight START {}", signature);
                        vacant.insert(fresh);
                    }
                }

                Joined {
                    future,
                    collapsed: false,
                }
            }
        }
    }

    /// Number of callers that have attached to the live call for `signature`.
    ///
    /// The count only grows; a caller that drops its future is not subtracted.
    /// It resets to zero when the call settles and its entry is removed.
    pub fn waiters(&self, signature: &Signature) -> usize {
        self.entries
            .get(signature)
            .map(|entry| entry.waiters.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.entries.contains_key(signature)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{CacheKey, Params};
    use crate::transport::Method;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    fn sig(id: &str) -> Signature {
        Signature::new(Method::Get, "detail", CacheKey::entity("user", id, &Params::new()))
    }

    #[tokio::test]
    async fn test_concurrent_calls_collapse() {
        let tracker: InFlightTracker<String> = InFlightTracker::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel::<()>();

        let first = {
            let runs = Arc::clone(&runs);
            tracker.run(sig("1"), true, async move {
                runs.fetch_add(1, Ordering::SeqCst);
                let _ = rx.await;
                Ok("done".to_string())
            })
        };
        let second = {
            let runs = Arc::clone(&runs);
            tracker.run(sig("1"), true, async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok("never".to_string())
            })
        };

        assert!(!first.collapsed);
        assert!(second.collapsed);
        assert_eq!(tracker.waiters(&sig("1")), 2);

        tx.send(()).unwrap();
        assert_eq!(first.future.await.unwrap(), "done");
        assert_eq!(second.future.await.unwrap(), "done");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_errors_reach_every_waiter() {
        let tracker: InFlightTracker<u8> = InFlightTracker::new();
        let (tx, rx) = oneshot::channel::<()>();

        let first = tracker.run(sig("1"), true, async move {
            let _ = rx.await;
            Err(Error::Network("reset".to_string()))
        });
        let second = tracker.run(sig("1"), true, async { Ok(1) });

        tx.send(()).unwrap();
        assert!(matches!(first.future.await, Err(Error::Network(_))));
        assert!(matches!(second.future.await, Err(Error::Network(_))));
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_forced_call_takes_over_entry() {
        let tracker: InFlightTracker<u8> = InFlightTracker::new();
        let (old_tx, old_rx) = oneshot::channel::<()>();
        let (new_tx, new_rx) = oneshot::channel::<()>();

        let old = tracker.run(sig("1"), true, async move {
            let _ = old_rx.await;
            Ok(1)
        });
        let forced = tracker.run(sig("1"), false, async move {
            let _ = new_rx.await;
            Ok(2)
        });
        let joiner = tracker.run(sig("1"), true, async { Ok(3) });

        assert!(!forced.collapsed);
        assert!(joiner.collapsed);

        // Settling the older call must not drop the forced call's entry.
        old_tx.send(()).unwrap();
        assert_eq!(old.future.await.unwrap(), 1);
        assert!(tracker.contains(&sig("1")));

        new_tx.send(()).unwrap();
        assert_eq!(forced.future.await.unwrap(), 2);
        assert_eq!(joiner.future.await.unwrap(), 2);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_signatures_do_not_collapse() {
        let tracker: InFlightTracker<u8> = InFlightTracker::new();

        let a = tracker.run(sig("1"), true, async { Ok(1) });
        let b = tracker.run(sig("2"), true, async { Ok(2) });

        assert!(!b.collapsed);
        assert_eq!(a.future.await.unwrap(), 1);
        assert_eq!(b.future.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_work_completes_without_waiters() {
        let tracker: InFlightTracker<u8> = InFlightTracker::new();
        let (tx, rx) = oneshot::channel::<u8>();

        let joined = tracker.run(sig("1"), true, async move {
            let _ = tx.send(9);
            Ok(9)
        });
        drop(joined);

        assert_eq!(rx.await.unwrap(), 9);
    }
}
