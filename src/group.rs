use core::fmt;
use core::future::Future;
use core::hash::Hash;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, trace, warn};

use crate::call::{Call, Outcome};
use crate::types::{Counters, Options, Stats};

struct Inner<K, T, E> {
    entries: RwLock<HashMap<K, Arc<Call<T, E>>>>,
    options: Options,
    counters: Counters,
}

/// Group represents a class of work and creates a space in which units of work
/// can be executed with duplicate suppression.
///
/// Cloning a `Group` gives another handle to the same registry. Independent
/// namespaces are independent `Group` values; there is no global one.
pub struct Group<K, T, E> {
    inner: Arc<Inner<K, T, E>>,
}

enum Role<T, E> {
    Leader(Arc<Call<T, E>>),
    Follower(Arc<Call<T, E>>),
}

impl<K, T, E> Group<K, T, E> {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Group {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::with_capacity(options.capacity)),
                options,
                counters: Counters::default(),
            }),
        }
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    pub fn stats(&self) -> Stats {
        self.inner.counters.snapshot()
    }

    /// Number of keys with an invocation in flight.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Hash + Eq, T, E> Group<K, T, E> {
    /// Whether `key` has an invocation in flight right now.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.entries.read().contains_key(key)
    }
}

impl<K, T, E> Group<K, T, E>
where
    K: Hash + Eq + Clone + fmt::Debug,
    T: Clone,
    E: Clone,
{
    /// work executes and returns the results of the given function, making
    /// sure that only one execution is in-flight for a given key at a
    /// time. If a duplicate comes in, the duplicate caller waits for the
    /// original to complete and receives the same results.
    ///
    /// An `Err` returned by `work` is shared exactly like an `Ok`; nothing is
    /// kept once the call completes, so the next call for `key` runs again.
    /// If the leader panics out of `work`, waiting callers elect a new leader
    /// among themselves instead of waiting forever.
    #[instrument(skip(self, work), fields(group = %self.inner.options.name))]
    pub fn work<F>(&self, key: K, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        loop {
            match self.join_or_lead(&key) {
                Role::Follower(call) => match call.wait() {
                    Outcome::Done(result) => {
                        trace!("Value returned");
                        return result;
                    }
                    Outcome::LeaderDrop => {
                        trace!("Leader dropped, retrying");
                        continue;
                    }
                },
                Role::Leader(call) => {
                    let leader = Leader::new(self, &key, call);
                    trace!("working...");
                    return leader.complete(work());
                }
            }
        }
    }

    /// async_work is like work but awaits the given future instead of
    /// blocking. Callers of `work` and `async_work` with the same key share
    /// the same invocation.
    ///
    /// A follower's future is dropped without being polled. Dropping the
    /// leader's `async_work` future before it finishes releases the followers,
    /// one of which then runs its own future.
    #[instrument(skip(self, fut), fields(group = %self.inner.options.name))]
    pub async fn async_work<Fut>(&self, key: K, fut: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        loop {
            match self.join_or_lead(&key) {
                Role::Follower(call) => match call.wait_async().await {
                    Outcome::Done(result) => {
                        trace!("Value returned");
                        return result;
                    }
                    Outcome::LeaderDrop => {
                        trace!("Leader dropped, retrying");
                        continue;
                    }
                },
                Role::Leader(call) => {
                    let leader = Leader::new(self, &key, call);
                    trace!("working...");
                    return leader.complete(fut.await);
                }
            }
        }
    }

    fn join_or_lead(&self, key: &K) -> Role<T, E> {
        let map = self.inner.entries.upgradable_read();
        trace!("Aquire read lock");

        if let Some(call) = map.get(key) {
            let call = call.clone();
            drop(map);
            self.inner.counters.follower();
            trace!("Not return, waiting...");
            return Role::Follower(call);
        }

        let mut map = RwLockUpgradableReadGuard::upgrade(map);
        let call = Arc::new(Call::new());
        map.insert(key.clone(), call.clone());
        drop(map);

        self.inner.counters.leader();
        trace!("entry inited");
        Role::Leader(call)
    }

    fn retire(&self, key: &K, call: &Arc<Call<T, E>>) {
        let mut map = self.inner.entries.write();
        if map.get(key).is_some_and(|current| Arc::ptr_eq(current, call)) {
            map.remove(key);
        }
        drop(map);
        trace!("Entry removed");
    }
}

/// Held by the caller running the work. Retires the entry whether the work
/// finishes or the leader goes away mid-flight.
struct Leader<'a, K, T, E>
where
    K: Hash + Eq + Clone + fmt::Debug,
    T: Clone,
    E: Clone,
{
    group: &'a Group<K, T, E>,
    key: &'a K,
    call: Arc<Call<T, E>>,
    done: bool,
}

impl<'a, K, T, E> Leader<'a, K, T, E>
where
    K: Hash + Eq + Clone + fmt::Debug,
    T: Clone,
    E: Clone,
{
    fn new(group: &'a Group<K, T, E>, key: &'a K, call: Arc<Call<T, E>>) -> Self {
        Leader {
            group,
            key,
            call,
            done: false,
        }
    }

    fn complete(mut self, result: Result<T, E>) -> Result<T, E> {
        self.call.complete(result.clone());
        self.group.inner.counters.completed();
        trace!("Work done");

        self.group.retire(self.key, &self.call);
        self.done = true;
        result
    }
}

impl<K, T, E> Drop for Leader<'_, K, T, E>
where
    K: Hash + Eq + Clone + fmt::Debug,
    T: Clone,
    E: Clone,
{
    fn drop(&mut self) {
        if self.done {
            return;
        }
        warn!(key = ?self.key, "Leader dropped before work completed");
        // Retire first so woken followers contend for a fresh entry.
        self.group.retire(self.key, &self.call);
        self.group.inner.counters.abandoned();
        self.call.abandon();
    }
}

impl<K, T, E> Clone for Group<K, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, T, E> Default for Group<K, T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, E> fmt::Debug for Group<K, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.inner.options.name)
            .field("in_flight", &self.len())
            .finish_non_exhaustive()
    }
}
