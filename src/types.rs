use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Error type for work whose own error is not `Clone`.
///
/// Every caller sharing an invocation gets a clone of the same `Arc`, so
/// `Arc::ptr_eq` tells whether two callers saw the same failure.
pub type SharedError = Arc<anyhow::Error>;

/// Options represents the options for a group
#[derive(Clone, Debug)]
pub struct Options {
    /// Name is the label of this namespace of deduplicated work, recorded on
    /// every tracing span. default is "default"
    pub name: String,
    /// Capacity is the number of keys the registry can hold in flight before
    /// it reallocates. default is 0
    pub capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            capacity: 0,
        }
    }
}

/// Counters describing how a group has been used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Invocations started.
    pub leaders: u64,
    /// Calls that joined an invocation started by someone else.
    pub followers: u64,
    /// Invocations that stored a result, successful or not.
    pub completed: u64,
    /// Leaders that stopped without storing a result.
    pub abandoned: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    leaders: AtomicU64,
    followers: AtomicU64,
    completed: AtomicU64,
    abandoned: AtomicU64,
}

impl Counters {
    pub(crate) fn leader(&self) {
        self.leaders.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn follower(&self) {
        self.followers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            leaders: self.leaders.load(Ordering::Relaxed),
            followers: self.followers.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}
