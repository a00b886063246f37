use parking_lot::{Condvar, Mutex};
use std::pin::pin;
use tokio::sync::Notify;

#[derive(Debug)]
enum Status<T, E> {
    Starting,
    LeaderDrop,
    Done(Result<T, E>),
}

/// What a waiter sees once a call has left `Starting`.
#[derive(Debug)]
pub(crate) enum Outcome<T, E> {
    Done(Result<T, E>),
    LeaderDrop,
}

/// One outstanding invocation, shared by its leader and every follower.
///
/// The status moves out of `Starting` exactly once. Blocking waiters park on
/// the condvar, async waiters on the notify; both are woken after the new
/// status has been written under the mutex.
#[derive(Debug)]
pub(crate) struct Call<T, E> {
    status: Mutex<Status<T, E>>,
    cvar: Condvar,
    notify: Notify,
}

impl<T, E> Call<T, E> {
    pub(crate) fn new() -> Self {
        Self {
            status: Mutex::new(Status::Starting),
            cvar: Condvar::new(),
            notify: Notify::new(),
        }
    }

    pub(crate) fn complete(&self, result: Result<T, E>) {
        self.finish(Status::Done(result));
    }

    pub(crate) fn abandon(&self) {
        self.finish(Status::LeaderDrop);
    }

    fn finish(&self, status: Status<T, E>) {
        let mut current = self.status.lock();
        debug_assert!(matches!(*current, Status::Starting));
        *current = status;
        drop(current);

        self.cvar.notify_all();
        self.notify.notify_waiters();
    }
}

impl<T: Clone, E: Clone> Call<T, E> {
    /// Blocks the current thread until the call is done or its leader is gone.
    pub(crate) fn wait(&self) -> Outcome<T, E> {
        let mut status = self.status.lock();
        loop {
            match &*status {
                Status::Starting => self.cvar.wait(&mut status),
                Status::LeaderDrop => return Outcome::LeaderDrop,
                Status::Done(result) => return Outcome::Done(result.clone()),
            }
        }
    }

    pub(crate) async fn wait_async(&self) -> Outcome<T, E> {
        loop {
            // Register interest before looking at the status so a wakeup
            // between the check and the await is not lost.
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            if let Some(outcome) = self.try_outcome() {
                return outcome;
            }
            notified.await;
        }
    }

    fn try_outcome(&self) -> Option<Outcome<T, E>> {
        match &*self.status.lock() {
            Status::Starting => None,
            Status::LeaderDrop => Some(Outcome::LeaderDrop),
            Status::Done(result) => Some(Outcome::Done(result.clone())),
        }
    }
}
