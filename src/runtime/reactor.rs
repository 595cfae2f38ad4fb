use super::builder::Config;
use super::REACTOR;

use core::cell::RefCell;
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use slab::Slab;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Wake;
use std::time::{Duration, Instant};
use tracing::trace;

/// Repeating timers never fire more often than this.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Identifies a timer registered with a [`Reactor`].
///
/// Keys are never reused: cancelling a stale key is a no-op even after its
/// slot has been handed to a newer timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerKey {
    slot: usize,
    unique: u64,
}

#[derive(Debug)]
struct TimerEntry {
    unique: u64,
    /// `None` when the deadline lies beyond what `Instant` can represent.
    deadline: Option<Instant>,
    period: Option<Duration>,
    fired: u64,
    waker: Option<Waker>,
}

type LocalFuture = Pin<Box<dyn Future<Output = ()>>>;

struct LocalTask {
    /// `None` while the task is being polled.
    future: Option<LocalFuture>,
    waker: Arc<ReactorWaker>,
}

impl fmt::Debug for LocalTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTask")
            .field("polling", &self.future.is_none())
            .field("awake", &self.waker.awake())
            .finish()
    }
}

/// A token that keeps the event loop running while it is held.
///
/// Created with [`Reactor::keep_alive`]. `block_on` does not return while any
/// token is alive, even after its root future has completed.
#[derive(Debug)]
#[must_use = "the event loop is only kept alive while the token is held"]
pub struct KeepAlive {
    reactor: Reactor,
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        let mut reactor = self.reactor.inner.borrow_mut();
        reactor.outstanding -= 1;
        trace!(outstanding = reactor.outstanding, "released keep-alive token");
    }
}

/// Manage timers, detached tasks and keep-alive tokens for one event loop.
#[derive(Debug, Clone)]
pub struct Reactor {
    inner: Rc<RefCell<InnerReactor>>,
}

/// The private, internal `Reactor` implementation - factored out so we can take
/// a lock of the whole.
#[derive(Debug)]
struct InnerReactor {
    config: Config,
    timers: Slab<TimerEntry>,
    deadlines: BTreeSet<(Instant, TimerKey)>,
    tasks: Slab<LocalTask>,
    outstanding: usize,
}

impl Reactor {
    /// Return a `Reactor` for the currently running `stardos::runtime::block_on`.
    ///
    /// # Panic
    /// This will panic if called outside of `stardos::runtime::block_on`.
    pub fn current() -> Self {
        Self::try_current().expect("Reactor::current must be called within a stardos runtime")
    }

    /// Return the `Reactor` of the running event loop, if there is one.
    pub fn try_current() -> Option<Self> {
        REACTOR.with(|r| r.borrow().clone())
    }

    /// Create a new instance of `Reactor`
    pub(crate) fn new(config: Config) -> Self {
        Self {
            inner: Rc::new(RefCell::new(InnerReactor {
                config,
                timers: Slab::new(),
                deadlines: BTreeSet::new(),
                tasks: Slab::new(),
                outstanding: 0,
            })),
        }
    }

    /// Whether the host offers a cancellation primitive for spawned work.
    pub fn supports_cancellation(&self) -> bool {
        self.inner.borrow().config.cancellation
    }

    pub(crate) fn waits_for_tasks(&self) -> bool {
        self.inner.borrow().config.wait_for_tasks
    }

    /// Schedule a timer that fires once, `delay` from now.
    ///
    /// A delay too long to represent as an `Instant` yields a timer that
    /// never fires.
    pub fn schedule_after(&self, delay: Duration) -> TimerKey {
        self.insert_timer(Instant::now().checked_add(delay), None)
    }

    /// Schedule a timer that fires every `period`, starting one period from
    /// now. Deadlines advance by whole periods so the timer does not drift.
    pub fn schedule_repeating(&self, period: Duration) -> TimerKey {
        let period = period.max(MIN_PERIOD);
        self.insert_timer(Instant::now().checked_add(period), Some(period))
    }

    fn insert_timer(&self, deadline: Option<Instant>, period: Option<Duration>) -> TimerKey {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut reactor = self.inner.borrow_mut();
        let slot = reactor.timers.insert(TimerEntry {
            unique,
            deadline,
            period,
            fired: 0,
            waker: None,
        });
        let key = TimerKey { slot, unique };
        match deadline {
            Some(deadline) => {
                reactor.deadlines.insert((deadline, key));
                trace!(?key, ?period, "scheduled timer");
            }
            None => trace!(?key, ?period, "scheduled timer that never fires"),
        }
        key
    }

    /// Cancel a timer. Returns `false` if it was already cancelled.
    ///
    /// A cancelled timer never fires again, and anyone waiting on it stays
    /// pending.
    pub fn cancel(&self, key: TimerKey) -> bool {
        let entry = {
            let mut reactor = self.inner.borrow_mut();
            match reactor.timers.get(key.slot) {
                Some(entry) if entry.unique == key.unique => {}
                _ => return false,
            }
            let entry = reactor.timers.remove(key.slot);
            if let Some(deadline) = entry.deadline {
                reactor.deadlines.remove(&(deadline, key));
            }
            entry
        };
        trace!(?key, fired = entry.fired, "cancelled timer");
        true
    }

    /// Whether `key` refers to a live timer.
    pub fn is_scheduled(&self, key: TimerKey) -> bool {
        matches!(
            self.inner.borrow().timers.get(key.slot),
            Some(entry) if entry.unique == key.unique
        )
    }

    /// Check whether the timer fired more often than `seen` times.
    ///
    /// Returns the total number of firings once it has. Otherwise the waker
    /// is stored and woken on the next firing. Cancelled timers stay pending.
    pub fn poll_timer(&self, key: TimerKey, seen: u64, waker: &Waker) -> Poll<u64> {
        let mut reactor = self.inner.borrow_mut();
        match reactor.timers.get_mut(key.slot) {
            Some(entry) if entry.unique == key.unique => {
                if entry.fired > seen {
                    Poll::Ready(entry.fired)
                } else {
                    entry.waker = Some(waker.clone());
                    Poll::Pending
                }
            }
            _ => Poll::Pending,
        }
    }

    /// Take a keep-alive token. The event loop keeps running until it drops.
    pub fn keep_alive(&self) -> KeepAlive {
        let mut reactor = self.inner.borrow_mut();
        reactor.outstanding += 1;
        trace!(outstanding = reactor.outstanding, "acquired keep-alive token");
        KeepAlive {
            reactor: self.clone(),
        }
    }

    /// The number of keep-alive tokens currently held.
    pub fn outstanding(&self) -> usize {
        self.inner.borrow().outstanding
    }

    /// Run `future` as a detached local task.
    ///
    /// The future is polled once right away, so work up to its first
    /// suspension point happens before `spawn` returns. Spawning alone does
    /// not keep the loop alive: hold a [`KeepAlive`] for that.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        let key = self.inner.borrow_mut().tasks.insert(LocalTask {
            future: Some(Box::pin(future)),
            waker: Arc::new(ReactorWaker::new()),
        });
        trace!(task = key, "spawned local task");
        self.poll_task(key);
    }

    fn poll_task(&self, key: usize) {
        let (mut future, waker) = {
            let mut reactor = self.inner.borrow_mut();
            let Some(task) = reactor.tasks.get_mut(key) else {
                return;
            };
            // Already on the stack further up: it was woken while polling.
            let Some(future) = task.future.take() else {
                return;
            };
            (future, Waker::from(Arc::clone(&task.waker)))
        };

        let mut cx = Context::from_waker(&waker);
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                // Destructors may call back into the reactor.
                drop(future);
                self.inner.borrow_mut().tasks.try_remove(key);
                trace!(task = key, "local task finished");
            }
            Poll::Pending => {
                if let Some(task) = self.inner.borrow_mut().tasks.get_mut(key) {
                    task.future = Some(future);
                }
            }
        }
    }

    /// Poll every task that was woken since it was last polled.
    pub(crate) fn run_ready_tasks(&self) {
        let ready: Vec<usize> = self
            .inner
            .borrow()
            .tasks
            .iter()
            .filter(|(_, task)| task.waker.take_awake())
            .map(|(key, _)| key)
            .collect();
        for key in ready {
            self.poll_task(key);
        }
    }

    pub(crate) fn has_ready_tasks(&self) -> bool {
        self.inner
            .borrow()
            .tasks
            .iter()
            .any(|(_, task)| task.waker.awake())
    }

    pub(crate) fn pending_tasks(&self) -> usize {
        self.inner.borrow().tasks.len()
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.inner
            .borrow()
            .deadlines
            .first()
            .map(|(deadline, _)| *deadline)
    }

    /// Block until `deadline`, then fire every timer that is due.
    pub(crate) fn block_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            trace!(wait = ?(deadline - now), "parking event loop");
            std::thread::sleep(deadline - now);
        }
        self.fire_due(Instant::now());
    }

    /// Fire all timers whose deadline is at or before `now` and wake whoever
    /// waits on them. Repeating timers that missed several periods fire once.
    pub(crate) fn fire_due(&self, now: Instant) {
        let mut wakers = Vec::new();
        {
            let mut reactor = self.inner.borrow_mut();
            let reactor = &mut *reactor;
            while let Some(&(deadline, key)) = reactor.deadlines.first() {
                if deadline > now {
                    break;
                }
                reactor.deadlines.pop_first();
                let entry = match reactor.timers.get_mut(key.slot) {
                    Some(entry) if entry.unique == key.unique => entry,
                    _ => continue,
                };
                entry.fired += 1;
                trace!(?key, fired = entry.fired, "timer fired");
                wakers.extend(entry.waker.take());
                entry.deadline = entry.period.and_then(|period| {
                    let mut next = deadline.checked_add(period)?;
                    while next <= now {
                        next = next.checked_add(period)?;
                    }
                    Some(next)
                });
                if let Some(next) = entry.deadline {
                    reactor.deadlines.insert((next, key));
                }
            }
        }
        for waker in wakers {
            waker.wake();
        }
    }

    /// Drop all remaining tasks and timers. Breaks the reference cycles
    /// between the reactor and the futures it owns.
    pub(crate) fn shutdown(&self) {
        let (tasks, timers) = {
            let mut reactor = self.inner.borrow_mut();
            reactor.deadlines.clear();
            (
                std::mem::take(&mut reactor.tasks),
                std::mem::take(&mut reactor.timers),
            )
        };
        drop(tasks);
        drop(timers);
    }
}

/// Flags its owner as runnable. There is a single thread, so waking never
/// has to unpark anything: the loop checks the flag before it sleeps.
#[derive(Debug)]
pub(crate) struct ReactorWaker {
    awake: AtomicBool,
}

impl ReactorWaker {
    pub(crate) fn new() -> Self {
        Self {
            awake: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn set_awake(&self, awake: bool) {
        self.awake.store(awake, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn awake(&self) -> bool {
        self.awake.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn take_awake(&self) -> bool {
        self.awake.swap(false, Ordering::Relaxed)
    }
}

impl Wake for ReactorWaker {
    fn wake(self: Arc<Self>) {
        self.set_awake(true);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.set_awake(true);
    }
}
