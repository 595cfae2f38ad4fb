use crate::runtime::{Reactor, TimerKey};

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

/// An owned timer registered with the running event loop.
///
/// Resolves every time the underlying timer fires; firings that happened
/// while nobody was waiting are collapsed into one. The timer is cancelled
/// when dropped, after which it never fires again.
#[derive(Debug)]
#[must_use = "timers are cancelled when dropped"]
pub struct Timer {
    reactor: Reactor,
    key: Option<TimerKey>,
    seen: u64,
}

impl Timer {
    /// A timer that fires once, `delay` from now. A delay past the range of
    /// [`Instant`](std::time::Instant) never fires.
    ///
    /// # Panics
    /// This will panic if called outside of `stardos::runtime::block_on`.
    pub fn after(delay: Duration) -> Self {
        let reactor = Reactor::current();
        let key = reactor.schedule_after(delay);
        Self::new(reactor, key)
    }

    /// A timer that fires every `period`.
    ///
    /// # Panics
    /// This will panic if called outside of `stardos::runtime::block_on`.
    pub fn repeating(period: Duration) -> Self {
        let reactor = Reactor::current();
        let key = reactor.schedule_repeating(period);
        Self::new(reactor, key)
    }

    fn new(reactor: Reactor, key: TimerKey) -> Self {
        Self {
            reactor,
            key: Some(key),
            seen: 0,
        }
    }

    /// Stop the timer. Waiting on a cancelled timer never completes.
    pub fn cancel(&mut self) {
        if let Some(key) = self.key.take() {
            self.reactor.cancel(key);
        }
    }

    /// Whether [`Timer::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.key.is_none()
    }

    /// Wait for the next firing.
    pub fn poll_tick(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let Some(key) = self.key else {
            return Poll::Pending;
        };
        match self.reactor.poll_timer(key, self.seen, cx.waker()) {
            Poll::Ready(fired) => {
                self.seen = fired;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Future for Timer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().poll_tick(cx)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A timer slot shared by a computation and its cleanup.
///
/// The timer is armed when the computation executes, not when it is built.
/// Once cancelled the slot stays cancelled, so a computation that is
/// executed after its cleanup ran never arms a timer.
#[derive(Debug, Clone, Default)]
pub(crate) struct TimerCell {
    slot: Rc<RefCell<Slot>>,
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Idle,
    Armed(Timer),
    Cancelled,
}

impl TimerCell {
    /// Arm the slot with `make()`, unless it is already armed or cancelled.
    pub(crate) fn arm_with<F>(&self, make: F)
    where
        F: FnOnce() -> Timer,
    {
        let mut slot = self.slot.borrow_mut();
        if matches!(*slot, Slot::Idle) {
            *slot = Slot::Armed(make());
        }
    }

    pub(crate) fn cancel(&self) {
        let previous = std::mem::replace(&mut *self.slot.borrow_mut(), Slot::Cancelled);
        drop(previous);
    }

    /// Wait for the next firing of the armed timer.
    pub(crate) fn tick(&self) -> Tick {
        Tick { cell: self.clone() }
    }
}

/// Resolves on the next firing of a [`TimerCell`]'s timer.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled or .awaited"]
pub(crate) struct Tick {
    cell: TimerCell,
}

impl Future for Tick {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut *self.cell.slot.borrow_mut() {
            Slot::Armed(timer) => timer.poll_tick(cx),
            Slot::Idle | Slot::Cancelled => Poll::Pending,
        }
    }
}
