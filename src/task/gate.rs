use crate::future::Cleanup;
use crate::runtime::KeepAlive;
use crate::{Error, Result};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Where a task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// The computation has not settled and the task was not aborted.
    Running,
    /// The computation produced a value.
    Completed,
    /// The computation failed.
    Failed,
    /// The task was aborted before the computation settled.
    Aborted,
}

/// A once-settable cell deciding a task's outcome.
///
/// The computation and an abort request both try to settle the gate; the
/// first one wins. Settling runs the cleanup, releases the keep-alive token,
/// and wakes both the task handle and the computation's runner. Every later
/// attempt is discarded.
pub(crate) struct Gate<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

struct Inner<T> {
    state: TaskState,
    result: Option<Result<T>>,
    cleanup: Cleanup,
    keep_alive: Option<KeepAlive>,
    joiner: Option<Waker>,
    runner: Option<Waker>,
}

impl<T> Gate<T> {
    pub(crate) fn new(cleanup: Cleanup, keep_alive: KeepAlive) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: TaskState::Running,
                result: None,
                cleanup,
                keep_alive: Some(keep_alive),
                joiner: None,
                runner: None,
            })),
        }
    }

    /// Record the computation's `result` as the outcome. Returns `false` if
    /// the gate was already settled, in which case `result` is dropped.
    pub(crate) fn settle(&self, result: Result<T>) -> bool {
        let state = match &result {
            Ok(_) => TaskState::Completed,
            Err(_) => TaskState::Failed,
        };
        self.resolve(state, result)
    }

    /// Settle the gate as aborted. Returns `false` if it was already settled.
    pub(crate) fn abort(&self) -> bool {
        self.resolve(TaskState::Aborted, Err(Error::Aborted))
    }

    fn resolve(&self, state: TaskState, result: Result<T>) -> bool {
        let (cleanup, keep_alive, joiner, runner) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != TaskState::Running {
                return false;
            }
            inner.state = state;
            inner.result = Some(result);
            (
                inner.cleanup.clone(),
                inner.keep_alive.take(),
                inner.joiner.take(),
                inner.runner.take(),
            )
        };
        cleanup.run();
        drop(keep_alive);
        for waker in joiner.into_iter().chain(runner) {
            waker.wake();
        }
        true
    }

    pub(crate) fn state(&self) -> TaskState {
        self.inner.borrow().state
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.state() != TaskState::Running
    }

    /// Wake the computation's runner once the gate settles.
    pub(crate) fn register_runner(&self, waker: &Waker) {
        self.inner.borrow_mut().runner = Some(waker.clone());
    }

    /// Take the outcome once the gate has settled.
    ///
    /// # Panics
    /// Panics if the outcome was already taken.
    pub(crate) fn poll_result(&self, cx: &mut Context<'_>) -> Poll<Result<T>> {
        let mut inner = self.inner.borrow_mut();
        if inner.state == TaskState::Running {
            inner.joiner = Some(cx.waker().clone());
            return Poll::Pending;
        }
        match inner.result.take() {
            Some(result) => Poll::Ready(result),
            None => panic!("task polled after completing"),
        }
    }
}

impl<T> Clone for Gate<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Gate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::block_on;
    use crate::runtime::Reactor;
    use std::cell::Cell;

    #[test]
    fn first_settlement_wins() {
        block_on(async {
            let count = Rc::new(Cell::new(0));
            let counter = count.clone();
            let reactor = Reactor::current();
            let gate = Gate::new(
                Cleanup::new(move || counter.set(counter.get() + 1)),
                reactor.keep_alive(),
            );
            assert_eq!(reactor.outstanding(), 1);

            assert!(gate.abort());
            assert!(!gate.settle(Ok(5)));
            assert!(!gate.abort());
            assert_eq!(gate.state(), TaskState::Aborted);
            assert_eq!(count.get(), 1);
            assert_eq!(reactor.outstanding(), 0);

            let result = std::future::poll_fn(|cx| gate.poll_result(cx)).await;
            assert!(result.unwrap_err().is_aborted());
        });
    }

    #[test]
    fn failures_are_not_aborts() {
        block_on(async {
            let gate = Gate::<()>::new(Cleanup::none(), Reactor::current().keep_alive());
            gate.settle(Err(Error::msg("broken")));
            assert_eq!(gate.state(), TaskState::Failed);
        });
    }

    #[test]
    fn only_an_abort_marks_the_gate_aborted() {
        block_on(async {
            let gate = Gate::<()>::new(Cleanup::none(), Reactor::current().keep_alive());
            gate.settle(Err(Error::Aborted));
            assert_eq!(gate.state(), TaskState::Failed);
        });
    }
}
