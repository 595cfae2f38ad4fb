//! Detached tasks.
//!
//! [`spawn_task`] starts a [`Deferred`] computation on the running event loop
//! and returns a [`Task`] handle. The task holds a keep-alive token, so
//! `block_on` does not return before it settles, and its cleanup runs exactly
//! once when it does. Dropping the handle does not stop the task.
//!
//! [`spawn_abortable_task`] additionally allows the task to be aborted.
//! Aborting is cooperative: a computation that is busy with synchronous work
//! is not interrupted. The abort settles the task right away, runs its
//! cleanup (cancelling pending timers, for example), and the computation is
//! dropped at its next suspension point. Whatever it would have produced is
//! discarded.
//!
//! ```
//! use stardos::task::{spawn_abortable_task, TaskState};
//! use stardos::time::{timeout, Duration};
//!
//! stardos::runtime::block_on(async {
//!     let task = spawn_abortable_task(timeout(Duration::from_secs(60))).unwrap();
//!     task.abort();
//!     assert_eq!(task.state(), TaskState::Aborted);
//!     assert!(task.await.unwrap_err().is_aborted());
//! });
//! ```

mod gate;

pub use gate::TaskState;

use crate::future::{Deferred, Execute};
use crate::runtime::Reactor;
use crate::{Error, Result};
use gate::Gate;

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use tracing::{debug, trace};

/// A process-unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A handle to a detached computation.
///
/// Awaiting the handle yields the computation's outcome. Two handles are
/// equal only if they refer to the same spawned task.
pub struct Task<T> {
    id: TaskId,
    gate: Gate<T>,
}

impl<T> Task<T> {
    /// This task's identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Where the task is in its lifecycle.
    pub fn state(&self) -> TaskState {
        self.gate.state()
    }

    /// Whether the task has settled.
    pub fn is_finished(&self) -> bool {
        self.gate.is_settled()
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.gate.poll_result(cx)
    }
}

impl<T> PartialEq for Task<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Task<T> {}

impl<T> Hash for Task<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// A [`Task`] that can be aborted.
pub struct AbortableTask<T> {
    task: Task<T>,
}

impl<T> PartialEq for AbortableTask<T> {
    fn eq(&self, other: &Self) -> bool {
        self.task == other.task
    }
}

impl<T> Eq for AbortableTask<T> {}

impl<T> Hash for AbortableTask<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.task.hash(state);
    }
}

impl<T> fmt::Debug for AbortableTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortableTask")
            .field("id", &self.task.id)
            .field("state", &self.state())
            .finish()
    }
}

impl<T> AbortableTask<T> {
    /// This task's identifier.
    pub fn id(&self) -> TaskId {
        self.task.id
    }

    /// Where the task is in its lifecycle.
    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    /// Whether the task has settled, by completing or by being aborted.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Abort the task. Does nothing if it has already settled.
    pub fn abort(&self) {
        abort_gate(self.task.id, &self.task.gate);
    }

    /// A handle that can abort the task from elsewhere, for instance while
    /// the task itself is being awaited.
    pub fn abort_handle(&self) -> AbortHandle<T> {
        AbortHandle {
            id: self.task.id,
            gate: self.task.gate.clone(),
        }
    }
}

impl<T> Future for AbortableTask<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().task).poll(cx)
    }
}

/// Aborts an [`AbortableTask`] without owning it.
#[derive(Debug)]
pub struct AbortHandle<T> {
    id: TaskId,
    gate: Gate<T>,
}

impl<T> AbortHandle<T> {
    /// Abort the task. Does nothing if it has already settled.
    pub fn abort(&self) {
        abort_gate(self.id, &self.gate);
    }

    /// The identifier of the task this handle aborts.
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl<T> Clone for AbortHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            gate: self.gate.clone(),
        }
    }
}

fn abort_gate<T>(id: TaskId, gate: &Gate<T>) {
    if gate.abort() {
        debug!(task = %id, "task aborted");
    } else {
        trace!(task = %id, "abort ignored, task already settled");
    }
}

/// Drives a task's computation and reports its outcome to the gate.
struct Runner<T> {
    id: TaskId,
    running: Execute<T>,
    gate: Gate<T>,
}

impl<T> Future for Runner<T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.gate.is_settled() {
            trace!(task = %this.id, "dropping computation of aborted task");
            return Poll::Ready(());
        }
        match Pin::new(&mut this.running).poll(cx) {
            Poll::Ready(result) => {
                if let Err(err) = &result {
                    debug!(task = %this.id, error = %err, "task failed");
                }
                if this.gate.settle(result) {
                    debug!(task = %this.id, "task settled");
                } else {
                    trace!(task = %this.id, "discarding outcome of aborted task");
                }
                Poll::Ready(())
            }
            Poll::Pending => {
                this.gate.register_runner(cx.waker());
                Poll::Pending
            }
        }
    }
}

fn spawn_on<T: 'static>(reactor: &Reactor, deferred: Deferred<T>) -> Task<T> {
    let id = TaskId::next();
    let gate = Gate::new(deferred.cleanup_handle(), reactor.keep_alive());
    debug!(task = %id, "spawning task");
    let running = deferred.execute();
    reactor.spawn(Runner {
        id,
        running,
        gate: gate.clone(),
    });
    Task { id, gate }
}

/// Run `deferred` as a detached task on the current event loop.
///
/// Execution starts immediately. The event loop stays alive until the task
/// settles, successfully or not; its cleanup then runs exactly once.
///
/// # Panics
/// This will panic if called outside of `stardos::runtime::block_on`.
pub fn spawn_task<T: 'static>(deferred: Deferred<T>) -> Task<T> {
    spawn_on(&Reactor::current(), deferred)
}

/// Like [`spawn_task`], but the task can be aborted.
///
/// Fails with [`Error::Unsupported`] when the event loop was built without a
/// cancellation primitive; nothing is spawned in that case.
///
/// # Panics
/// This will panic if called outside of `stardos::runtime::block_on`.
pub fn spawn_abortable_task<T: 'static>(deferred: Deferred<T>) -> Result<AbortableTask<T>> {
    let reactor = Reactor::current();
    if !reactor.supports_cancellation() {
        debug!("refusing abortable task: no cancellation primitive");
        return Err(Error::Unsupported);
    }
    Ok(AbortableTask {
        task: spawn_on(&reactor, deferred),
    })
}

/// Abort `task`. Aborting a task that has already settled does nothing.
pub fn abort_task<T>(task: &AbortableTask<T>) {
    task.abort();
}
