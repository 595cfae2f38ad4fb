use super::join::{Join, JoinAll};
use super::race::Race;
use super::Cleanup;
use crate::Result;

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A lazy description of a computation, plus the action that releases
/// whatever resources the computation holds.
///
/// Building a `Deferred` does no work. Work starts when [`Deferred::execute`]
/// is called, which consumes the description and returns the running
/// computation as an [`Execute`] future. `Deferred` also implements
/// [`IntoFuture`], so it can be `.await`ed directly.
///
/// # Examples
///
/// ```
/// use stardos::future::Deferred;
///
/// stardos::runtime::block_on(async {
///     let answer = Deferred::new(|| 40)
///         .then(|n| Deferred::ready(n + 2))
///         .await
///         .unwrap();
///     assert_eq!(answer, 42);
/// });
/// ```
#[must_use = "deferred computations do nothing unless executed"]
pub struct Deferred<T> {
    execute: Box<dyn FnOnce() -> Execute<T>>,
    cleanup: Cleanup,
}

impl<T: 'static> Deferred<T> {
    /// A computation that evaluates `compute` when executed. It holds no
    /// resources, so it has no cleanup.
    pub fn new<F>(compute: F) -> Self
    where
        F: FnOnce() -> T + 'static,
    {
        Self::try_new(move || Ok(compute()))
    }

    /// Like [`Deferred::new`], for computations that can fail.
    pub fn try_new<F>(compute: F) -> Self
    where
        F: FnOnce() -> Result<T> + 'static,
    {
        Self::from_parts(
            move || Execute::new(std::future::ready(compute())),
            Cleanup::none(),
        )
    }

    /// An already determined value.
    pub fn ready(value: T) -> Self {
        Self::new(move || value)
    }

    /// Lift an async computation. `factory` is only called on execution.
    pub fn from_future<F, Fut>(factory: F) -> Self
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = Result<T>> + 'static,
    {
        Self::from_parts(move || Execute::new(factory()), Cleanup::none())
    }

    pub(crate) fn from_parts<F>(execute: F, cleanup: Cleanup) -> Self
    where
        F: FnOnce() -> Execute<T> + 'static,
    {
        Self {
            execute: Box::new(execute),
            cleanup,
        }
    }

    /// Attach a cleanup action. An existing cleanup is kept and runs first.
    pub fn with_cleanup<F>(self, action: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            execute: self.execute,
            cleanup: Cleanup::all([self.cleanup, Cleanup::new(action)]),
        }
    }

    /// Start the computation.
    pub fn execute(self) -> Execute<T> {
        (self.execute)()
    }

    /// Release the computation's resources. Only the first call, across
    /// this value and every [`Cleanup`] handle taken from it, has an effect.
    pub fn cleanup(&self) {
        self.cleanup.run();
    }

    /// A handle to this computation's cleanup that outlives [`execute`].
    ///
    /// [`execute`]: Deferred::execute
    pub fn cleanup_handle(&self) -> Cleanup {
        self.cleanup.clone()
    }

    /// Sequential composition: run `self`, then the computation
    /// `continuation` builds from its value.
    ///
    /// Cleanup releases `self` until the continuation has been built, and
    /// the continuation afterwards.
    pub fn then<U, F>(self, continuation: F) -> Deferred<U>
    where
        U: 'static,
        F: FnOnce(T) -> Deferred<U> + 'static,
    {
        let Self { execute, cleanup } = self;
        let composed = Cleanup::delegate(cleanup);
        let current = composed.clone();
        Deferred::from_parts(
            move || {
                let running = execute();
                Execute::new(async move {
                    let value = running.await?;
                    let next = continuation(value);
                    current.rebind(next.cleanup_handle());
                    next.execute().await
                })
            },
            composed,
        )
    }

    /// Transform the value once the computation succeeds.
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        let Self { execute, cleanup } = self;
        Deferred::from_parts(
            move || {
                let running = execute();
                Execute::new(async move { running.await.map(f) })
            },
            cleanup,
        )
    }

    /// Run `self` and `other` concurrently. Both start before either
    /// settles; the first failure fails the pair.
    pub fn join<U: 'static>(self, other: Deferred<U>) -> Deferred<(T, U)> {
        let cleanup = Cleanup::all([self.cleanup_handle(), other.cleanup_handle()]);
        Deferred::from_parts(
            move || {
                let left = self.execute();
                let right = other.execute();
                Execute::new(Join::new(left, right))
            },
            cleanup,
        )
    }

    /// Race `computations`; the first to settle, successfully or not, wins.
    ///
    /// Cleanup releases every participant, including the losers. With no
    /// participants the race never settles.
    pub fn first<I>(computations: I) -> Self
    where
        I: IntoIterator<Item = Deferred<T>>,
    {
        let computations: Vec<_> = computations.into_iter().collect();
        let cleanup = Cleanup::all(computations.iter().map(Deferred::cleanup_handle));
        Self::from_parts(
            move || Execute::new(Race::new(computations.into_iter().map(Deferred::execute))),
            cleanup,
        )
    }

    /// Run every computation concurrently and collect their values in input
    /// order. The first failure fails the whole collection.
    pub fn all<I>(computations: I) -> Deferred<Vec<T>>
    where
        I: IntoIterator<Item = Deferred<T>>,
    {
        let computations: Vec<_> = computations.into_iter().collect();
        let cleanup = Cleanup::all(computations.iter().map(Deferred::cleanup_handle));
        Deferred::from_parts(
            move || Execute::new(JoinAll::new(computations.into_iter().map(Deferred::execute))),
            cleanup,
        )
    }
}

impl<T: 'static> Deferred<Deferred<T>> {
    /// Run the outer computation, then the computation it produced.
    ///
    /// Cleanup releases the outer computation; the inner one only exists once
    /// the outer has settled.
    pub fn flatten(self) -> Deferred<T> {
        let Self { execute, cleanup } = self;
        Deferred::from_parts(
            move || {
                let outer = execute();
                Execute::new(async move { outer.await?.execute().await })
            },
            cleanup,
        )
    }
}

impl<T: 'static> IntoFuture for Deferred<T> {
    type Output = Result<T>;
    type IntoFuture = Execute<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.execute()
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("cleanup", &self.cleanup)
            .finish_non_exhaustive()
    }
}

/// A running [`Deferred`] computation.
///
/// Created by [`Deferred::execute`]. Dropping it stops the computation at its
/// current suspension point, but does not run the cleanup.
#[must_use = "futures do nothing unless polled or .awaited"]
pub struct Execute<T> {
    inner: Pin<Box<dyn Future<Output = Result<T>>>>,
}

impl<T> Execute<T> {
    pub(crate) fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + 'static,
    {
        Self {
            inner: Box::pin(future),
        }
    }
}

impl<T> Future for Execute<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for Execute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execute").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::block_on;
    use crate::Error;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn tracked(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Deferred<&'static str> {
        let log = log.clone();
        Deferred::new(move || {
            log.borrow_mut().push(name);
            name
        })
    }

    fn counted_cleanup<T: 'static>(deferred: Deferred<T>, count: &Rc<Cell<u32>>) -> Deferred<T> {
        let count = count.clone();
        deferred.with_cleanup(move || count.set(count.get() + 1))
    }

    #[test]
    fn construction_does_no_work() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = tracked(&log, "a");
        let b = tracked(&log, "b");
        let composed = a
            .join(b)
            .then({
                let log = log.clone();
                move |_| tracked(&log, "c")
            })
            .map(|c| c.len());
        assert!(log.borrow().is_empty());

        assert_eq!(block_on(composed.into_future()).unwrap(), 1);
        assert_eq!(*log.borrow(), ["a", "b", "c"]);
    }

    #[test]
    fn then_rebinds_cleanup_to_continuation() {
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let inner = second.clone();
        let composed = counted_cleanup(Deferred::ready(1), &first)
            .then(move |n| counted_cleanup(Deferred::ready(n + 1), &inner));
        let cleanup = composed.cleanup_handle();

        assert_eq!(block_on(composed.into_future()).unwrap(), 2);
        cleanup.run();
        cleanup.run();
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn then_cleanup_before_execution_releases_first() {
        let first = Rc::new(Cell::new(0));
        let composed = counted_cleanup(Deferred::ready(1), &first).then(Deferred::ready);
        composed.cleanup();
        assert_eq!(first.get(), 1);
    }

    #[test]
    fn failures_propagate_through_then() {
        let continued = Rc::new(Cell::new(false));
        let flag = continued.clone();
        let composed = Deferred::<u32>::try_new(|| Err(Error::msg("nope"))).then(move |n| {
            flag.set(true);
            Deferred::ready(n)
        });
        let err = block_on(composed.into_future()).unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert!(!continued.get());
    }

    #[test]
    fn join_cleanup_releases_both() {
        let count = Rc::new(Cell::new(0));
        let failing = Deferred::<u32>::try_new(|| Err(Error::msg("left failed")));
        let pair =
            counted_cleanup(failing, &count).join(counted_cleanup(Deferred::ready(2), &count));
        let cleanup = pair.cleanup_handle();

        assert!(block_on(pair.into_future()).is_err());
        cleanup.run();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn all_keeps_input_order() {
        let values = Deferred::all([Deferred::ready(1), Deferred::ready(2), Deferred::ready(3)]);
        assert_eq!(block_on(values.into_future()).unwrap(), vec![1, 2, 3]);

        let empty = Deferred::<u8>::all([]);
        assert!(block_on(empty.into_future()).unwrap().is_empty());
    }

    #[test]
    fn flatten_runs_inner_with_outer_cleanup() {
        let outer_count = Rc::new(Cell::new(0));
        let inner_count = Rc::new(Cell::new(0));
        let inner = counted_cleanup(Deferred::ready("inner"), &inner_count);
        let nested = counted_cleanup(Deferred::ready(inner), &outer_count).flatten();
        let cleanup = nested.cleanup_handle();

        assert_eq!(block_on(nested.into_future()).unwrap(), "inner");
        cleanup.run();
        assert_eq!(outer_count.get(), 1);
        assert_eq!(inner_count.get(), 0);
    }
}
