//! Lazy, composable computations.
//!
//! A [`Deferred`] describes work without starting it. Combinators build new
//! descriptions out of existing ones and never start any participant early:
//! nothing runs until the combined value is executed.
//!
//! # Cleanup
//!
//! Each `Deferred` carries a [`Cleanup`] action that releases the resources
//! its computation holds, such as a pending timer. A cleanup runs at most
//! once no matter how many times it is invoked, and whether the computation
//! completed, was abandoned, or never started. Combinators compose the
//! cleanups of their participants:
//!
//! - [`await_future`] releases the first computation until the continuation
//!   is built, and the continuation afterwards.
//! - [`join_futures`], [`first_future`] and [`all_futures`] release every
//!   participant, including the ones that lost a race or never finished.
//! - [`flatten_future`] releases the outer computation.
//!
//! ```
//! use stardos::future::{first_future, resolve_future};
//! use stardos::time::timeout;
//! use std::time::Duration;
//!
//! stardos::runtime::block_on(async {
//!     let slow = timeout(Duration::from_secs(60)).map(|()| "slow");
//!     let race = first_future([slow, resolve_future("fast")]);
//!     let cleanup = race.cleanup_handle();
//!     assert_eq!(race.await.unwrap(), "fast");
//!     cleanup.run(); // the 60 second timer is cancelled
//! });
//! ```

mod cleanup;
mod deferred;
mod join;
mod race;

pub use cleanup::Cleanup;
pub use deferred::{Deferred, Execute};

/// A computation that evaluates `compute` when executed.
pub fn new_future<T, F>(compute: F) -> Deferred<T>
where
    T: 'static,
    F: FnOnce() -> T + 'static,
{
    Deferred::new(compute)
}

/// An already determined value.
pub fn resolve_future<T: 'static>(value: T) -> Deferred<T> {
    Deferred::ready(value)
}

/// Run `deferred`, then the computation `continuation` builds from its value.
pub fn await_future<T, U, F>(deferred: Deferred<T>, continuation: F) -> Deferred<U>
where
    T: 'static,
    U: 'static,
    F: FnOnce(T) -> Deferred<U> + 'static,
{
    deferred.then(continuation)
}

/// Run `a` and `b` concurrently and resolve with both values.
pub fn join_futures<A: 'static, B: 'static>(a: Deferred<A>, b: Deferred<B>) -> Deferred<(A, B)> {
    a.join(b)
}

/// Resolve with whichever computation settles first.
pub fn first_future<T, I>(computations: I) -> Deferred<T>
where
    T: 'static,
    I: IntoIterator<Item = Deferred<T>>,
{
    Deferred::first(computations)
}

/// Run every computation concurrently; resolve with their values in input
/// order.
pub fn all_futures<T, I>(computations: I) -> Deferred<Vec<T>>
where
    T: 'static,
    I: IntoIterator<Item = Deferred<T>>,
{
    Deferred::all(computations)
}

/// Run a computation that produces a computation, then run that.
pub fn flatten_future<T: 'static>(deferred: Deferred<Deferred<T>>) -> Deferred<T> {
    deferred.flatten()
}
