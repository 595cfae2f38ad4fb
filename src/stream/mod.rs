//! Lazy sequences of asynchronously produced values.
//!
//! A [`Stream`] is one step of a possibly infinite sequence. Executing the
//! step's computation yields the next step, which carries a value and the
//! computation for the step after it. Nothing is produced ahead of time, so
//! an infinite stream holds at most one pending computation at once.
//!
//! To consume a stream with the `futures` ecosystem, turn it into a
//! [`futures_core::Stream`] with [`Stream::ticks`].

mod ticks;

pub use ticks::Ticks;

use crate::future::{Cleanup, Deferred};

/// One step of a lazy sequence.
///
/// A sequence is restarted by building a new `First`; it cannot be rewound
/// to an earlier step.
#[derive(Debug)]
#[must_use = "streams do nothing unless their next step is executed"]
pub enum Stream<T> {
    /// The start of the sequence: nothing produced yet.
    First(Deferred<Stream<T>>),
    /// A produced value, and the computation for the next step.
    Continue(T, Deferred<Stream<T>>),
}

impl<T: 'static> Stream<T> {
    /// The value produced by this step, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::First(_) => None,
            Self::Continue(value, _) => Some(value),
        }
    }

    /// The computation producing the next step.
    pub fn next(self) -> Deferred<Stream<T>> {
        match self {
            Self::First(next) | Self::Continue(_, next) => next,
        }
    }

    /// Split into this step's value and the computation for the next step.
    pub fn into_parts(self) -> (Option<T>, Deferred<Stream<T>>) {
        match self {
            Self::First(next) => (None, next),
            Self::Continue(value, next) => (Some(value), next),
        }
    }

    /// A handle to the cleanup of the next step's computation.
    pub fn cleanup_handle(&self) -> Cleanup {
        match self {
            Self::First(next) | Self::Continue(_, next) => next.cleanup_handle(),
        }
    }

    /// Abandon the sequence, releasing whatever the next step holds.
    pub fn cleanup(&self) {
        self.cleanup_handle().run();
    }

    /// Adapt the remaining steps into a [`futures_core::Stream`] of values.
    pub fn ticks(self) -> Ticks<T> {
        Ticks::new(self)
    }
}
