use super::Stream;
use crate::future::{Cleanup, Deferred, Execute};
use crate::Result;

use futures_core::ready;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A [`futures_core::Stream`] over the values of a lazy [`Stream`].
///
/// This `struct` is created by the [`ticks`] method on [`Stream`]. See its
/// documentation for more.
///
/// Each step is executed only when the previous value has been taken. A
/// failed step ends the stream after yielding its error. Dropping the adapter
/// runs the cleanup of the pending step, so an abandoned interval stops
/// firing.
///
/// [`ticks`]: Stream::ticks
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct Ticks<T> {
    next: Option<Deferred<Stream<T>>>,
    running: Option<Execute<Stream<T>>>,
    cleanup: Cleanup,
    done: bool,
}

impl<T: 'static> Ticks<T> {
    pub(super) fn new(stream: Stream<T>) -> Self {
        let next = stream.next();
        Self {
            cleanup: next.cleanup_handle(),
            next: Some(next),
            running: None,
            done: false,
        }
    }

    /// Stop the stream: release the pending step and yield nothing more.
    pub fn stop(&mut self) {
        self.cleanup.run();
        self.done = true;
        self.next = None;
        self.running = None;
    }

    fn set_next(&mut self, next: Deferred<Stream<T>>) {
        self.cleanup = next.cleanup_handle();
        self.next = Some(next);
    }
}

impl<T: 'static> futures_core::Stream for Ticks<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.done {
                return Poll::Ready(None);
            }
            let Some(running) = this.running.as_mut() else {
                match this.next.take() {
                    Some(next) => this.running = Some(next.execute()),
                    None => this.done = true,
                }
                continue;
            };
            let step = ready!(Pin::new(running).poll(cx));
            this.running = None;
            match step {
                Ok(Stream::Continue(value, next)) => {
                    this.set_next(next);
                    return Poll::Ready(Some(Ok(value)));
                }
                Ok(Stream::First(next)) => this.set_next(next),
                Err(err) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
            }
        }
    }
}

impl<T> Drop for Ticks<T> {
    fn drop(&mut self) {
        self.cleanup.run();
    }
}
