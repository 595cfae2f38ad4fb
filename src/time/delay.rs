use crate::future::{Deferred, Execute};
use crate::Result;

use futures_core::ready;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;

pin_project! {
    /// Starts a computation once a deadline has passed.
    ///
    /// This `struct` is created by the [`delay`] function. See its
    /// documentation for more.
    ///
    /// [`delay`]: crate::time::delay
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub(crate) struct Delay<T, D> {
        #[pin]
        deadline: D,
        pending: Option<Deferred<T>>,
        running: Option<Execute<T>>,
        state: State,
    }
}

/// The internal state
#[derive(Debug)]
enum State {
    Started,
    PollFuture,
    Completed,
}

impl<T, D> Delay<T, D> {
    pub(crate) fn new(deferred: Deferred<T>, deadline: D) -> Self {
        Self {
            deadline,
            pending: Some(deferred),
            running: None,
            state: State::Started,
        }
    }
}

impl<T: 'static, D: Future> Future for Delay<T, D> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        loop {
            match this.state {
                State::Started => {
                    ready!(this.deadline.as_mut().poll(cx));
                    *this.running = this.pending.take().map(Deferred::execute);
                    *this.state = State::PollFuture;
                }
                State::PollFuture => {
                    let running = this
                        .running
                        .as_mut()
                        .expect("delayed computation starts before it is polled");
                    let value = ready!(Pin::new(running).poll(cx));
                    *this.state = State::Completed;
                    return Poll::Ready(value);
                }
                State::Completed => panic!("future polled after completing"),
            }
        }
    }
}
