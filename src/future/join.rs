use super::Execute;
use crate::Result;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A participant of a join, and the value it produced.
#[derive(Debug)]
enum MaybeDone<T> {
    Running(Execute<T>),
    Done(T),
    Taken,
}

impl<T> MaybeDone<T> {
    /// `Ready(Ok(()))` once the value is in, `Ready(Err(_))` on failure.
    fn poll(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        match self {
            Self::Running(future) => match Pin::new(future).poll(cx) {
                Poll::Ready(Ok(value)) => {
                    *self = Self::Done(value);
                    Poll::Ready(Ok(()))
                }
                Poll::Ready(Err(err)) => {
                    *self = Self::Taken;
                    Poll::Ready(Err(err))
                }
                Poll::Pending => Poll::Pending,
            },
            Self::Done(_) => Poll::Ready(Ok(())),
            Self::Taken => panic!("future polled after completing"),
        }
    }

    fn take(&mut self) -> T {
        match std::mem::replace(self, Self::Taken) {
            Self::Done(value) => value,
            _ => panic!("join participant taken before it completed"),
        }
    }
}

/// Waits for two computations, failing on the first failure.
#[must_use = "futures do nothing unless polled or .awaited"]
#[derive(Debug)]
pub(crate) struct Join<A, B> {
    left: MaybeDone<A>,
    right: MaybeDone<B>,
}

// Values are only ever moved out, never pinned.
impl<A, B> Unpin for Join<A, B> {}

impl<A, B> Join<A, B> {
    pub(crate) fn new(left: Execute<A>, right: Execute<B>) -> Self {
        Self {
            left: MaybeDone::Running(left),
            right: MaybeDone::Running(right),
        }
    }
}

impl<A, B> Future for Join<A, B> {
    type Output = Result<(A, B)>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        // Poll both sides every round, even once one of them has failed.
        match (this.left.poll(cx), this.right.poll(cx)) {
            (Poll::Ready(Err(err)), _) | (_, Poll::Ready(Err(err))) => Poll::Ready(Err(err)),
            (Poll::Ready(Ok(())), Poll::Ready(Ok(()))) => {
                Poll::Ready(Ok((this.left.take(), this.right.take())))
            }
            _ => Poll::Pending,
        }
    }
}

/// Waits for every computation, keeping input order, failing on the first
/// failure.
#[must_use = "futures do nothing unless polled or .awaited"]
#[derive(Debug)]
pub(crate) struct JoinAll<T> {
    items: Vec<MaybeDone<T>>,
}

impl<T> Unpin for JoinAll<T> {}

impl<T> JoinAll<T> {
    pub(crate) fn new<I>(futures: I) -> Self
    where
        I: IntoIterator<Item = Execute<T>>,
    {
        Self {
            items: futures.into_iter().map(MaybeDone::Running).collect(),
        }
    }
}

impl<T> Future for JoinAll<T> {
    type Output = Result<Vec<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut all_done = true;
        let mut failure = None;
        for item in this.items.iter_mut() {
            match item.poll(cx) {
                Poll::Ready(Ok(())) => {}
                Poll::Ready(Err(err)) => {
                    failure.get_or_insert(err);
                }
                Poll::Pending => all_done = false,
            }
        }
        if let Some(err) = failure {
            Poll::Ready(Err(err))
        } else if all_done {
            Poll::Ready(Ok(this.items.iter_mut().map(MaybeDone::take).collect()))
        } else {
            Poll::Pending
        }
    }
}
