use super::Execute;
use crate::Result;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Resolves with whichever participant settles first, success or failure.
///
/// Participants are polled in input order, so when several are ready in the
/// same turn the earliest one wins.
#[must_use = "futures do nothing unless polled or .awaited"]
#[derive(Debug)]
pub(crate) struct Race<T> {
    participants: Vec<Execute<T>>,
    completed: bool,
}

impl<T> Race<T> {
    pub(crate) fn new<I>(participants: I) -> Self
    where
        I: IntoIterator<Item = Execute<T>>,
    {
        Self {
            participants: participants.into_iter().collect(),
            completed: false,
        }
    }
}

impl<T> Future for Race<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        assert!(!this.completed, "future polled after completing");
        for participant in this.participants.iter_mut() {
            if let Poll::Ready(outcome) = Pin::new(participant).poll(cx) {
                this.completed = true;
                return Poll::Ready(outcome);
            }
        }
        Poll::Pending
    }
}
