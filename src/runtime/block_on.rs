use super::builder::Config;
use super::reactor::ReactorWaker;
use super::{Reactor, REACTOR};

use core::future::Future;
use core::pin::pin;
use core::task::Waker;
use core::task::{Context, Poll};
use std::sync::Arc;
use tracing::{debug, warn};

/// Start the event loop with the default [`Builder`](super::Builder)
/// settings.
///
/// Returns once `fut` has completed and every detached task holding a
/// keep-alive token has settled.
pub fn block_on<Fut>(fut: Fut) -> Fut::Output
where
    Fut: Future,
{
    run(Config::default(), fut)
}

pub(crate) fn run<Fut>(config: Config, fut: Fut) -> Fut::Output
where
    Fut: Future,
{
    // Construct the reactor
    let reactor = Reactor::new(config);
    // Store a copy as a singleton to be used elsewhere:
    let prev = REACTOR.replace(Some(reactor.clone()));
    if prev.is_some() {
        panic!("cannot stardos::runtime::block_on inside an existing block_on!")
    }
    debug!(?config, "event loop started");

    // Pin the future so it can be polled
    let mut fut = pin!(fut);

    // Create a new context to be passed to the future.
    let waker_impl = Arc::new(ReactorWaker::new());
    let waker = Waker::from(Arc::clone(&waker_impl));
    let mut cx = Context::from_waker(&waker);

    let mut output = None;
    waker_impl.set_awake(true);
    loop {
        if output.is_none() && waker_impl.take_awake() {
            if let Poll::Ready(res) = fut.as_mut().poll(&mut cx) {
                output = Some(res);
            }
        }
        reactor.run_ready_tasks();

        if output.is_some() && (reactor.outstanding() == 0 || !reactor.waits_for_tasks()) {
            break;
        }
        if waker_impl.awake() || reactor.has_ready_tasks() {
            continue;
        }

        // Nothing is runnable: either a timer wakes someone, or nothing ever
        // will.
        match reactor.next_deadline() {
            Some(deadline) => reactor.block_until(deadline),
            None if output.is_some() => {
                warn!(
                    outstanding = reactor.outstanding(),
                    tasks = reactor.pending_tasks(),
                    "detached tasks can never settle, leaving the event loop"
                );
                break;
            }
            None => {
                REACTOR.replace(None);
                reactor.shutdown();
                panic!("block_on future can never complete: no timers pending and nothing to wake it")
            }
        }
    }

    // Clear the singleton
    REACTOR.replace(None);
    reactor.shutdown();
    debug!("event loop finished");

    match output {
        Some(res) => res,
        None => unreachable!("the loop only exits once the root future is done"),
    }
}
