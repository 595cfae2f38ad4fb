//! Async event loop support.
//!
//! The way to use this is to call [`block_on()`] (or [`Builder::block_on`]) to
//! run a root future. While it runs, [`Reactor::current`] hands out the
//! reactor so code can register timers, spawn detached tasks, and hold
//! keep-alive tokens. The loop returns once the root future has finished and
//! no keep-alive token is outstanding.

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod block_on;
mod builder;
mod reactor;

pub use block_on::block_on;
pub use builder::Builder;
pub use reactor::{KeepAlive, Reactor, TimerKey};

use std::cell::RefCell;

// There are no threads in this runtime, so the reactor of the currently
// running `block_on` lives in a thread-local.
std::thread_local! {
    pub(crate) static REACTOR: RefCell<Option<Reactor>> = const { RefCell::new(None) };
}
