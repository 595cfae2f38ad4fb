#![warn(future_incompatible, unreachable_pub)]
#![deny(missing_debug_implementations)]
//#![warn(missing_docs)]

//! Lazy futures, detached tasks and timer streams on a single cooperative
//! event loop.
//!
//! This is a minimal runtime core. Application code describes work as
//! [`Deferred`] computations, composes them with the combinators in
//! [`future`], hands them to the event loop as [`task`]s, and drives
//! periodic work with the timers in [`time`].
//!
//! # Examples
//!
//! ```
//! use stardos::future::{join_futures, new_future};
//! use stardos::task::spawn_task;
//! use stardos::time::{timeout, Duration};
//!
//! #[stardos::main]
//! async fn main() {
//!     let pair = join_futures(new_future(|| 1), timeout(Duration::from_millis(10)).map(|()| 2));
//!     let task = spawn_task(pair);
//!     assert_eq!(task.await.unwrap(), (1, 2));
//! }
//! ```
//!
//! # Design Decisions
//!
//! A `Deferred` is lazy: building one, or combining several, does no work.
//! Work starts when the computation is executed, and each computation carries
//! a cleanup action that releases what it holds (a pending timer, say). The
//! cleanup runs at most once, whichever way the computation ends.
//!
//! There is exactly one thread of control. The event loop polls runnable
//! tasks, then sleeps until the next timer is due. Computations only yield at
//! `.await` points on timers or tasks; synchronous work is never preempted,
//! and aborting a task only takes effect at its next suspension point.
//!
//! Detached tasks keep the event loop alive. [`runtime::block_on`] returns
//! once its own future has completed and no task is outstanding, whether the
//! tasks succeeded or failed.

pub mod error;
pub mod future;
pub mod runtime;
pub mod stream;
pub mod task;
pub mod time;

pub use error::{Error, Result};
pub use future::Deferred;

pub use stardos_macro::attr_macro_main as main;
pub use stardos_macro::attr_macro_test as test;
