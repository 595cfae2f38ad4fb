//! Async time interfaces.
//!
//! Every function here returns a lazy computation: no timer is armed until
//! the computation is executed, and running its cleanup cancels the timer so
//! an abandoned computation never fires.

mod delay;
mod timer;

pub use std::time::{Duration, Instant};
pub use timer::Timer;

use crate::future::{Cleanup, Deferred, Execute};
use crate::stream::Stream;
use delay::Delay;
use timer::TimerCell;

/// Resolves once `duration` has elapsed.
///
/// Running the cleanup before that cancels the pending timer.
///
/// # Examples
///
/// ```
/// use stardos::time::{timeout, Duration, Instant};
///
/// stardos::runtime::block_on(async {
///     let start = Instant::now();
///     timeout(Duration::from_millis(20)).await.unwrap();
///     assert!(start.elapsed() >= Duration::from_millis(20));
/// });
/// ```
pub fn timeout(duration: Duration) -> Deferred<()> {
    let cell = TimerCell::default();
    let armed = cell.clone();
    Deferred::from_future(move || {
        armed.arm_with(|| Timer::after(duration));
        let tick = armed.tick();
        async move {
            tick.await;
            Ok(())
        }
    })
    .with_cleanup(move || cell.cancel())
}

/// Starts `deferred` once `duration` has elapsed.
///
/// The cleanup cancels the timer and releases `deferred`.
pub fn delay<T: 'static>(duration: Duration, deferred: Deferred<T>) -> Deferred<T> {
    let cell = TimerCell::default();
    let armed = cell.clone();
    let cleanup = Cleanup::all([Cleanup::new(move || cell.cancel()), deferred.cleanup_handle()]);
    Deferred::from_parts(
        move || {
            armed.arm_with(|| Timer::after(duration));
            Execute::new(Delay::new(deferred, armed.tick()))
        },
        cleanup,
    )
}

/// Blocks the current thread for `duration`.
///
/// Nothing else on the event loop makes progress meanwhile.
pub fn sleep_blocking(duration: Duration) {
    std::thread::sleep(duration);
}

/// A stream that ticks every `period`.
///
/// A single repeating timer is armed when the first tick executes. The
/// computation for each following tick is only built once the previous tick
/// has fired, and ticks that were missed while nobody waited collapse into
/// one. Running the cleanup of any tick stops the timer for good.
///
/// # Examples
///
/// ```
/// use stardos::time::{interval, Duration};
///
/// stardos::runtime::block_on(async {
///     let mut step = interval(Duration::from_millis(10));
///     for _ in 0..3 {
///         step = step.next().await.unwrap();
///     }
///     step.cleanup();
/// });
/// ```
pub fn interval(period: Duration) -> Stream<()> {
    Stream::First(tick(TimerCell::default(), period))
}

fn tick(cell: TimerCell, period: Duration) -> Deferred<Stream<()>> {
    let armed = cell.clone();
    Deferred::from_future(move || {
        armed.arm_with(|| Timer::repeating(period));
        let fired = armed.tick();
        async move {
            fired.await;
            Ok(Stream::Continue((), tick(armed, period)))
        }
    })
    .with_cleanup(move || cell.cancel())
}
