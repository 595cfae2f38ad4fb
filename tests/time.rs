use std::cell::Cell;
use std::future::poll_fn;
use std::rc::Rc;
use std::task::Poll;

use futures_lite::StreamExt;
use stardos::task::{spawn_abortable_task, TaskState};
use stardos::time::{delay, interval, timeout, Duration, Instant, Timer};
use stardos::{Deferred, Result};

#[stardos::test]
async fn just_sleep() -> Result<()> {
    timeout(Duration::from_secs(0)).await?;
    timeout(Duration::from_millis(1)).await?;
    timeout(Duration::from_millis(10)).await?;
    Ok(())
}

#[stardos::test]
async fn interval_ticks_at_its_period() -> Result<()> {
    let start = Instant::now();
    let mut ticks = interval(Duration::from_millis(100)).ticks();
    let mut count = 0;
    while count < 3 {
        ticks.next().await.transpose()?;
        count += 1;
    }
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed <= Duration::from_millis(350), "took {elapsed:?}");
    Ok(())
}

#[stardos::test]
async fn abandoned_interval_stops_ticking() -> Result<()> {
    let step = interval(Duration::from_millis(10)).next().await?;
    assert_eq!(step.value(), Some(&()));
    step.cleanup();

    let ticked = Rc::new(Cell::new(0));
    let counter = ticked.clone();
    let task = spawn_abortable_task(step.next().map(move |_| counter.set(counter.get() + 1)))?;
    timeout(Duration::from_millis(50)).await?;
    assert_eq!(ticked.get(), 0);
    assert_eq!(task.state(), TaskState::Running);
    task.abort();
    Ok(())
}

#[stardos::test]
async fn dropping_ticks_stops_the_timer() -> Result<()> {
    let mut ticks = interval(Duration::from_millis(5)).ticks();
    ticks.next().await.transpose()?;
    ticks.stop();
    assert!(ticks.next().await.is_none());
    Ok(())
}

#[stardos::test]
async fn abandoned_timeout_never_fires() -> Result<()> {
    let fired = Rc::new(Cell::new(false));
    let flag = fired.clone();
    let pending = timeout(Duration::from_millis(50)).map(move |()| flag.set(true));
    let cleanup = pending.cleanup_handle();
    let task = spawn_abortable_task(pending)?;

    timeout(Duration::from_millis(10)).await?;
    cleanup.run();
    timeout(Duration::from_millis(80)).await?;
    assert!(!fired.get());
    assert_eq!(task.state(), TaskState::Running);
    task.abort();
    Ok(())
}

#[stardos::test]
async fn delay_holds_back_its_computation() -> Result<()> {
    let started = Rc::new(Cell::new(false));
    let flag = started.clone();
    let delayed = delay(
        Duration::from_millis(20),
        Deferred::new(move || flag.set(true)),
    );
    let task = spawn_abortable_task(delayed)?;
    assert!(!started.get());
    task.await?;
    assert!(started.get());
    Ok(())
}

#[stardos::test]
async fn repeating_timer_coalesces_missed_ticks() -> Result<()> {
    let mut timer = Timer::repeating(Duration::from_millis(5));
    stardos::time::sleep_blocking(Duration::from_millis(30));
    poll_fn(|cx| timer.poll_tick(cx)).await;
    let caught_up = poll_fn(|cx| Poll::Ready(timer.poll_tick(cx).is_pending())).await;
    assert!(caught_up);
    timer.cancel();
    assert!(timer.is_cancelled());
    Ok(())
}

#[stardos::test]
async fn unreachable_deadlines_never_fire() -> Result<()> {
    let forever = spawn_abortable_task(timeout(Duration::MAX))?;
    let ticks = spawn_abortable_task(interval(Duration::from_secs(u64::MAX)).next())?;
    timeout(Duration::from_millis(10)).await?;
    assert_eq!(forever.state(), TaskState::Running);
    assert_eq!(ticks.state(), TaskState::Running);
    forever.abort();
    ticks.abort();
    Ok(())
}
