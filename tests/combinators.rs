use std::cell::{Cell, RefCell};
use std::rc::Rc;

use stardos::future::{
    all_futures, await_future, first_future, flatten_future, join_futures, new_future,
    resolve_future,
};
use stardos::time::{delay, timeout, Duration};
use stardos::{Deferred, Error, Result};

type Log = Rc<RefCell<Vec<String>>>;

/// Resolves with `value` after `ms`, logging when it starts and settles.
fn traced(log: &Log, name: &'static str, ms: u64, value: u32) -> Deferred<u32> {
    let started = log.clone();
    let settled = log.clone();
    new_future(move || started.borrow_mut().push(format!("{name} start")))
        .then(move |()| timeout(Duration::from_millis(ms)))
        .map(move |()| {
            settled.borrow_mut().push(format!("{name} end"));
            value
        })
}

fn counted<T: 'static>(deferred: Deferred<T>, count: &Rc<Cell<u32>>) -> Deferred<T> {
    let count = count.clone();
    deferred.with_cleanup(move || count.set(count.get() + 1))
}

#[stardos::test]
async fn building_combinators_does_no_work() -> Result<()> {
    let log = Log::default();
    let composed = all_futures([
        traced(&log, "a", 5, 1),
        join_futures(traced(&log, "b", 5, 2), traced(&log, "c", 5, 3)).map(|(b, c)| b + c),
    ]);
    let chained = await_future(composed, |values| resolve_future(values.iter().sum::<u32>()));
    assert!(log.borrow().is_empty());

    assert_eq!(chained.await?, 6);
    assert_eq!(log.borrow().len(), 6);
    Ok(())
}

#[stardos::test]
async fn join_starts_both_before_either_settles() -> Result<()> {
    let log = Log::default();
    let pair = join_futures(traced(&log, "slow", 30, 1), traced(&log, "fast", 10, 2));
    assert_eq!(pair.await?, (1, 2));
    assert_eq!(
        *log.borrow(),
        ["slow start", "fast start", "fast end", "slow end"]
    );
    Ok(())
}

#[stardos::test]
async fn join_fails_fast_and_releases_both() -> Result<()> {
    let count = Rc::new(Cell::new(0));
    let failing = delay(
        Duration::from_millis(5),
        Deferred::<u32>::try_new(|| Err(Error::msg("left failed"))),
    );
    let pair = join_futures(
        counted(failing, &count),
        counted(timeout(Duration::from_secs(60)), &count),
    );
    let cleanup = pair.cleanup_handle();

    let err = pair.await.unwrap_err();
    assert_eq!(err.to_string(), "left failed");
    cleanup.run();
    cleanup.run();
    assert_eq!(count.get(), 2);
    Ok(())
}

#[stardos::test]
async fn join_starts_the_right_side_when_the_left_fails_at_once() -> Result<()> {
    let started = Rc::new(Cell::new(false));
    let flag = started.clone();
    let right = Deferred::from_future(move || async move {
        flag.set(true);
        Ok(2)
    });
    let pair = join_futures(Deferred::<u32>::try_new(|| Err(Error::msg("left failed"))), right);
    assert_eq!(pair.await.unwrap_err().to_string(), "left failed");
    assert!(started.get());
    Ok(())
}

#[stardos::test]
async fn all_starts_every_participant_despite_an_early_failure() -> Result<()> {
    let started = Rc::new(Cell::new(0));
    let body = |started: Rc<Cell<u32>>| {
        Deferred::from_future(move || async move {
            started.set(started.get() + 1);
            Ok(1)
        })
    };
    let values = all_futures([
        Deferred::try_new(|| Err(Error::msg("first failed"))),
        body(started.clone()),
        body(started.clone()),
    ]);
    assert_eq!(values.await.unwrap_err().to_string(), "first failed");
    assert_eq!(started.get(), 2);
    Ok(())
}

#[stardos::test]
async fn first_settlement_wins_and_losers_are_released() -> Result<()> {
    let count = Rc::new(Cell::new(0));
    let race = first_future([
        counted(timeout(Duration::from_secs(60)).map(|()| "slow"), &count),
        counted(delay(Duration::from_millis(10), resolve_future("fast")), &count),
        counted(timeout(Duration::from_millis(40)).map(|()| "medium"), &count),
    ]);
    let cleanup = race.cleanup_handle();

    let start = stardos::time::Instant::now();
    assert_eq!(race.await?, "fast");
    assert!(start.elapsed() < Duration::from_secs(60));
    cleanup.run();
    assert_eq!(count.get(), 3);
    Ok(())
}

#[stardos::test]
async fn a_failure_can_win_the_race() -> Result<()> {
    let race = first_future([
        timeout(Duration::from_millis(50)).map(|()| 1),
        delay(
            Duration::from_millis(5),
            Deferred::try_new(|| Err(Error::msg("first to settle"))),
        ),
    ]);
    let err = race.await.unwrap_err();
    assert_eq!(err.to_string(), "first to settle");
    Ok(())
}

#[stardos::test]
async fn all_keeps_input_order_not_completion_order() -> Result<()> {
    let log = Log::default();
    let values = all_futures([
        traced(&log, "a", 30, 1),
        traced(&log, "b", 10, 2),
        traced(&log, "c", 20, 3),
    ]);
    assert_eq!(values.await?, vec![1, 2, 3]);
    assert_eq!(log.borrow()[..3], ["a start", "b start", "c start"]);
    assert_eq!(log.borrow()[3..], ["b end", "c end", "a end"]);
    Ok(())
}

#[stardos::test]
async fn all_fails_as_a_whole() -> Result<()> {
    let values = all_futures([
        resolve_future(1),
        Deferred::try_new(|| Err(Error::msg("second failed"))),
        timeout(Duration::from_secs(60)).map(|()| 3),
    ]);
    let cleanup = values.cleanup_handle();
    assert_eq!(values.await.unwrap_err().to_string(), "second failed");
    cleanup.run();
    Ok(())
}

#[stardos::test]
async fn await_rebinds_cleanup_once_continuation_starts() -> Result<()> {
    let first = Rc::new(Cell::new(0));
    let second = Rc::new(Cell::new(0));
    let inner = second.clone();
    let chained = await_future(counted(resolve_future(()), &first), move |()| {
        counted(timeout(Duration::from_millis(5)), &inner)
    });
    let cleanup = chained.cleanup_handle();

    chained.await?;
    cleanup.run();
    assert_eq!((first.get(), second.get()), (0, 1));
    Ok(())
}

#[stardos::test]
async fn flatten_runs_the_produced_computation() -> Result<()> {
    let nested = new_future(|| timeout(Duration::from_millis(5)).map(|()| "inner"));
    assert_eq!(flatten_future(nested).await?, "inner");
    Ok(())
}

#[test]
fn cleanup_without_action_is_a_no_op() {
    let plain = new_future(|| 1);
    plain.cleanup();
    plain.cleanup();
    assert!(plain.cleanup_handle().is_retired());
}
