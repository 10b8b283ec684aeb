mod common;

use common::{fibo, sleeper};
use proptest::prelude::*;
use stackless::{Awaiting, Interest, Progress, Resume, Status};
use std::time::Duration;

fn collect(task: &mut stackless::Task<common::Fibo>) -> Vec<u64> {
    let mut values = Vec::new();
    while task.advance() == Progress::Yielded {
        values.extend(task.value().copied());
    }
    values
}

#[test]
fn test_fibo_yields_then_returns() {
    let mut task = fibo(6);

    assert_eq!(collect(&mut task), vec![0, 1, 1, 2, 3, 5]);
    assert!(task.is_done());
    assert_eq!(task.value(), Some(&8));
    assert!(task.error().is_none());
    assert_eq!(task.locals().finals, 1);
}

#[test]
fn test_done_unit_is_stalled_without_side_effects() {
    let mut task = fibo(2);
    collect(&mut task);

    let status = task.status();
    let point = task.point();

    for _ in 0..3 {
        assert_eq!(task.advance(), Progress::Stalled);
    }
    assert_eq!(task.status(), status);
    assert_eq!(task.point(), point);
    assert_eq!(task.value(), Some(&1));
    assert_eq!(task.locals().finals, 1);
}

#[test]
fn test_zero_length_sequence_still_finalizes() {
    let mut task = fibo(0);

    assert_eq!(task.advance(), Progress::Completed);
    assert!(task.status().is_finalizing());
    assert_eq!(task.value(), Some(&0));
    assert_eq!(task.locals().finals, 1);
}

#[test]
fn test_halt_runs_finalization_once() {
    let mut task = fibo(100);

    assert_eq!(task.advance(), Progress::Yielded);
    assert_eq!(task.advance(), Progress::Yielded);
    assert_eq!(task.halt(), Progress::Completed);

    assert!(task.is_done());
    assert_eq!(task.locals().finals, 1);
    assert_eq!(task.point(), Resume::Final);
}

#[test]
fn test_kill_never_finalizes() {
    let mut task = fibo(100);

    assert_eq!(task.advance(), Progress::Yielded);
    task.kill();

    assert!(task.is_done());
    assert_eq!(task.advance(), Progress::Stalled);
    assert_eq!(task.locals().finals, 0);
}

#[test]
fn test_suspended_unit_waits_for_resolution() {
    let log = common::log();
    let task = sleeper("s", Duration::from_secs(60), &log);

    assert_eq!(task.advance(), Progress::Suspended);
    assert!(task.status().is_awaiting());
    assert!(matches!(
        task.borrow().awaiting(),
        Some(Awaiting::Timer { .. })
    ));

    // Not resolved yet: nothing happens.
    assert_eq!(task.advance(), Progress::Stalled);
    assert!(log.borrow().is_empty());

    task.borrow_mut().resolve(Interest::EMPTY);
    assert_eq!(task.advance(), Progress::Completed);
    assert_eq!(*log.borrow(), vec!["s"]);
    assert_eq!(task.borrow().locals().finals, 1);
}

#[test]
fn test_reentrant_resume_is_stalled() {
    let log = common::log();
    let task = sleeper("s", Duration::from_secs(60), &log);

    let guard = task.borrow_mut();
    assert_eq!(task.advance(), Progress::Stalled);
    drop(guard);

    assert_eq!(task.advance(), Progress::Suspended);
}

#[test]
fn test_reset_after_completion() {
    let mut task = fibo(3);
    collect(&mut task);

    task.reset();
    assert_eq!(task.status(), Status::default());
    assert_eq!(task.point(), Resume::Initial);
    assert!(task.value().is_none());

    assert_eq!(collect(&mut task), vec![0, 1, 1]);
    assert_eq!(task.locals().finals, 2);
}

proptest! {
    #[test]
    fn reset_replays_the_same_sequence(count in 0u32..30, steps in 0usize..40) {
        let expected = collect(&mut fibo(count));

        let mut task = fibo(count);
        for _ in 0..steps {
            task.advance();
        }
        task.reset();

        prop_assert_eq!(collect(&mut task), expected);
        prop_assert!(task.is_done());
        prop_assert!(task.error().is_none());
    }
}
