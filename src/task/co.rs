//! Per-resumption context handed to [`Routine::resume`].
//!
//! Every way a routine can leave a dispatch is a method here that fills the
//! unit's slots and returns the matching [`Step`]:
//!
//! | Method | Effect |
//! |---|---|
//! | [`Co::emit`] | store a value, stay resumable |
//! | [`Co::complete`] | store the final value, clear the error, leave the phase |
//! | [`Co::throw`] | store an error, leave the phase |
//! | [`Co::handled`] | clear the error, leave the phase |
//! | [`Co::rethrow`] | leave the phase only if an error is pending |
//! | [`Co::exit`] | leave the phase as is |
//! | `await_*`, [`Co::delay`], ... | suspend on an external condition |
//!
//! Leaving the body enters finalization; leaving finalization completes the
//! unit. Composition helpers live in [`crate::compose`].

use crate::error::{Domain, Fault};
use crate::reactor::event::Interest;
use crate::reactor::job::{Job, JobRequest, Target};
use crate::task::{AsUnit, Awaiting, Routine, Slots, Step};

use std::os::fd::RawFd;
use std::time::{Duration, Instant};

// Deadlines that overflow `Instant` are clamped to roughly thirty years out.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

pub struct Co<'a, R: Routine> {
    pub(crate) slots: &'a mut Slots<R::Value>,
    input: R::Input,
    finalizing: bool,
}

impl<'a, R: Routine> Co<'a, R> {
    pub(crate) fn new(slots: &'a mut Slots<R::Value>, input: R::Input, finalizing: bool) -> Self {
        Self {
            slots,
            input,
            finalizing,
        }
    }

    /// Produces `value` and continues at `next` on the following resume.
    pub fn emit(&mut self, value: R::Value, next: R::Point) -> Step<R::Point> {
        self.slots.value = Some(value);
        Step::Yield(next)
    }

    /// Returns `value`: clears any error and leaves the current phase.
    pub fn complete(&mut self, value: R::Value) -> Step<R::Point> {
        self.slots.error = None;
        self.slots.value = Some(value);
        Step::Exit
    }

    /// Stores `error` and leaves the current phase.
    pub fn throw(&mut self, error: impl Into<Fault>) -> Step<R::Point> {
        self.slots.error = Some(error.into());
        Step::Exit
    }

    /// Clears the pending error and leaves the current phase.
    pub fn handled(&mut self) -> Step<R::Point> {
        self.slots.error = None;
        Step::Exit
    }

    /// Leaves the current phase if an error is pending.
    ///
    /// Typically the first statement of finalization:
    ///
    /// ```ignore
    /// Resume::Final => {
    ///     if let Some(step) = co.rethrow() {
    ///         return step;
    ///     }
    ///     co.complete(self.count)
    /// }
    /// ```
    pub fn rethrow(&mut self) -> Option<Step<R::Point>> {
        self.slots.error.is_some().then_some(Step::Exit)
    }

    /// Leaves the current phase without touching value or error.
    pub fn exit(&mut self) -> Step<R::Point> {
        Step::Exit
    }

    pub fn error(&self) -> Option<&Fault> {
        self.slots.error.as_ref()
    }

    /// The pending error if it belongs to domain `E`.
    pub fn catch<E: Domain>(&self) -> Option<E> {
        self.slots.error.as_ref().and_then(Fault::downcast::<E>)
    }

    pub fn value(&self) -> Option<&R::Value> {
        self.slots.value.as_ref()
    }

    /// Overrides the value slot, e.g. from finalization.
    pub fn set_value(&mut self, value: R::Value) {
        self.slots.value = Some(value);
    }

    pub fn input(&self) -> &R::Input {
        &self.input
    }

    pub fn take_input(&mut self) -> R::Input {
        std::mem::take(&mut self.input)
    }

    pub fn is_finalizing(&self) -> bool {
        self.finalizing
    }

    /// Readiness reported when the last fd await resolved.
    pub fn ready(&self) -> Interest {
        self.slots.ready
    }

    /// Suspends on an arbitrary awaited operation.
    pub fn suspend(&mut self, op: Awaiting, next: R::Point) -> Step<R::Point> {
        Step::Await(op, next)
    }

    /// Suspends until `fd` is ready for `interest`.
    pub fn await_fd(&mut self, fd: RawFd, interest: Interest, next: R::Point) -> Step<R::Point> {
        Step::Await(Awaiting::Fd { fd, interest }, next)
    }

    /// Suspends for `duration`, counted from [`Instant::now`].
    ///
    /// The driver's [`Clock`](crate::Clock) decides when the deadline has
    /// passed. Use [`Co::delay_until`] for deadlines taken from another
    /// source.
    pub fn delay(&mut self, duration: Duration, next: R::Point) -> Step<R::Point> {
        let now = Instant::now();
        let deadline = now
            .checked_add(duration)
            .unwrap_or_else(|| now + FAR_FUTURE);

        self.delay_until(deadline, next)
    }

    /// Suspends until `deadline`, as judged by the driver's clock.
    pub fn delay_until(&mut self, deadline: Instant, next: R::Point) -> Step<R::Point> {
        Step::Await(Awaiting::Timer { deadline }, next)
    }

    /// Hands `task` to the driver for managed execution, then continues.
    pub fn spawn(&mut self, task: &impl AsUnit, next: R::Point) -> Step<R::Point> {
        Step::Await(Awaiting::Subtask(task.unit()), next)
    }

    /// Applies `job` to `task` through the driver, then continues.
    pub fn hit_job(&mut self, task: &impl AsUnit, job: Job, next: R::Point) -> Step<R::Point> {
        let request = JobRequest::new(Target::Task(task.unit()), job);
        Step::Await(Awaiting::Job(request), next)
    }

    /// Applies `job` to every unit tracked by the driver, then continues.
    pub fn hit_all_jobs(&mut self, job: Job, next: R::Point) -> Step<R::Point> {
        Step::Await(Awaiting::Job(JobRequest::new(Target::All, job)), next)
    }
}
