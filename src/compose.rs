//! Driving one unit from inside another.
//!
//! These helpers run inside a routine body and drive a child task through the
//! parent's [`Co`]. Whenever the child suspends, its await is propagated as
//! the parent's own, so the parent's driver (a reactor or a [`Blocking`]
//! loop) services it. On re-entry the child is resolved with the readiness the
//! parent received and driven on.
//!
//! Helpers that may have to suspend return `Option<Step>`: `Some` must be
//! returned from `resume` as is, `None` means the helper is finished and the
//! body continues.
//!
//! ```ignore
//! Resume::At(At::Copy) => {
//!     if let Some(step) = co.yields(&mut self.reader, At::Copy) {
//!         return step;
//!     }
//!     co.complete(self.total)
//! }
//! ```
//!
//! [`Blocking`]: crate::drive::Blocking

use crate::reactor::job::Job;
use crate::task::{Co, Handle, Progress, Routine, Step, Task};

/// Outcome of [`Co::pull`].
#[derive(Debug)]
pub enum Pull<P> {
    /// The child produced a value.
    Ready,
    /// The child is done.
    Done,
    /// The child suspended; return this step and pull again at re-entry.
    Pending(Step<P>),
}

impl<'a, R: Routine> Co<'a, R> {
    /// Resumes `child` once, re-entering the parent at `at` if the child
    /// suspends.
    pub fn pull<C: Routine>(&mut self, child: &mut Task<C>, at: R::Point) -> Pull<R::Point> {
        self.pull_with(child, at, None)
    }

    fn pull_with<C: Routine>(
        &mut self,
        child: &mut Task<C>,
        at: R::Point,
        job: Option<Job>,
    ) -> Pull<R::Point> {
        let woken = match (child.awaiting(), self.slots.woke.as_ref()) {
            (Some(op), Some(woke)) => op.same_op(woke),
            _ => false,
        };

        if woken {
            child.resolve(self.slots.ready);
            self.slots.woke = None;
        } else if let Some(job) = job {
            child.apply(job);
        }

        if let Some(op) = child.awaiting() {
            return Pull::Pending(Step::Await(op.clone(), at));
        }

        match child.advance() {
            Progress::Yielded => Pull::Ready,
            Progress::Suspended => child
                .awaiting()
                .cloned()
                .map_or(Pull::Done, |op| Pull::Pending(Step::Await(op, at))),
            Progress::Completed | Progress::Stalled => Pull::Done,
        }
    }

    /// Re-emits every value of `child` as the parent's own, then propagates
    /// the child's error, if any.
    pub fn yields<C>(&mut self, child: &mut Task<C>, at: R::Point) -> Option<Step<R::Point>>
    where
        C: Routine,
        C::Value: Into<R::Value>,
    {
        loop {
            match self.pull(child, at) {
                Pull::Ready => {
                    if let Some(value) = child.take_value() {
                        return Some(self.emit(value.into(), at));
                    }
                }
                Pull::Pending(step) => return Some(step),
                Pull::Done => return self.throws(child),
            }
        }
    }

    /// Leaves the current phase with the child's error, if it has one.
    pub fn throws<C: Routine>(&mut self, child: &Task<C>) -> Option<Step<R::Point>> {
        let error = child.error()?.clone();
        Some(self.throw(error))
    }

    /// Propagates the child's error, or returns its final value once done.
    pub fn returns<C>(&mut self, child: &mut Task<C>) -> Option<Step<R::Point>>
    where
        C: Routine,
        C::Value: Into<R::Value>,
    {
        if let Some(step) = self.throws(child) {
            return Some(step);
        }
        if !child.is_done() {
            return None;
        }

        Some(match child.take_value() {
            Some(value) => self.complete(value.into()),
            None => self.handled(),
        })
    }

    /// Propagates the child's error, or leaves the phase once the child is done.
    pub fn exits<C: Routine>(&mut self, child: &Task<C>) -> Option<Step<R::Point>> {
        if let Some(step) = self.throws(child) {
            return Some(step);
        }
        child.is_done().then(|| self.exit())
    }

    /// Drives `child` to completion, discarding its intermediate values.
    pub fn exec<C: Routine>(&mut self, child: &mut Task<C>, at: R::Point) -> Option<Step<R::Point>> {
        self.exec_with(child, at, None)
    }

    /// Drives `child` through `finish` until done.
    ///
    /// Closes an in-body iteration over a child: finalization of the child
    /// runs whether the loop ran to the end or left early.
    pub fn finish_exec<C: Routine>(
        &mut self,
        child: &mut Task<C>,
        at: R::Point,
    ) -> Option<Step<R::Point>> {
        self.exec_with(child, at, Some(Job::Finish))
    }

    /// Drives `child` through `halt` until done.
    pub fn halt_exec<C: Routine>(
        &mut self,
        child: &mut Task<C>,
        at: R::Point,
    ) -> Option<Step<R::Point>> {
        self.exec_with(child, at, Some(Job::Halt))
    }

    fn exec_with<C: Routine>(
        &mut self,
        child: &mut Task<C>,
        at: R::Point,
        job: Option<Job>,
    ) -> Option<Step<R::Point>> {
        loop {
            match self.pull_with(child, at, job) {
                Pull::Ready => continue,
                Pull::Done => return None,
                Pull::Pending(step) => return Some(step),
            }
        }
    }

    /// Takes `child` away from a reactor and drives it to completion through
    /// the parent.
    ///
    /// A child still attached to a reactor is first detached with a job
    /// control await; the parent continues at `at` and calls this again.
    pub fn sync_exec<C: Routine + 'static>(
        &mut self,
        child: &Handle<C>,
        at: R::Point,
    ) -> Option<Step<R::Point>> {
        if let Some(step) = self.sync_job(child, at) {
            return Some(step);
        }
        let mut task = child.try_borrow_mut()?;
        self.exec(&mut *task, at)
    }

    /// Like [`Co::sync_exec`], re-emitting the child's values.
    pub fn sync_yields<C>(&mut self, child: &Handle<C>, at: R::Point) -> Option<Step<R::Point>>
    where
        C: Routine + 'static,
        C::Value: Into<R::Value>,
    {
        if let Some(step) = self.sync_job(child, at) {
            return Some(step);
        }
        let mut task = child.try_borrow_mut()?;
        self.yields(&mut *task, at)
    }

    fn sync_job<C: Routine + 'static>(
        &mut self,
        child: &Handle<C>,
        at: R::Point,
    ) -> Option<Step<R::Point>> {
        let status = child.try_borrow_mut()?.status();
        (status.is_attached() && !status.is_done()).then(|| self.hit_job(child, Job::Detach, at))
    }
}
