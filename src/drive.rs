//! Driving units without a reactor.
//!
//! A [`Blocking`] driver resumes a unit directly and services its awaits in
//! place: an fd await becomes a blocking `poll` on that one descriptor, a
//! timer await sleeps until the deadline, a sub-task is driven to completion
//! before its parent continues, and a job-control request is applied to its
//! target right away. Bulk requests have nothing to hit, since nothing is
//! tracked.
//!
//! [`Task::iter`] wraps this in a structured loop:
//!
//! ```ignore
//! for n in fib.iter() {
//!     if n > 1000 {
//!         break;
//!     }
//!     println!("{n}");
//! }
//! // `fib` went through finalization here, even after `break`.
//! ```

use crate::error::ReactorError;
use crate::reactor::core::DEFAULT_MAX_WAIT;
use crate::reactor::event::{Interest, PollFd};
use crate::reactor::job::{Job, Target};
use crate::reactor::poller::{Clock, MonotonicClock, Poller, SysPoller};
use crate::task::{Awaiting, Progress, Routine, Task, Unit};

use std::io;
use tracing::{debug, trace, warn};

/// Direct driver servicing awaits with blocking waits.
#[derive(Debug, Default)]
pub struct Blocking<P: Poller = SysPoller, C: Clock = MonotonicClock> {
    poller: P,
    clock: C,
}

impl Blocking {
    pub fn new() -> Self {
        Self::with(SysPoller, MonotonicClock)
    }
}

impl<P: Poller, C: Clock> Blocking<P, C> {
    pub fn with(poller: P, clock: C) -> Self {
        Self { poller, clock }
    }

    pub fn poller(&self) -> &P {
        &self.poller
    }

    /// Resumes `task` until it yields, completes, or cannot make progress.
    ///
    /// Awaits met on the way are serviced in place and never reported.
    pub fn advance(&mut self, task: &mut dyn Unit) -> Result<Progress, ReactorError> {
        loop {
            if let Some(op) = task.awaiting().cloned() {
                let ready = self.service(op)?;
                task.resolve(ready);
            }

            match task.resume_unit() {
                Progress::Suspended => continue,
                progress => return Ok(progress),
            }
        }
    }

    /// Drives `task` to completion, discarding intermediate values.
    pub fn exec(&mut self, task: &mut dyn Unit) -> Result<(), ReactorError> {
        while !task.status().is_done() {
            if self.advance(task)? == Progress::Stalled {
                break;
            }
        }
        Ok(())
    }

    /// Drives `task` through `finish` until done.
    pub fn finish_exec(&mut self, task: &mut dyn Unit) -> Result<(), ReactorError> {
        while !task.status().is_done() {
            task.apply(Job::Finish);
            if self.advance(task)? == Progress::Stalled {
                break;
            }
        }
        Ok(())
    }

    fn service(&mut self, op: Awaiting) -> Result<Interest, ReactorError> {
        match op {
            Awaiting::Fd { fd, interest } => self.wait_fd(PollFd::new(fd, interest)),
            Awaiting::Timer { deadline } => {
                loop {
                    let now = self.clock.now().map_err(ReactorError::Clock)?;
                    let left = deadline.saturating_duration_since(now);
                    if left.is_zero() {
                        break;
                    }

                    trace!(?left, "sleeping until deadline");
                    match self.poller.sleep(left) {
                        Ok(()) => break,
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                        Err(err) => return Err(ReactorError::Sleep(err)),
                    }
                }
                Ok(Interest::EMPTY)
            }
            Awaiting::Subtask(child) => {
                match child.try_borrow_mut() {
                    Ok(mut unit) if !unit.status().is_attached() => self.exec(&mut *unit)?,
                    Ok(_) => debug!("sub-task belongs to a reactor; not driven"),
                    Err(_) => warn!("rejected reentrant resumption"),
                }
                Ok(Interest::EMPTY)
            }
            Awaiting::Job(request) => {
                match request.target {
                    Target::Task(target) => match target.try_borrow_mut() {
                        Ok(mut unit) => {
                            let applied = unit.apply(request.job);
                            debug!(job = ?request.job, applied, "job control");
                        }
                        Err(_) => warn!(job = ?request.job, "job target is currently running"),
                    },
                    Target::All => debug!(job = ?request.job, "bulk job control with nothing tracked"),
                }
                Ok(Interest::EMPTY)
            }
        }
    }

    fn wait_fd(&mut self, entry: PollFd) -> Result<Interest, ReactorError> {
        let mut fds = [entry];
        loop {
            match self.poller.poll(&mut fds, DEFAULT_MAX_WAIT) {
                Ok(0) => continue,
                Ok(_) => return Ok(fds[0].ready()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(ReactorError::Poll(err)),
            }
        }
    }
}

/// Drives `task` to completion with a [`Blocking`] driver.
pub fn exec(task: &mut dyn Unit) -> Result<(), ReactorError> {
    Blocking::new().exec(task)
}

impl<R: Routine> Task<R> {
    /// Iterates the values of the task, driving it with a [`Blocking`]
    /// driver.
    ///
    /// Dropping the iterator drives the task through `finish` to completion.
    pub fn iter(&mut self) -> Iter<'_, R> {
        Iter {
            task: self,
            driver: Blocking::new(),
            failure: None,
        }
    }
}

/// Structured iteration over a task's values. See [`Task::iter`].
pub struct Iter<'t, R: Routine> {
    task: &'t mut Task<R>,
    driver: Blocking,
    failure: Option<ReactorError>,
}

impl<R: Routine> Iter<'_, R> {
    /// The platform error that ended the iteration early, if any.
    pub fn failure(&self) -> Option<&ReactorError> {
        self.failure.as_ref()
    }
}

impl<R: Routine> Iterator for Iter<'_, R> {
    type Item = R::Value;

    fn next(&mut self) -> Option<R::Value> {
        if self.failure.is_some() {
            return None;
        }

        loop {
            match self.driver.advance(&mut *self.task) {
                Ok(Progress::Yielded) => {
                    if let Some(value) = self.task.take_value() {
                        return Some(value);
                    }
                }
                Ok(_) => return None,
                Err(err) => {
                    warn!(%err, "iteration aborted");
                    self.failure = Some(err);
                    return None;
                }
            }
        }
    }
}

impl<R: Routine> Drop for Iter<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.driver.finish_exec(&mut *self.task) {
            warn!(%err, "finalization aborted");
        }
    }
}
