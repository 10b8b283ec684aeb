use crate::builder::ReactorBuilder;
use crate::error::ReactorError;
use crate::reactor::event::Interest;
use crate::reactor::handle::{Mailbox, ReactorHandle};
use crate::reactor::job::{Job, JobRequest, Target};
use crate::reactor::poller::{Clock, MonotonicClock, Poller, SysPoller};
use crate::reactor::wait::FdSet;
use crate::task::{AsUnit, Awaiting, Progress, TaskRef, WeakTask, same_unit};
use crate::timer::TimerSet;

use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Upper bound of a single readiness wait.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(1_000_000);

/// Single-threaded scheduler driving suspended units.
///
/// The reactor only keeps weak references: units stay owned by whoever
/// created them, and a unit dropped while tracked is discarded on the next
/// cycle that touches it.
pub struct Reactor<P: Poller = SysPoller, C: Clock = MonotonicClock> {
    fds: FdSet,
    timers: TimerSet,
    // Ready or expired units of the current cycle not resumed yet.
    in_flight: VecDeque<(WeakTask, Interest)>,
    poller: P,
    clock: C,
    max_wait: Duration,
    mailbox: Arc<Mailbox>,
}

impl Reactor {
    pub fn new() -> Self {
        ReactorBuilder::new().build()
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Poller, C: Clock> Reactor<P, C> {
    pub(crate) fn from_parts(poller: P, clock: C, max_wait: Duration, chunk: usize) -> Self {
        let mailbox = Arc::new(Mailbox::new());
        Self {
            fds: FdSet::new(chunk, mailbox.wake_fd()),
            timers: TimerSet::new(chunk),
            in_flight: VecDeque::new(),
            poller,
            clock,
            max_wait,
            mailbox,
        }
    }

    /// Handle for posting bulk commands from other threads or signal handlers.
    pub fn handle(&self) -> ReactorHandle {
        ReactorHandle::new(self.mailbox.clone())
    }

    pub fn poller(&self) -> &P {
        &self.poller
    }

    pub fn poller_mut(&mut self) -> &mut P {
        &mut self.poller
    }

    /// Number of units currently suspended in either wait set, including
    /// those due for resumption in the running cycle.
    pub fn tracked(&self) -> usize {
        self.fds.len() + self.timers.len() + self.in_flight.len()
    }

    pub fn awaiting_fds(&self) -> usize {
        self.fds.len()
    }

    pub fn awaiting_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn is_idle(&self) -> bool {
        self.fds.is_empty() && self.timers.is_empty() && self.in_flight.is_empty()
    }

    pub fn is_tracked(&self, task: &impl AsUnit) -> bool {
        let task = task.unit();
        self.fds.position(&task).is_some()
            || self.timers.position(&task).is_some()
            || self.in_flight_position(&task).is_some()
    }

    /// Submits a unit for managed execution.
    ///
    /// No-op if the unit is done or already attached. Otherwise the unit is
    /// fast-forwarded right away until it completes or declares an await.
    pub fn add_async(&mut self, task: &impl AsUnit) {
        let task = task.unit();
        {
            let Ok(mut unit) = task.try_borrow_mut() else {
                warn!("cannot attach a unit that is currently running");
                return;
            };
            let status = unit.status();
            if status.is_done() || status.is_attached() {
                return;
            }
            unit.set_attached(true);
        }

        self.submit(&task);
    }

    /// Applies `job` to one tracked unit.
    ///
    /// Returns `false` if the unit is not tracked, or the command is
    /// [`Job::Finish`] and the unit is already finalizing.
    pub fn hit_job(&mut self, task: &impl AsUnit, job: Job) -> bool {
        let task = task.unit();

        if job == Job::Finish {
            match task.try_borrow() {
                Ok(unit) if unit.status().is_finalizing() => return false,
                Ok(_) => {}
                Err(_) => return false,
            }
        }

        if !self.untrack(&task) {
            trace!(?job, "job target is not tracked");
            return false;
        }

        self.hit_unit(&task, job);
        true
    }

    /// Applies `job` to every tracked unit.
    ///
    /// The wait sets and the pending part of the running cycle are
    /// snapshotted and reinitialised first, so units that re-suspend while
    /// the command is applied are not hit twice. Returns the number of units
    /// hit.
    pub fn hit_all_jobs(&mut self, job: Job) -> usize {
        let waiting = self.fds.drain();
        let delays = self.timers.drain();
        let batch = std::mem::take(&mut self.in_flight);

        let mut hit = 0;
        for weak in waiting
            .into_iter()
            .chain(delays.into_iter().map(|d| d.task))
            .chain(batch.into_iter().map(|(weak, _)| weak))
        {
            match weak.upgrade() {
                Some(task) => {
                    self.hit_unit(&task, job);
                    hit += 1;
                }
                None => warn!("discarded a dropped unit"),
            }
        }

        debug!(?job, hit, "bulk job control");
        hit
    }

    /// Runs until no unit is tracked.
    ///
    /// Returns the number of resumption events, or the platform error that
    /// aborted the run.
    pub fn run(&mut self) -> Result<usize, ReactorError> {
        let mut ran = 0;
        while let Some(n) = self.turn()? {
            ran += n;
        }

        debug!(ran, "reactor drained");
        Ok(ran)
    }

    /// Runs a single cycle.
    ///
    /// Returns `None` if nothing was tracked, otherwise the number of units
    /// resumed during the cycle.
    pub fn turn(&mut self) -> Result<Option<usize>, ReactorError> {
        if let Some(job) = self.mailbox.take() {
            self.hit_all_jobs(job);
        }
        if self.is_idle() {
            return Ok(None);
        }

        let timeout = self.wait_timeout()?;
        trace!(
            ?timeout,
            fds = self.fds.len(),
            timers = self.timers.len(),
            "reactor cycle"
        );

        let polled = self.wait(timeout)?;
        let ready = self.exec_ready(polled);
        let expired = self.exec_expired()?;

        Ok(Some(ready + expired))
    }

    fn wait_timeout(&self) -> Result<Duration, ReactorError> {
        if self.timers.is_empty() {
            return Ok(self.max_wait);
        }

        let now = self.clock.now().map_err(|err| {
            error!(%err, "clock query failed");
            ReactorError::Clock(err)
        })?;

        let remaining = self.timers.next_remaining(now).unwrap_or(self.max_wait);
        Ok(remaining.min(self.max_wait))
    }

    fn wait(&mut self, timeout: Duration) -> Result<usize, ReactorError> {
        if self.fds.is_empty() && timeout.is_zero() {
            return Ok(0);
        }

        // Always polled: the set carries the mailbox wakeup descriptor.
        let fds = self.fds.poll_fds();
        for entry in fds.iter_mut() {
            entry.set_ready(Interest::EMPTY);
        }

        match self.poller.poll(fds, timeout) {
            Ok(polled) => Ok(polled),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(0),
            Err(err) => {
                error!(%err, "readiness wait failed");
                Err(ReactorError::Poll(err))
            }
        }
    }

    fn exec_ready(&mut self, polled: usize) -> usize {
        if polled == 0 {
            return 0;
        }

        let ready = self.fds.take_ready();
        self.dispatch(ready)
    }

    fn exec_expired(&mut self) -> Result<usize, ReactorError> {
        if self.timers.is_empty() {
            return Ok(0);
        }

        let now = self.clock.now().map_err(|err| {
            error!(%err, "clock query failed");
            ReactorError::Clock(err)
        })?;

        let expired = self
            .timers
            .take_expired(now)
            .into_iter()
            .map(|delay| (delay.task, Interest::EMPTY))
            .collect();

        Ok(self.dispatch(expired))
    }

    // Resumes a batch in order. Entries not reached yet stay visible to job
    // control, so a unit killed earlier in the batch is never resumed.
    fn dispatch(&mut self, batch: Vec<(WeakTask, Interest)>) -> usize {
        self.in_flight = batch.into();

        let mut resumed = 0;
        while let Some((weak, readiness)) = self.in_flight.pop_front() {
            let Some(task) = weak.upgrade() else {
                warn!("discarded a dropped unit");
                continue;
            };
            match task.try_borrow_mut() {
                Ok(mut unit) => unit.resolve(readiness),
                Err(_) => continue,
            }
            self.submit(&task);
            resumed += 1;
        }

        resumed
    }

    // Fast-forwards a unit until it completes or suspends on an fd or timer.
    fn submit(&mut self, task: &TaskRef) {
        loop {
            let op = {
                let Ok(mut unit) = task.try_borrow_mut() else {
                    warn!("rejected reentrant resumption");
                    return;
                };

                if !unit.status().is_awaiting() {
                    loop {
                        match unit.resume_unit() {
                            Progress::Yielded => continue,
                            Progress::Suspended => break,
                            Progress::Completed => {
                                trace!("unit completed");
                                return;
                            }
                            Progress::Stalled => return,
                        }
                    }
                }

                match unit.awaiting() {
                    Some(op) => op.clone(),
                    None => return,
                }
            };

            match op {
                Awaiting::Fd { fd, interest } => {
                    trace!(fd, ?interest, "awaiting descriptor");
                    self.fds.push(task, fd, interest);
                    return;
                }
                Awaiting::Timer { deadline } => {
                    trace!(?deadline, "awaiting timer");
                    self.timers.push(task, deadline);
                    return;
                }
                Awaiting::Subtask(child) => self.add_async(&child),
                Awaiting::Job(request) => self.hit_request(request),
            }

            match task.try_borrow_mut() {
                Ok(mut unit) => unit.resolve(Interest::EMPTY),
                Err(_) => return,
            }
        }
    }

    fn hit_request(&mut self, request: JobRequest) {
        match request.target {
            Target::Task(target) => {
                self.hit_job(&target, request.job);
            }
            Target::All => {
                self.hit_all_jobs(request.job);
            }
        }
    }

    fn hit_unit(&mut self, task: &TaskRef, job: Job) {
        let applied = match task.try_borrow_mut() {
            Ok(mut unit) => unit.apply(job),
            Err(_) => {
                warn!(?job, "job target is currently running");
                return;
            }
        };
        debug!(?job, applied, "job control");

        if job.resubmits() {
            self.submit(task);
        }
    }

    fn untrack(&mut self, task: &TaskRef) -> bool {
        if let Some(index) = self.fds.position(task) {
            self.fds.remove(index);
            return true;
        }
        if let Some(index) = self.timers.position(task) {
            self.timers.remove(index);
            return true;
        }
        if let Some(index) = self.in_flight_position(task) {
            self.in_flight.remove(index);
            return true;
        }
        false
    }

    fn in_flight_position(&self, task: &TaskRef) -> Option<usize> {
        let target = Rc::as_ptr(task);
        self.in_flight
            .iter()
            .position(|(weak, _)| same_unit(weak.as_ptr(), target))
    }
}

impl<P: Poller, C: Clock> Drop for Reactor<P, C> {
    fn drop(&mut self) {
        let waiting = self.fds.drain();
        let delays = self.timers.drain();
        let batch = std::mem::take(&mut self.in_flight);
        let mut left = 0;

        // Units outlive the reactor; hand them back to their owners detached.
        for weak in waiting
            .into_iter()
            .chain(delays.into_iter().map(|d| d.task))
            .chain(batch.into_iter().map(|(weak, _)| weak))
        {
            if let Some(task) = weak.upgrade()
                && let Ok(mut unit) = task.try_borrow_mut()
            {
                unit.set_attached(false);
                left += 1;
            }
        }

        if left > 0 {
            debug!(left, "reactor dropped with suspended units");
        }
    }
}
