//! Stackless resumable units.
//!
//! A task kind is a struct implementing [`Routine`]: its fields are the
//! locals that survive suspension, and [`Routine::resume`] is a single
//! dispatch on the resume point the task stopped at. [`Task`] wraps a routine
//! with the bookkeeping every unit shares: status flags, resume point,
//! awaited operation, error slot and value slot.
//!
//! # Writing a Task Kind
//!
//! ```ignore
//! use stackless::{Co, Resume, Routine, Step, Task};
//!
//! struct Range { end: u32, i: u32 }
//!
//! #[derive(Clone, Copy, Debug)]
//! enum At { Next }
//!
//! impl Routine for Range {
//!     type Value = u32;
//!     type Input = ();
//!     type Point = At;
//!
//!     fn resume(&mut self, at: Resume<At>, co: &mut Co<'_, Self>) -> Step<At> {
//!         match at {
//!             Resume::Initial => self.i = 0,
//!             Resume::At(At::Next) => self.i += 1,
//!             Resume::Final => return co.exit(),
//!         }
//!         if self.i < self.end {
//!             co.emit(self.i, At::Next)
//!         } else {
//!             co.exit()
//!         }
//!     }
//! }
//!
//! let mut range = Task::new(Range { end: 3, i: 0 });
//! while range.advance().is_yielded() {
//!     println!("{:?}", range.value());
//! }
//! ```
//!
//! # Lifecycle
//!
//! 1. A task starts at [`Resume::Initial`].
//! 2. Each [`Task::resume`] dispatches until the routine yields, awaits, or
//!    exits. Exiting the body jumps to [`Resume::Final`].
//! 3. The first dispatch of `Final` marks the task as finalizing; this happens
//!    at most once per lifetime.
//! 4. Exiting while finalizing completes the task. From then on every resume
//!    returns [`Progress::Stalled`] without touching any state.

pub mod co;
mod handle;

pub use co::Co;
pub use handle::{AsUnit, Handle, TaskRef, Unit};
pub(crate) use handle::{WeakTask, same_unit};

use crate::error::Fault;
use crate::reactor::event::Interest;
use crate::reactor::job::{Job, JobRequest};

use std::fmt;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::Instant;

/// The body of a task kind.
pub trait Routine: Sized {
    /// Type of the values produced (yielded or returned).
    type Value;

    /// Type of the input passed to [`Task::resume`].
    type Input: Default;

    /// The kind's own suspension points.
    type Point: Copy + fmt::Debug;

    /// Continues execution from `at` until the next yield, await, or exit.
    fn resume(&mut self, at: Resume<Self::Point>, co: &mut Co<'_, Self>) -> Step<Self::Point>;
}

/// Where a unit continues on its next resumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resume<P> {
    /// Fresh or reset unit.
    Initial,
    /// Right after a suspension point of the task kind.
    At(P),
    /// Finalization entry.
    Final,
}

/// Outcome of one dispatch of a routine.
#[derive(Debug)]
pub enum Step<P> {
    /// A value was produced; continue at `P` next time.
    Yield(P),
    /// Suspend until the awaited condition resolves; continue at `P`.
    Await(Awaiting, P),
    /// Leave the current phase: the body jumps to finalization, finalization
    /// completes the unit.
    Exit,
}

/// External condition a suspended unit waits for.
#[derive(Clone)]
pub enum Awaiting {
    /// Readiness of a descriptor.
    Fd { fd: RawFd, interest: Interest },
    /// Expiry of an absolute monotonic deadline.
    Timer { deadline: Instant },
    /// Hand a sub-task over to the driver, then continue.
    Subtask(TaskRef),
    /// Apply a job-control command, then continue.
    Job(JobRequest),
}

impl fmt::Debug for Awaiting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Awaiting::Fd { fd, interest } => f
                .debug_struct("Fd")
                .field("fd", fd)
                .field("interest", interest)
                .finish(),
            Awaiting::Timer { deadline } => {
                f.debug_struct("Timer").field("deadline", deadline).finish()
            }
            Awaiting::Subtask(task) => f
                .debug_tuple("Subtask")
                .field(&(Rc::as_ptr(task) as *const ()))
                .finish(),
            Awaiting::Job(request) => f.debug_tuple("Job").field(request).finish(),
        }
    }
}

impl Awaiting {
    /// Whether both describe the same operation.
    pub(crate) fn same_op(&self, other: &Awaiting) -> bool {
        match (self, other) {
            (Awaiting::Fd { fd, interest }, Awaiting::Fd { fd: f, interest: i }) => {
                fd == f && interest == i
            }
            (Awaiting::Timer { deadline }, Awaiting::Timer { deadline: d }) => deadline == d,
            (Awaiting::Subtask(a), Awaiting::Subtask(b)) => same_unit(Rc::as_ptr(a), Rc::as_ptr(b)),
            (Awaiting::Job(a), Awaiting::Job(b)) => a.job == b.job && a.target.same(&b.target),
            _ => false,
        }
    }
}

/// Result of a resumption request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// A new value is available.
    Yielded,
    /// The unit declared an await and is waiting for it.
    Suspended,
    /// The unit just finished.
    Completed,
    /// Nothing happened: the unit is done, still waiting, or already running.
    Stalled,
}

impl Progress {
    pub fn is_yielded(self) -> bool {
        self == Progress::Yielded
    }

    pub fn is_suspended(self) -> bool {
        self == Progress::Suspended
    }
}

/// Status flags of a unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Status {
    done: bool,
    finalizing: bool,
    awaiting: bool,
    attached: bool,
}

impl Status {
    /// Terminally finished; no more resumption possible.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The finalization phase has begun.
    pub fn is_finalizing(&self) -> bool {
        self.finalizing
    }

    /// Suspended on an external condition.
    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    /// A reactor owns automatic continuation.
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

// Slots the routine reaches through `Co`.
pub(crate) struct Slots<V> {
    pub(crate) value: Option<V>,
    pub(crate) error: Option<Fault>,
    pub(crate) ready: Interest,
    // The await resolved last, kept until the end of the next dispatch.
    pub(crate) woke: Option<Awaiting>,
}

/// A resumable unit: a routine plus its continuation state.
pub struct Task<R: Routine> {
    status: Status,
    point: Resume<R::Point>,
    awaited: Option<Awaiting>,
    slots: Slots<R::Value>,
    routine: R,
}

impl<R: Routine> Task<R> {
    /// Binds a routine to the initial resume point.
    pub fn new(routine: R) -> Self {
        Self {
            status: Status::default(),
            point: Resume::Initial,
            awaited: None,
            slots: Slots {
                value: None,
                error: None,
                ready: Interest::EMPTY,
                woke: None,
            },
            routine,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status.done
    }

    pub fn point(&self) -> Resume<R::Point> {
        self.point
    }

    /// The operation the unit is suspended on.
    pub fn awaiting(&self) -> Option<&Awaiting> {
        self.awaited.as_ref()
    }

    /// Most recently produced value, or the final value once done.
    pub fn value(&self) -> Option<&R::Value> {
        self.slots.value.as_ref()
    }

    pub fn take_value(&mut self) -> Option<R::Value> {
        self.slots.value.take()
    }

    /// Pending or final error.
    pub fn error(&self) -> Option<&Fault> {
        self.slots.error.as_ref()
    }

    /// Readiness reported when the last fd await resolved.
    pub fn ready(&self) -> Interest {
        self.slots.ready
    }

    pub fn locals(&self) -> &R {
        &self.routine
    }

    pub fn locals_mut(&mut self) -> &mut R {
        &mut self.routine
    }

    /// Resumes the unit with `input`.
    ///
    /// Returns [`Progress::Stalled`] without side effects if the unit is done
    /// or still suspended.
    pub fn resume(&mut self, input: R::Input) -> Progress {
        if self.status.done || self.status.awaiting {
            return Progress::Stalled;
        }

        let mut input = Some(input);
        loop {
            let at = self.point;
            if let Resume::Final = at {
                if self.status.finalizing {
                    self.complete();
                    return Progress::Completed;
                }
                self.status.finalizing = true;
            }

            let step = {
                let mut co = Co::new(
                    &mut self.slots,
                    input.take().unwrap_or_default(),
                    self.status.finalizing,
                );
                self.routine.resume(at, &mut co)
            };
            self.slots.woke = None;

            match step {
                Step::Yield(next) => {
                    self.point = Resume::At(next);
                    return Progress::Yielded;
                }
                Step::Await(op, next) => {
                    self.point = Resume::At(next);
                    self.awaited = Some(op);
                    self.status.awaiting = true;
                    return Progress::Suspended;
                }
                Step::Exit => self.point = Resume::Final,
            }
        }
    }

    /// Resumes with the default input.
    pub fn advance(&mut self) -> Progress {
        self.resume(R::Input::default())
    }

    /// Jumps to finalization (clearing any error) and resumes.
    pub fn halt(&mut self) -> Progress {
        self.apply(Job::Halt);
        self.advance()
    }

    /// Like [`Task::halt`], but leaves a finalizing unit where it is.
    pub fn finish(&mut self) -> Progress {
        self.apply(Job::Finish);
        self.advance()
    }

    /// Stores `fault` and jumps to finalization, then resumes.
    pub fn fail(&mut self, fault: impl Into<Fault>) -> Progress {
        if self.status.done {
            return Progress::Stalled;
        }
        self.force_final();
        self.slots.error = Some(fault.into());
        self.advance()
    }

    /// Marks the unit done without running finalization.
    pub fn kill(&mut self) {
        self.apply(Job::Kill);
    }

    /// Rewinds the unit to [`Resume::Initial`] for reuse.
    ///
    /// Locals are kept; the routine's `Initial` arm is expected to
    /// re-initialise whatever it relies on. A unit still tracked by a reactor
    /// must be detached first.
    pub fn reset(&mut self) {
        self.status = Status::default();
        self.point = Resume::Initial;
        self.awaited = None;
        self.slots.value = None;
        self.slots.error = None;
        self.slots.ready = Interest::EMPTY;
        self.slots.woke = None;
    }

    /// Marks the awaited condition as satisfied with `ready` readiness.
    ///
    /// This is what a driver does before resuming a suspended unit.
    pub fn resolve(&mut self, ready: Interest) {
        if self.status.done || !self.status.awaiting {
            return;
        }
        self.status.awaiting = false;
        self.slots.woke = self.awaited.take();
        self.slots.ready = ready;
    }

    /// Applies a job-control command to the unit's state.
    ///
    /// Returns `false` when the command had no effect.
    pub(crate) fn apply(&mut self, job: Job) -> bool {
        match job {
            Job::Detach => self.status.attached = false,
            _ if self.status.done => return false,
            Job::Halt => {
                self.force_final();
                self.slots.error = None;
            }
            Job::Finish => {
                if self.status.finalizing {
                    return false;
                }
                self.force_final();
                self.slots.error = None;
            }
            Job::ForceFinish => self.force_final(),
            Job::ForceNext => {
                if !self.status.awaiting {
                    return false;
                }
                self.resolve(Interest::EMPTY);
            }
            Job::Kill => {
                self.status.awaiting = false;
                self.awaited = None;
                self.point = Resume::Final;
                self.status.finalizing = true;
                self.status.done = true;
            }
        }

        true
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.status.attached = attached;
    }

    fn force_final(&mut self) {
        self.status.awaiting = false;
        self.awaited = None;
        self.slots.woke = None;
        self.point = Resume::Final;
    }

    fn complete(&mut self) {
        self.status.done = true;
        self.status.finalizing = true;
        self.status.awaiting = false;
        self.awaited = None;
        self.point = Resume::Final;
    }
}

impl<R: Routine> fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("status", &self.status)
            .field("point", &self.point)
            .field("awaiting", &self.awaited)
            .field("error", &self.slots.error)
            .finish_non_exhaustive()
    }
}
