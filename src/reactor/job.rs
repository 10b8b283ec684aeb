//! Job-control commands.
//!
//! | Command | Effect on a suspended unit | Re-submitted |
//! |---|---|---|
//! | [`Job::Detach`] | clear the attached flag only | no |
//! | [`Job::Halt`] | jump to finalization, clear the error | yes |
//! | [`Job::Finish`] | like halt, no-op if already finalizing | yes |
//! | [`Job::ForceFinish`] | clear the await, jump to finalization | yes |
//! | [`Job::ForceNext`] | clear the await, keep the resume point | yes |
//! | [`Job::Kill`] | mark done, skip finalization | no resumption ever |
//!
//! Every command first removes the unit from the wait set holding it.

use crate::task::{TaskRef, same_unit};

use std::fmt;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Job {
    Detach,
    Halt,
    Finish,
    ForceFinish,
    ForceNext,
    Kill,
}

impl Job {
    /// Numeric code of the command.
    pub const fn code(self) -> i8 {
        match self {
            Job::Detach => 0,
            Job::Halt => 1,
            Job::Finish => 2,
            Job::ForceFinish => 3,
            Job::ForceNext => 4,
            Job::Kill => -1,
        }
    }

    pub const fn from_code(code: i8) -> Option<Job> {
        match code {
            0 => Some(Job::Detach),
            1 => Some(Job::Halt),
            2 => Some(Job::Finish),
            3 => Some(Job::ForceFinish),
            4 => Some(Job::ForceNext),
            -1 => Some(Job::Kill),
            _ => None,
        }
    }

    /// Whether the unit is handed back for resumption after the command.
    pub(crate) fn resubmits(self) -> bool {
        !matches!(self, Job::Detach | Job::Kill)
    }
}

/// Which units a command applies to.
#[derive(Clone)]
pub enum Target {
    Task(TaskRef),
    /// Every unit tracked at the time the command is applied.
    All,
}

impl Target {
    pub(crate) fn same(&self, other: &Target) -> bool {
        match (self, other) {
            (Target::Task(a), Target::Task(b)) => same_unit(Rc::as_ptr(a), Rc::as_ptr(b)),
            (Target::All, Target::All) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Task(task) => f
                .debug_tuple("Task")
                .field(&(Rc::as_ptr(task) as *const ()))
                .finish(),
            Target::All => f.write_str("All"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct JobRequest {
    pub target: Target,
    pub job: Job,
}

impl JobRequest {
    pub fn new(target: Target, job: Job) -> Self {
        Self { target, job }
    }
}
