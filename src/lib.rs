//! Stackless resumable tasks with a single-threaded reactor.
//!
//! This crate provides resumable units whose continuation is an explicit
//! resume point, a typed error channel with guaranteed finalization, helpers
//! to compose units, and a `poll(2)` based reactor with a job-control
//! protocol for cancelling or steering suspended units.
//!
//! # Architecture
//!
//! - **Task**: a [`Routine`] (locals + dispatch on its resume points) wrapped
//!   with status flags, await descriptor, error and value slots
//! - **Co**: per-resumption context through which a routine yields, throws,
//!   returns and declares awaits
//! - **Compose**: driving a child unit from inside a parent ([`Co::yields`],
//!   [`Co::exec`], ...)
//! - **Blocking**: reactor-less driver servicing awaits in place, plus
//!   structured iteration via [`Task::iter`]
//! - **Reactor**: fd-wait set and timer set, readiness dispatch and job
//!   control, configured through [`ReactorBuilder`]
//! - **Fault**: identity-comparable domain errors

mod builder;
pub mod compose;
pub mod drive;
pub mod error;
pub mod reactor;
pub mod task;
mod timer;
mod utils;

pub use builder::ReactorBuilder;
pub use compose::Pull;
pub use drive::{Blocking, Iter, exec};
pub use error::{Domain, Fault, ReactorError, error_message, is_error};
pub use reactor::core::Reactor;
pub use reactor::event::{Interest, PollFd};
pub use reactor::handle::ReactorHandle;
pub use reactor::job::{Job, JobRequest, Target};
pub use reactor::poller::{Clock, MonotonicClock, Poller, SysPoller};
pub use task::{
    AsUnit, Awaiting, Co, Handle, Progress, Resume, Routine, Status, Step, Task, TaskRef, Unit,
};
