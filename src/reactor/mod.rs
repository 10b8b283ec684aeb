//! Single-threaded reactor driving suspended units.
//!
//! - [`core`]: the run loop, submission and job control
//! - [`event`]: interest masks and `pollfd` entries
//! - [`poller`]: readiness and clock capabilities
//! - [`wait`]: the fd-wait set
//! - [`job`]: job-control commands
//! - [`handle`]: posting commands from outside the loop

pub mod core;
pub mod event;
pub mod handle;
pub mod job;
pub mod poller;
pub(crate) mod wait;
