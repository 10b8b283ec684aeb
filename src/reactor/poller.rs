//! Readiness and clock capabilities consumed by the reactor.
//!
//! The reactor never talks to the OS directly: it waits through a [`Poller`]
//! and reads time through a [`Clock`]. [`SysPoller`] and [`MonotonicClock`]
//! are the production implementations; tests substitute scripted ones.

use crate::reactor::event::PollFd;

use libc::{EINTR, nfds_t, poll, timespec};
use std::io;
use std::time::{Duration, Instant};

/// Waits for readiness on a set of descriptors.
pub trait Poller {
    /// Blocks until at least one entry is ready or `timeout` elapses.
    ///
    /// Readiness is written back into each entry (see [`PollFd::ready`]).
    /// Returns the number of ready entries. An interrupted wait reports
    /// [`io::ErrorKind::Interrupted`].
    fn poll(&mut self, fds: &mut [PollFd], timeout: Duration) -> io::Result<usize>;

    /// Blocks for `timeout`. Timer awaits of a [`Blocking`](crate::Blocking)
    /// driver sleep through this.
    fn sleep(&mut self, timeout: Duration) -> io::Result<()>;
}

/// Reads a monotonic instant.
///
/// Instants must lie on the [`Instant::now`] timeline: relative delays
/// ([`Co::delay`](crate::Co::delay)) are turned into deadlines from it, and
/// the clock only decides when those deadlines count as passed.
pub trait Clock {
    fn now(&self) -> io::Result<Instant>;
}

/// `poll(2)` / `nanosleep(2)` backed poller.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysPoller;

impl SysPoller {
    pub fn new() -> Self {
        Self
    }
}

impl Poller for SysPoller {
    fn poll(&mut self, fds: &mut [PollFd], timeout: Duration) -> io::Result<usize> {
        let res = unsafe {
            poll(
                PollFd::as_raw_mut(fds),
                fds.len() as nfds_t,
                timeout_millis(timeout),
            )
        };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(res as usize)
    }

    fn sleep(&mut self, timeout: Duration) -> io::Result<()> {
        let span = timespec {
            tv_sec: timeout.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as libc::c_long,
        };

        let res = unsafe { libc::nanosleep(&span, std::ptr::null_mut()) };
        if res != 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(EINTR) {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            return Err(err);
        }

        Ok(())
    }
}

/// `CLOCK_MONOTONIC` via [`Instant`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> io::Result<Instant> {
        Ok(Instant::now())
    }
}

// Rounds up so a sub-millisecond remainder does not turn into a busy loop.
fn timeout_millis(timeout: Duration) -> i32 {
    let mut ms = timeout.as_millis();
    if Duration::from_millis(ms as u64) < timeout {
        ms += 1;
    }

    ms.min(i32::MAX as u128) as i32
}
