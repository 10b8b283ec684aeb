//! Cross-thread and signal-handler entry point into a reactor.
//!
//! A [`ReactorHandle`] posts a bulk job-control command; the reactor picks it
//! up at the start of its next cycle and applies it with `hit_all_jobs`.
//! Posting stores the command in an atomic slot and writes one byte to a
//! non-blocking wakeup pipe whose read end is part of every readiness wait,
//! so a reactor blocked in `poll` starts a new cycle right away. Both steps
//! are async-signal-safe.
//!
//! ```ignore
//! let mut reactor = Reactor::new();
//! let handle = reactor.handle();
//!
//! std::thread::spawn(move || {
//!     std::thread::sleep(Duration::from_secs(5));
//!     handle.hit_all_jobs(Job::Finish);
//! });
//!
//! reactor.run()?;
//! ```

use crate::reactor::job::Job;

use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicI8, Ordering};
use tracing::warn;

const EMPTY: i8 = i8::MIN;

pub(crate) struct Mailbox {
    pending: AtomicI8,
    // (read end, write end)
    wake: Option<(RawFd, RawFd)>,
}

impl Mailbox {
    pub(crate) fn new() -> Self {
        let wake = match wake_pipe() {
            Ok(pipe) => Some(pipe),
            Err(err) => {
                warn!(%err, "no wakeup pipe; posted jobs wait for the current cycle to end");
                None
            }
        };

        Self {
            pending: AtomicI8::new(EMPTY),
            wake,
        }
    }

    pub(crate) fn post(&self, job: Job) {
        self.pending.store(job.code(), Ordering::SeqCst);

        if let Some((_, tx)) = self.wake {
            let byte = 1u8;
            // A full pipe already holds an unread wakeup.
            unsafe { libc::write(tx, &byte as *const u8 as *const libc::c_void, 1) };
        }
    }

    /// Takes the pending command, if any.
    pub(crate) fn take(&self) -> Option<Job> {
        self.drain_wakeups();
        Job::from_code(self.pending.swap(EMPTY, Ordering::SeqCst))
    }

    /// Read end of the wakeup pipe, `-1` without one (`poll` skips it).
    pub(crate) fn wake_fd(&self) -> RawFd {
        self.wake.map_or(-1, |(rx, _)| rx)
    }

    fn drain_wakeups(&self) {
        let Some((rx, _)) = self.wake else {
            return;
        };

        let mut buf = [0u8; 64];
        loop {
            let n = unsafe { libc::read(rx, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n < buf.len() as isize {
                break;
            }
        }
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        if let Some((rx, tx)) = self.wake.take() {
            unsafe {
                libc::close(rx);
                libc::close(tx);
            }
        }
    }
}

fn wake_pipe() -> io::Result<(RawFd, RawFd)> {
    let mut fds = [0 as RawFd; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }

    for fd in fds {
        let ok = unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            flags >= 0
                && libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) == 0
                && libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) == 0
        };
        if !ok {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fds[0]);
                libc::close(fds[1]);
            }
            return Err(err);
        }
    }

    Ok((fds[0], fds[1]))
}

/// Cloneable, `Send + Sync` handle posting bulk commands to one reactor.
#[derive(Clone)]
pub struct ReactorHandle {
    mailbox: Arc<Mailbox>,
}

impl ReactorHandle {
    pub(crate) fn new(mailbox: Arc<Mailbox>) -> Self {
        Self { mailbox }
    }

    /// Requests `job` for every tracked unit and wakes the reactor. A later
    /// request replaces an undelivered earlier one.
    pub fn hit_all_jobs(&self, job: Job) {
        self.mailbox.post(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::event::{Interest, PollFd};
    use crate::reactor::poller::{Poller, SysPoller};
    use std::time::Duration;

    #[test]
    fn latest_request_wins_and_is_taken_once() {
        let mailbox = Arc::new(Mailbox::new());
        let handle = ReactorHandle::new(mailbox.clone());

        assert_eq!(mailbox.take(), None);

        handle.hit_all_jobs(Job::Finish);
        handle.clone().hit_all_jobs(Job::Kill);

        assert_eq!(mailbox.take(), Some(Job::Kill));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn posting_makes_the_wake_fd_readable_until_taken() {
        let mailbox = Mailbox::new();
        let wake = mailbox.wake_fd();
        assert!(wake >= 0);

        let mut poller = SysPoller::new();
        let mut fds = [PollFd::new(wake, Interest::READABLE)];
        assert_eq!(poller.poll(&mut fds, Duration::ZERO).unwrap(), 0);

        for _ in 0..100 {
            mailbox.post(Job::Halt);
        }
        assert_eq!(poller.poll(&mut fds, Duration::ZERO).unwrap(), 1);
        assert!(fds[0].ready().is_readable());

        assert_eq!(mailbox.take(), Some(Job::Halt));
        fds[0].set_ready(Interest::EMPTY);
        assert_eq!(poller.poll(&mut fds, Duration::ZERO).unwrap(), 0);
    }

    #[test]
    fn handle_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReactorHandle>();
    }
}
