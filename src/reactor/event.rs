use libc::{POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, POLLPRI, pollfd};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::os::fd::RawFd;

/// Readiness interest (when registering) or readiness report (when woken).
///
/// The bits follow the `poll(2)` event mask so a [`PollFd`] can be handed to
/// the OS without translation.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Interest(i16);

impl Interest {
    /// No interest / nothing ready.
    pub const EMPTY: Interest = Interest(0);
    /// Data available to read.
    pub const READABLE: Interest = Interest(POLLIN);
    /// Writing will not block.
    pub const WRITABLE: Interest = Interest(POLLOUT);
    /// Urgent data available.
    pub const PRIORITY: Interest = Interest(POLLPRI);
    /// Error condition (reported only).
    pub const ERROR: Interest = Interest(POLLERR);
    /// Peer hung up (reported only).
    pub const HANGUP: Interest = Interest(POLLHUP);
    /// Descriptor not open (reported only).
    pub const INVALID: Interest = Interest(POLLNVAL);

    pub const fn from_bits(bits: i16) -> Self {
        Interest(bits)
    }

    pub const fn bits(self) -> i16 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Interest) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_readable(self) -> bool {
        self.0 & POLLIN != 0
    }

    pub const fn is_writable(self) -> bool {
        self.0 & POLLOUT != 0
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Interest) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Interest, &str); 6] = [
            (Interest::READABLE, "READABLE"),
            (Interest::WRITABLE, "WRITABLE"),
            (Interest::PRIORITY, "PRIORITY"),
            (Interest::ERROR, "ERROR"),
            (Interest::HANGUP, "HANGUP"),
            (Interest::INVALID, "INVALID"),
        ];

        if self.is_empty() {
            return f.write_str("EMPTY");
        }

        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }

        Ok(())
    }
}

/// One entry of the fd-wait set, laid out exactly like `struct pollfd`.
#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct PollFd(pollfd);

impl PollFd {
    pub fn new(fd: RawFd, interest: Interest) -> Self {
        Self(pollfd {
            fd,
            events: interest.bits(),
            revents: 0,
        })
    }

    pub fn fd(&self) -> RawFd {
        self.0.fd
    }

    pub fn interest(&self) -> Interest {
        Interest(self.0.events)
    }

    /// Readiness reported by the last wait.
    pub fn ready(&self) -> Interest {
        Interest(self.0.revents)
    }

    /// Records readiness; used by pollers that do not go through the OS.
    pub fn set_ready(&mut self, ready: Interest) {
        self.0.revents = ready.bits();
    }

    pub(crate) fn as_raw_mut(slice: &mut [PollFd]) -> *mut pollfd {
        slice.as_mut_ptr() as *mut pollfd
    }
}

impl fmt::Debug for PollFd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollFd")
            .field("fd", &self.fd())
            .field("interest", &self.interest())
            .field("ready", &self.ready())
            .finish()
    }
}
