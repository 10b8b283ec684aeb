//! The fd-wait set: descriptors being polled and the units waiting on them.
//!
//! Entries live in two parallel vectors so the `PollFd` half can be handed
//! to the poller as one contiguous slice. That slice starts with the
//! reactor's wakeup descriptor, so unit `i` sits at poll slot `i + 1`.
//! Removal swaps with the last entry.

use crate::reactor::event::{Interest, PollFd};
use crate::task::{TaskRef, WeakTask, same_unit};
use crate::utils::chunk::{reserve_chunk, with_chunk};

use std::os::fd::RawFd;
use std::rc::Rc;

pub(crate) struct FdSet {
    fds: Vec<PollFd>,
    tasks: Vec<WeakTask>,
    chunk: usize,
    waker: RawFd,
}

impl FdSet {
    pub(crate) fn new(chunk: usize, waker: RawFd) -> Self {
        Self {
            fds: poll_slots(chunk, waker),
            tasks: with_chunk(chunk),
            chunk,
            waker,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn push(&mut self, task: &TaskRef, fd: RawFd, interest: Interest) {
        reserve_chunk(&mut self.fds, self.chunk);
        reserve_chunk(&mut self.tasks, self.chunk);

        self.fds.push(PollFd::new(fd, interest));
        self.tasks.push(Rc::downgrade(task));
    }

    pub(crate) fn position(&self, task: &TaskRef) -> Option<usize> {
        let target = Rc::as_ptr(task);
        self.tasks
            .iter()
            .position(|weak| same_unit(weak.as_ptr(), target))
    }

    pub(crate) fn remove(&mut self, index: usize) -> WeakTask {
        self.fds.swap_remove(index + 1);
        self.tasks.swap_remove(index)
    }

    /// The slice handed to the poller, wakeup entry first.
    pub(crate) fn poll_fds(&mut self) -> &mut [PollFd] {
        &mut self.fds
    }

    /// Removes every entry reported ready, in slot order.
    pub(crate) fn take_ready(&mut self) -> Vec<(WeakTask, Interest)> {
        let ready: Vec<usize> = self
            .fds
            .iter()
            .skip(1)
            .enumerate()
            .filter(|(_, entry)| !entry.ready().is_empty())
            .map(|(index, _)| index)
            .collect();

        // Highest index first so pending indices stay valid across swaps.
        let mut taken: Vec<(WeakTask, Interest)> = ready
            .into_iter()
            .rev()
            .map(|index| {
                let readiness = self.fds[index + 1].ready();
                (self.remove(index), readiness)
            })
            .collect();
        taken.reverse();

        taken
    }

    /// Empties the set, returning the waiting units.
    pub(crate) fn drain(&mut self) -> Vec<WeakTask> {
        let tasks = std::mem::replace(&mut self.tasks, with_chunk(self.chunk));
        self.fds = poll_slots(self.chunk, self.waker);
        tasks
    }
}

fn poll_slots(chunk: usize, waker: RawFd) -> Vec<PollFd> {
    let mut fds = with_chunk(chunk.saturating_add(1));
    fds.push(PollFd::new(waker, Interest::READABLE));
    fds
}
