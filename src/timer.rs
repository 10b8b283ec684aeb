//! Timer set of the reactor.
//!
//! Stores `(unit, deadline)` pairs for units suspended on a timer and answers
//! the two questions the run loop asks: when is the earliest deadline, and
//! which units have expired by now.

use crate::task::{TaskRef, WeakTask, same_unit};
use crate::utils::chunk::{reserve_chunk, with_chunk};

use std::rc::Rc;
use std::time::{Duration, Instant};

pub(crate) struct Delay {
    pub(crate) task: WeakTask,
    pub(crate) until: Instant,
}

pub(crate) struct TimerSet {
    delays: Vec<Delay>,
    chunk: usize,
}

impl TimerSet {
    pub(crate) fn new(chunk: usize) -> Self {
        Self {
            delays: with_chunk(chunk),
            chunk,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.delays.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Registers `task` to be resumed once `until` has passed.
    pub(crate) fn push(&mut self, task: &TaskRef, until: Instant) {
        reserve_chunk(&mut self.delays, self.chunk);
        self.delays.push(Delay {
            task: Rc::downgrade(task),
            until,
        });
    }

    pub(crate) fn position(&self, task: &TaskRef) -> Option<usize> {
        let target = Rc::as_ptr(task);
        self.delays
            .iter()
            .position(|delay| same_unit(delay.task.as_ptr(), target))
    }

    // Shifts instead of swapping so entries stay in registration order.
    pub(crate) fn remove(&mut self, index: usize) -> Delay {
        self.delays.remove(index)
    }

    pub(crate) fn earliest(&self) -> Option<Instant> {
        self.delays.iter().map(|delay| delay.until).min()
    }

    /// Time left until the earliest deadline, zero if already passed.
    pub(crate) fn next_remaining(&self, now: Instant) -> Option<Duration> {
        self.earliest()
            .map(|until| until.saturating_duration_since(now))
    }

    /// Removes every expired entry, earliest deadline first. Entries sharing
    /// a deadline come out in registration order.
    pub(crate) fn take_expired(&mut self, now: Instant) -> Vec<Delay> {
        let mut expired = Vec::new();
        let mut kept = Vec::with_capacity(self.delays.capacity());
        for delay in self.delays.drain(..) {
            if delay.until <= now {
                expired.push(delay);
            } else {
                kept.push(delay);
            }
        }
        self.delays = kept;

        expired.sort_by_key(|delay| delay.until);
        expired
    }

    /// Empties the set, returning the waiting entries.
    pub(crate) fn drain(&mut self) -> Vec<Delay> {
        std::mem::replace(&mut self.delays, with_chunk(self.chunk))
    }
}
