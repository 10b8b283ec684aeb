//! Fluent builder for Reactor construction.
//!
//! Every setting has a default, so `ReactorBuilder::new().build()` is what
//! [`Reactor::new`] does.

use crate::reactor::core::{DEFAULT_MAX_WAIT, Reactor};
use crate::reactor::poller::{Clock, MonotonicClock, Poller, SysPoller};
use crate::utils::chunk::default_chunk;

use std::time::Duration;

/// Builder for [`Reactor`] instances.
///
/// # Example
/// ```ignore
/// let reactor = ReactorBuilder::new()
///     .growth_chunk(64)
///     .max_wait(Duration::from_secs(5))
///     .build();
/// ```
pub struct ReactorBuilder<P: Poller = SysPoller, C: Clock = MonotonicClock> {
    growth_chunk: Option<usize>,
    max_wait: Duration,
    poller: P,
    clock: C,
}

impl Default for ReactorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactorBuilder {
    pub fn new() -> Self {
        Self {
            growth_chunk: None,
            max_wait: DEFAULT_MAX_WAIT,
            poller: SysPoller,
            clock: MonotonicClock,
        }
    }
}

impl<P: Poller, C: Clock> ReactorBuilder<P, C> {
    /// Number of entries the wait sets grow by when full.
    ///
    /// Defaults to the OS page size. Zero is treated as one.
    pub fn growth_chunk(mut self, entries: usize) -> Self {
        self.growth_chunk = Some(entries.max(1));
        self
    }

    /// Upper bound of a single readiness wait.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Replaces the readiness primitive.
    pub fn poller<Q: Poller>(self, poller: Q) -> ReactorBuilder<Q, C> {
        ReactorBuilder {
            growth_chunk: self.growth_chunk,
            max_wait: self.max_wait,
            poller,
            clock: self.clock,
        }
    }

    /// Replaces the monotonic clock.
    pub fn clock<D: Clock>(self, clock: D) -> ReactorBuilder<P, D> {
        ReactorBuilder {
            growth_chunk: self.growth_chunk,
            max_wait: self.max_wait,
            poller: self.poller,
            clock,
        }
    }

    pub fn build(self) -> Reactor<P, C> {
        let chunk = self.growth_chunk.unwrap_or_else(default_chunk);
        tracing::debug!(chunk, max_wait = ?self.max_wait, "building reactor");

        Reactor::from_parts(self.poller, self.clock, self.max_wait, chunk)
    }
}
