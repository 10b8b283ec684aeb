#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::{Duration, Instant};

use stackless::{
    Clock, Co, Domain, Handle, Interest, Job, PollFd, Poller, Resume, Routine, Step, Task,
};

// ---------------------------------------------------------------------------
// Fibonacci generator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FiboError {
    #[error("fibo: unlucky number")]
    Unlucky,
}

impl Domain for FiboError {
    const NAME: &'static str = "Fibo";

    fn kind(&self) -> u16 {
        *self as u16
    }
}

/// Yields the first `count` Fibonacci numbers and returns the next one.
pub struct Fibo {
    pub count: u32,
    pub fail_at: Option<u32>,
    pub finals: u32,
    a: u64,
    b: u64,
    n: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FiboAt {
    Next,
}

impl Routine for Fibo {
    type Value = u64;
    type Input = ();
    type Point = FiboAt;

    fn resume(&mut self, at: Resume<FiboAt>, co: &mut Co<'_, Self>) -> Step<FiboAt> {
        match at {
            Resume::Initial => {
                self.a = 0;
                self.b = 1;
                self.n = 0;
            }
            Resume::At(FiboAt::Next) => {
                let next = self.a + self.b;
                self.a = self.b;
                self.b = next;
                self.n += 1;
            }
            Resume::Final => {
                self.finals += 1;
                if let Some(step) = co.rethrow() {
                    return step;
                }
                return co.complete(self.a);
            }
        }

        if self.fail_at == Some(self.n) {
            return co.throw(FiboError::Unlucky);
        }
        if self.n >= self.count {
            return co.exit();
        }
        co.emit(self.a, FiboAt::Next)
    }
}

pub fn fibo(count: u32) -> Task<Fibo> {
    Task::new(Fibo {
        count,
        fail_at: None,
        finals: 0,
        a: 0,
        b: 0,
        n: 0,
    })
}

pub fn failing_fibo(count: u32, fail_at: u32) -> Task<Fibo> {
    let mut task = fibo(count);
    task.locals_mut().fail_at = Some(fail_at);
    task
}

// ---------------------------------------------------------------------------
// Relay: re-emits a child's values and finishes it on the way out
// ---------------------------------------------------------------------------

pub struct Relay<C: Routine> {
    pub child: Task<C>,
    pub handle: bool,
    pub finals: u32,
}

#[derive(Clone, Copy, Debug)]
pub enum RelayAt {
    Pump,
    Closing,
}

impl<C: Routine> Relay<C> {
    pub fn new(child: Task<C>) -> Self {
        Self {
            child,
            handle: false,
            finals: 0,
        }
    }

    fn close(&mut self, co: &mut Co<'_, Self>) -> Step<RelayAt> {
        if let Some(step) = co.finish_exec(&mut self.child, RelayAt::Closing) {
            return step;
        }
        if self.handle && co.catch::<FiboError>().is_some() {
            return co.handled();
        }
        co.exit()
    }
}

impl<C: Routine> Routine for Relay<C> {
    type Value = C::Value;
    type Input = ();
    type Point = RelayAt;

    fn resume(&mut self, at: Resume<RelayAt>, co: &mut Co<'_, Self>) -> Step<RelayAt> {
        match at {
            Resume::Initial | Resume::At(RelayAt::Pump) => {
                if let Some(step) = co.yields(&mut self.child, RelayAt::Pump) {
                    return step;
                }
                co.exit()
            }
            Resume::Final => {
                self.finals += 1;
                self.close(co)
            }
            Resume::At(RelayAt::Closing) => self.close(co),
        }
    }
}

// ---------------------------------------------------------------------------
// Sleeper: waits on a timer, optionally lingers during finalization
// ---------------------------------------------------------------------------

pub type Log = Rc<RefCell<Vec<&'static str>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub struct Sleeper {
    pub name: &'static str,
    pub delay: Duration,
    pub linger: Option<Duration>,
    pub log: Log,
    pub woke_at: Option<Instant>,
    pub finals: u32,
}

#[derive(Clone, Copy, Debug)]
pub enum SleepAt {
    Woke,
    Lingered,
}

impl Routine for Sleeper {
    type Value = ();
    type Input = ();
    type Point = SleepAt;

    fn resume(&mut self, at: Resume<SleepAt>, co: &mut Co<'_, Self>) -> Step<SleepAt> {
        match at {
            Resume::Initial => co.delay(self.delay, SleepAt::Woke),
            Resume::At(SleepAt::Woke) => {
                self.woke_at = Some(Instant::now());
                self.log.borrow_mut().push(self.name);
                co.exit()
            }
            Resume::Final => {
                self.finals += 1;
                match self.linger {
                    Some(linger) => co.delay(linger, SleepAt::Lingered),
                    None => co.exit(),
                }
            }
            Resume::At(SleepAt::Lingered) => co.exit(),
        }
    }
}

pub fn sleeper(name: &'static str, delay: Duration, log: &Log) -> Handle<Sleeper> {
    Handle::new(Sleeper {
        name,
        delay,
        linger: None,
        log: log.clone(),
        woke_at: None,
        finals: 0,
    })
}

// ---------------------------------------------------------------------------
// Pipe reader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("error: read")]
    Read,
}

impl Domain for ReadError {
    const NAME: &'static str = "ReadFile";

    fn kind(&self) -> u16 {
        *self as u16
    }
}

/// Reads `fd` until end of file, yielding each chunk size and returning the
/// total number of bytes.
pub struct PipeReader {
    pub fd: RawFd,
    pub data: Vec<u8>,
    pub finals: u32,
}

#[derive(Clone, Copy, Debug)]
pub enum ReadAt {
    Readable,
    Again,
}

impl Routine for PipeReader {
    type Value = usize;
    type Input = ();
    type Point = ReadAt;

    fn resume(&mut self, at: Resume<ReadAt>, co: &mut Co<'_, Self>) -> Step<ReadAt> {
        match at {
            Resume::Initial | Resume::At(ReadAt::Again) => {
                co.await_fd(self.fd, Interest::READABLE, ReadAt::Readable)
            }
            Resume::At(ReadAt::Readable) => {
                let mut buf = [0u8; 64];
                let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut _, buf.len()) };
                if n < 0 {
                    return co.throw(ReadError::Read);
                }
                if n == 0 {
                    return co.complete(self.data.len());
                }

                let n = n as usize;
                self.data.extend_from_slice(&buf[..n]);
                co.emit(n, ReadAt::Again)
            }
            Resume::Final => {
                self.finals += 1;
                if let Some(step) = co.rethrow() {
                    return step;
                }
                co.exit()
            }
        }
    }
}

pub fn reader(fd: RawFd) -> Handle<PipeReader> {
    Handle::new(PipeReader {
        fd,
        data: Vec::new(),
        finals: 0,
    })
}

/// Opens a pipe, returning `(read_end, write_end)`.
pub fn pipe() -> (RawFd, RawFd) {
    let mut fds = [0i32; 2];
    let res = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(res, 0, "pipe() failed");
    (fds[0], fds[1])
}

pub fn write_all(fd: RawFd, bytes: &[u8]) {
    let wrote = unsafe { libc::write(fd, bytes.as_ptr() as *const _, bytes.len()) };
    assert_eq!(wrote, bytes.len() as isize);
}

pub fn close(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

// ---------------------------------------------------------------------------
// Supervisor: spawns a child, then steers it with job control
// ---------------------------------------------------------------------------

pub struct Supervisor<C: Routine + 'static> {
    pub child: Handle<C>,
    pub after: Duration,
    pub job: Job,
    pub bulk: bool,
}

#[derive(Clone, Copy, Debug)]
pub enum SuperAt {
    Spawned,
    Waited,
    Hit,
}

impl<C: Routine + 'static> Routine for Supervisor<C> {
    type Value = ();
    type Input = ();
    type Point = SuperAt;

    fn resume(&mut self, at: Resume<SuperAt>, co: &mut Co<'_, Self>) -> Step<SuperAt> {
        match at {
            Resume::Initial => co.spawn(&self.child, SuperAt::Spawned),
            Resume::At(SuperAt::Spawned) => co.delay(self.after, SuperAt::Waited),
            Resume::At(SuperAt::Waited) if self.bulk => co.hit_all_jobs(self.job, SuperAt::Hit),
            Resume::At(SuperAt::Waited) => co.hit_job(&self.child, self.job, SuperAt::Hit),
            Resume::At(SuperAt::Hit) | Resume::Final => co.exit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Test doubles for the reactor's capabilities
// ---------------------------------------------------------------------------

pub enum Script {
    /// Report the listed descriptors ready.
    Ready(Vec<(RawFd, Interest)>),
    Interrupted,
    Fail(i32),
}

/// Poller replaying a fixed sequence of outcomes.
pub struct ScriptedPoller {
    script: VecDeque<Script>,
    pub timeouts: Vec<Duration>,
    pub sleeps: Vec<Duration>,
}

impl ScriptedPoller {
    pub fn new(script: impl IntoIterator<Item = Script>) -> Self {
        Self {
            script: script.into_iter().collect(),
            timeouts: Vec::new(),
            sleeps: Vec::new(),
        }
    }
}

impl Poller for ScriptedPoller {
    fn poll(&mut self, fds: &mut [PollFd], timeout: Duration) -> io::Result<usize> {
        self.timeouts.push(timeout);
        match self.script.pop_front() {
            Some(Script::Ready(events)) => {
                let mut ready = 0;
                for entry in fds.iter_mut() {
                    if let Some((_, interest)) = events.iter().find(|(fd, _)| *fd == entry.fd()) {
                        entry.set_ready(*interest);
                        ready += 1;
                    }
                }
                Ok(ready)
            }
            Some(Script::Interrupted) => Err(io::ErrorKind::Interrupted.into()),
            Some(Script::Fail(errno)) => Err(io::Error::from_raw_os_error(errno)),
            None => Err(io::Error::other("poll script exhausted")),
        }
    }

    fn sleep(&mut self, timeout: Duration) -> io::Result<()> {
        self.sleeps.push(timeout);
        Ok(())
    }
}

/// Clock that cannot be read.
pub struct FailingClock;

impl Clock for FailingClock {
    fn now(&self) -> io::Result<Instant> {
        Err(io::Error::from_raw_os_error(libc::EINVAL))
    }
}

/// Clock running a fixed offset ahead of the real monotonic clock.
pub struct AheadClock(pub Duration);

impl Clock for AheadClock {
    fn now(&self) -> io::Result<Instant> {
        Ok(Instant::now() + self.0)
    }
}
