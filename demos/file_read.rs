//! Reads a file chunk by chunk through the reactor while two background jobs
//! print on their own timers. Ctrl-C finishes every tracked job, letting each
//! one run its finalization; a second Ctrl-C kills whatever is left.
//!
//! ```text
//! cargo run --example file_read -- Cargo.toml
//! ```

use stackless::{Co, Domain, Handle, Interest, Job, Pull, Reactor, ReactorHandle, Resume, Routine, Step, Task};

use std::ffi::CString;
use std::io;
use std::os::fd::RawFd;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const CHUNK_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
enum ReadFileError {
    #[error("error: open")]
    Open,
    #[error("error: read")]
    Read,
    #[error("error: poll: not ready for reading")]
    Poll,
}

impl Domain for ReadFileError {
    const NAME: &'static str = "ReadFile";

    fn kind(&self) -> u16 {
        *self as u16
    }
}

// Yields the chunks read from a non-blocking descriptor.
struct ReadFd {
    fd: RawFd,
    buf: Vec<u8>,
}

#[derive(Clone, Copy, Debug)]
enum FdAt {
    Read,
    Readable,
}

impl ReadFd {
    fn read(&mut self, co: &mut Co<'_, Self>) -> Step<FdAt> {
        let n = unsafe { libc::read(self.fd, self.buf.as_mut_ptr() as *mut _, self.buf.len()) };
        match n {
            0 => co.complete(Vec::new()),
            n if n < 0 => {
                if io::Error::last_os_error().kind() == io::ErrorKind::WouldBlock {
                    return co.await_fd(self.fd, Interest::READABLE, FdAt::Readable);
                }
                co.throw(ReadFileError::Read)
            }
            n => co.emit(self.buf[..n as usize].to_vec(), FdAt::Read),
        }
    }
}

impl Routine for ReadFd {
    type Value = Vec<u8>;
    type Input = ();
    type Point = FdAt;

    fn resume(&mut self, at: Resume<FdAt>, co: &mut Co<'_, Self>) -> Step<FdAt> {
        match at {
            Resume::Initial => {
                self.buf = vec![0; CHUNK_SIZE];
                self.read(co)
            }
            Resume::At(FdAt::Read) => self.read(co),
            Resume::At(FdAt::Readable) => {
                if !co.ready().is_readable() && !co.ready().contains(Interest::HANGUP) {
                    return co.throw(ReadFileError::Poll);
                }
                self.read(co)
            }
            Resume::Final => {
                self.buf = Vec::new();
                co.exit()
            }
        }
    }
}

struct ReadFile {
    path: CString,
    fd: RawFd,
    chunks: Task<ReadFd>,
}

#[derive(Clone, Copy, Debug)]
enum FileAt {
    Chunk,
}

impl Routine for ReadFile {
    type Value = Vec<u8>;
    type Input = ();
    type Point = FileAt;

    fn resume(&mut self, at: Resume<FileAt>, co: &mut Co<'_, Self>) -> Step<FileAt> {
        match at {
            Resume::Initial => {
                self.fd = unsafe { libc::open(self.path.as_ptr(), libc::O_RDONLY | libc::O_NONBLOCK) };
                if self.fd == -1 {
                    return co.throw(ReadFileError::Open);
                }
                self.chunks.locals_mut().fd = self.fd;
            }
            Resume::At(FileAt::Chunk) => {}
            Resume::Final => {
                if self.fd >= 0 {
                    unsafe { libc::close(self.fd) };
                    self.fd = -1;
                }
                return co.exit();
            }
        }

        if let Some(step) = co.yields(&mut self.chunks, FileAt::Chunk) {
            return step;
        }
        co.exit()
    }
}

// Prints `spam` every `delay`, `n` times; takes a second to wind down.
struct BackgroundJob {
    n: u32,
    delay: Duration,
    spam: &'static str,
    i: u32,
}

#[derive(Clone, Copy, Debug)]
enum JobAt {
    Tick,
    Finished,
}

impl Routine for BackgroundJob {
    type Value = ();
    type Input = ();
    type Point = JobAt;

    fn resume(&mut self, at: Resume<JobAt>, co: &mut Co<'_, Self>) -> Step<JobAt> {
        match at {
            Resume::Initial => self.i = 0,
            Resume::At(JobAt::Tick) => {
                println!("{}", self.spam);
                self.i += 1;
            }
            Resume::Final => {
                println!("job {} finishing...", self.spam);
                return co.delay(Duration::from_secs(1), JobAt::Finished);
            }
            Resume::At(JobAt::Finished) => {
                println!("job {} finished!", self.spam);
                return co.exit();
            }
        }

        if self.i < self.n {
            co.delay(self.delay, JobAt::Tick)
        } else {
            co.exit()
        }
    }
}

struct Main {
    file: Task<ReadFile>,
    jobs: [Handle<BackgroundJob>; 2],
    bytes: usize,
    lines: usize,
}

#[derive(Clone, Copy, Debug)]
enum MainAt {
    Spawned,
    Read,
}

impl Routine for Main {
    type Value = ();
    type Input = ();
    type Point = MainAt;

    fn resume(&mut self, at: Resume<MainAt>, co: &mut Co<'_, Self>) -> Step<MainAt> {
        match at {
            Resume::Initial => {
                println!("hello ----");
                return co.spawn(&self.jobs[0], MainAt::Spawned);
            }
            Resume::At(MainAt::Spawned) => return co.spawn(&self.jobs[1], MainAt::Read),
            Resume::At(MainAt::Read) => {}
            Resume::Final => {
                if let Some(fault) = co.error() {
                    println!("{}: {fault}", fault.domain());
                }
                return co.exit();
            }
        }

        loop {
            match co.pull(&mut self.file, MainAt::Read) {
                Pull::Ready => {
                    if let Some(chunk) = self.file.take_value() {
                        self.bytes += chunk.len();
                        self.lines += chunk.iter().filter(|&&b| b == b'\n').count();
                    }
                }
                Pull::Pending(step) => return step,
                Pull::Done => break,
            }
        }

        if let Some(step) = co.throws(&self.file) {
            return step;
        }
        println!("---- {} bytes, {} lines", self.bytes, self.lines);
        co.exit()
    }
}

static INTERRUPT: OnceLock<ReactorHandle> = OnceLock::new();
static FORCE: AtomicBool = AtomicBool::new(false);

// First signal asks every job to finish, the next one kills them.
extern "C" fn on_interrupt(_: libc::c_int) {
    let Some(handle) = INTERRUPT.get() else {
        return;
    };

    if FORCE.swap(true, Ordering::SeqCst) {
        handle.hit_all_jobs(Job::Kill);
    } else {
        handle.hit_all_jobs(Job::Finish);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "Cargo.toml".into());

    let mut reactor = Reactor::new();
    let _ = INTERRUPT.set(reactor.handle());
    unsafe {
        libc::signal(libc::SIGINT, on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t);
    }

    let main = Handle::new(Main {
        file: Task::new(ReadFile {
            path: CString::new(path)?,
            fd: -1,
            chunks: Task::new(ReadFd {
                fd: -1,
                buf: Vec::new(),
            }),
        }),
        jobs: [
            Handle::new(BackgroundJob {
                n: 1,
                delay: Duration::from_secs(10),
                spam: "spam",
                i: 0,
            }),
            Handle::new(BackgroundJob {
                n: 20,
                delay: Duration::from_millis(300),
                spam: ".",
                i: 0,
            }),
        ],
        bytes: 0,
        lines: 0,
    });

    reactor.add_async(&main);
    let resumed = reactor.run()?;
    println!("reactor drained after {resumed} resumptions");

    Ok(())
}
