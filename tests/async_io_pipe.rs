mod common;

use common::{close, pipe, reader, write_all};
use stackless::{Progress, Reactor};
use std::time::Duration;

#[test]
fn test_reader_drains_pipe_through_reactor() {
    let (rfd, wfd) = pipe();
    write_all(wfd, b"hello");
    close(wfd);

    let unit = reader(rfd);
    let mut reactor = Reactor::new();
    reactor.add_async(&unit);
    assert_eq!(reactor.awaiting_fds(), 1);

    reactor.run().unwrap();
    close(rfd);

    let task = unit.borrow();
    assert!(task.is_done());
    assert!(task.error().is_none());
    assert_eq!(task.locals().data, b"hello");
    assert_eq!(task.value(), Some(&5));
    assert_eq!(task.locals().finals, 1);
}

#[test]
fn test_reader_wakes_when_writer_thread_writes() {
    let (rfd, wfd) = pipe();

    let unit = reader(rfd);
    let mut reactor = Reactor::new();
    reactor.add_async(&unit);

    let writer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        write_all(wfd, b"ping");
        std::thread::sleep(Duration::from_millis(20));
        write_all(wfd, b"pong");
        close(wfd);
    });

    reactor.run().unwrap();
    writer.join().unwrap();
    close(rfd);

    let task = unit.borrow();
    assert!(task.is_done());
    assert_eq!(task.locals().data, b"pingpong");
}

#[test]
fn test_many_readers_share_one_cycle() {
    let pipes: Vec<_> = (0..8).map(|_| pipe()).collect();
    let units: Vec<_> = pipes.iter().map(|&(rfd, _)| reader(rfd)).collect();

    let mut reactor = Reactor::new();
    for unit in &units {
        reactor.add_async(unit);
    }
    for (i, &(_, wfd)) in pipes.iter().enumerate() {
        write_all(wfd, &[b'0' + i as u8]);
        close(wfd);
    }

    reactor.run().unwrap();

    for (i, unit) in units.iter().enumerate() {
        assert!(unit.is_done());
        assert_eq!(unit.borrow().locals().data, vec![b'0' + i as u8]);
    }
    for &(rfd, _) in &pipes {
        close(rfd);
    }
}

#[test]
fn test_blocking_exec_reads_pipe() {
    let (rfd, wfd) = pipe();
    write_all(wfd, b"sync");
    close(wfd);

    let unit = reader(rfd);
    stackless::exec(&mut *unit.borrow_mut()).unwrap();
    close(rfd);

    assert!(unit.is_done());
    assert_eq!(unit.borrow().locals().data, b"sync");
    assert_eq!(unit.advance(), Progress::Stalled);
}
