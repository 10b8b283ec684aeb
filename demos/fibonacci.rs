//! Generates Fibonacci numbers below a limit and reports how many were
//! produced.
//!
//! ```text
//! cargo run --example fibonacci -- 100
//! ```

use stackless::{Co, Domain, Resume, Routine, Step, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
enum FibonacciError {
    #[error("bad argument: limit")]
    BadLimit,
}

impl Domain for FibonacciError {
    const NAME: &'static str = "Fibonacci";

    fn kind(&self) -> u16 {
        *self as u16
    }
}

struct Fibonacci {
    limit: i64,
    prev: i64,
    cur: i64,
    n: i64,
}

#[derive(Clone, Copy, Debug)]
enum At {
    First,
    Next,
}

impl Routine for Fibonacci {
    type Value = i64;
    type Input = ();
    type Point = At;

    fn resume(&mut self, at: Resume<At>, co: &mut Co<'_, Self>) -> Step<At> {
        match at {
            Resume::Initial => {
                if self.limit < 0 {
                    return co.throw(FibonacciError::BadLimit);
                }
                self.prev = 1;
                self.cur = 1;
                return co.emit(0, At::First);
            }
            Resume::At(At::First) => self.n = 1,
            Resume::At(At::Next) => {
                self.n += 1;
                let next = self.cur + self.prev;
                self.prev = self.cur;
                self.cur = next;
            }
            Resume::Final => {
                if let Some(step) = co.rethrow() {
                    return step;
                }
                return co.complete(self.n);
            }
        }

        if self.cur < self.limit {
            co.emit(self.cur, At::Next)
        } else {
            co.exit()
        }
    }
}

fn main() {
    let limit = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(100);

    let mut fib = Task::new(Fibonacci {
        limit,
        prev: 0,
        cur: 0,
        n: 0,
    });

    for n in fib.iter() {
        println!("next: {n}");
    }

    match fib.error() {
        Some(fault) if fault.is::<FibonacciError>() => {
            println!("Fibonacci error: {fault}");
            std::process::exit(1);
        }
        Some(fault) => {
            println!("Unhandled error: {fault}");
            std::process::exit(1);
        }
        None => println!("{} numbers generated", fib.value().copied().unwrap_or(0)),
    }
}
