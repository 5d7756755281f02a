use std::{cell::RefCell, io, os::fd::BorrowedFd, task::Waker};

use log::{error, trace};
use poll::Poll;

mod poll;

pub(crate) struct Reactor {}

thread_local! {
    static REACTOR: RefCell<Poll> = const { RefCell::new(Poll::new()) };
}

impl Reactor {
    /// Wake `waker` once `fd` becomes readable. The returned key identifies
    /// the registration for [Reactor::rearm] and [Reactor::deregister].
    pub fn register(fd: BorrowedFd<'_>, waker: Waker) -> io::Result<usize> {
        REACTOR.with(|r| r.borrow_mut().register(fd, waker))
    }

    pub fn rearm(fd: BorrowedFd<'_>, key: usize, waker: Waker) -> io::Result<()> {
        REACTOR.with(|r| r.borrow_mut().rearm(fd, key, waker))
    }

    pub fn deregister(fd: BorrowedFd<'_>, key: usize) {
        // Futures dropped during thread teardown can outlive the reactor.
        let _ = REACTOR.try_with(|r| r.borrow_mut().deregister(fd, key));
    }

    /// Block until at least one registration fires and wake the associated
    /// tasks. Returns `false` if nothing is registered, in which case no
    /// wakeup can ever arrive.
    pub fn react() -> bool {
        let wakers = REACTOR.with(|r| {
            let mut r = r.borrow_mut();

            if r.is_idle() {
                return None;
            }

            trace!("reactor waiting on {} registrations", r.len());

            Some(r.wait())
        });

        match wakers {
            None => false,
            Some(Ok(wakers)) => {
                for waker in wakers {
                    waker.wake();
                }
                true
            }
            Some(Err(e)) if e.kind() == io::ErrorKind::Interrupted => true,
            Some(Err(e)) => {
                error!("reactor wait failed: {e}");
                false
            }
        }
    }
}
