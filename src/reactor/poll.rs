use std::{
    io,
    os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd},
    ptr::null_mut,
    task::Waker,
};

use slab::Slab;

use events::Events;

mod events;

/// One-shot readiness registrations on top of an epoll instance.
///
/// Each registration owns a slot in `wakers`; the slot key travels through
/// epoll as the event's user data. A descriptor that fires is disabled by
/// `EPOLLONESHOT` until [Poll::rearm] is called for it.
pub struct Poll {
    epoll: Option<OwnedFd>,
    wakers: Slab<Waker>,
    events: Events,
}

fn ctl(epoll: RawFd, op: libc::c_int, fd: BorrowedFd<'_>, key: usize) -> io::Result<()> {
    let mut event = libc::epoll_event {
        events: (libc::EPOLLIN | libc::EPOLLONESHOT) as u32,
        u64: key as u64,
    };

    let ret = unsafe { libc::epoll_ctl(epoll, op, fd.as_raw_fd(), &mut event) };

    if ret == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

impl Poll {
    pub const fn new() -> Self {
        Self {
            epoll: None,
            wakers: Slab::new(),
            events: Events::new(),
        }
    }

    fn epoll_fd(&mut self) -> io::Result<RawFd> {
        if let Some(epoll) = &self.epoll {
            return Ok(epoll.as_raw_fd());
        }

        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };

        if fd == -1 {
            return Err(io::Error::last_os_error());
        }

        let epoll = unsafe { OwnedFd::from_raw_fd(fd) };
        let raw = epoll.as_raw_fd();
        self.epoll = Some(epoll);

        Ok(raw)
    }

    pub fn register(&mut self, fd: BorrowedFd<'_>, waker: Waker) -> io::Result<usize> {
        let epoll = self.epoll_fd()?;
        let key = self.wakers.insert(waker);

        if let Err(e) = ctl(epoll, libc::EPOLL_CTL_ADD, fd, key) {
            self.wakers.remove(key);
            return Err(e);
        }

        Ok(key)
    }

    pub fn rearm(&mut self, fd: BorrowedFd<'_>, key: usize, waker: Waker) -> io::Result<()> {
        let epoll = self.epoll_fd()?;

        match self.wakers.get_mut(key) {
            Some(slot) => *slot = waker,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    "reactor registration no longer exists",
                ))
            }
        }

        ctl(epoll, libc::EPOLL_CTL_MOD, fd, key)
    }

    pub fn deregister(&mut self, fd: BorrowedFd<'_>, key: usize) {
        if let Some(epoll) = &self.epoll {
            // The descriptor may already be closed; there is nothing to undo then.
            unsafe {
                libc::epoll_ctl(
                    epoll.as_raw_fd(),
                    libc::EPOLL_CTL_DEL,
                    fd.as_raw_fd(),
                    null_mut(),
                )
            };
        }

        self.wakers.try_remove(key);
    }

    pub fn is_idle(&self) -> bool {
        self.wakers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.wakers.len()
    }

    /// Block until something registered becomes ready, returning the wakers
    /// that should be notified.
    pub fn wait(&mut self) -> io::Result<Vec<Waker>> {
        let Some(epoll) = &self.epoll else {
            return Ok(Vec::new());
        };

        let wakers = &self.wakers;

        Ok(self
            .events
            .wait(epoll)?
            .filter_map(|key| wakers.get(key as usize).cloned())
            .collect())
    }
}
