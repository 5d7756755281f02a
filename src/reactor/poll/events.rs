use std::{
    io,
    mem::MaybeUninit,
    os::fd::{AsFd, AsRawFd},
};

const MAX_NUM_EVENTS: usize = 512;

pub struct Events {
    inner: [MaybeUninit<libc::epoll_event>; MAX_NUM_EVENTS],
}

impl Events {
    pub const fn new() -> Self {
        Self {
            inner: [MaybeUninit::uninit(); MAX_NUM_EVENTS],
        }
    }

    /// Block until at least one registered descriptor is ready and yield the
    /// `u64` user data of every event that fired.
    pub fn wait(&mut self, epoll: impl AsFd) -> io::Result<impl Iterator<Item = u64> + '_> {
        let n = unsafe {
            libc::epoll_wait(
                epoll.as_fd().as_raw_fd(),
                self.inner.as_mut_ptr() as *mut _,
                MAX_NUM_EVENTS as i32,
                -1,
            )
        };

        if n == -1 {
            return Err(io::Error::last_os_error());
        }

        Ok(self.inner.iter().take(n as usize).map(|x| {
            let event = unsafe { x.assume_init() };
            event.u64
        }))
    }
}
