//! Async timer related futures.
//!
//! This module uses the Linux kernel's
//! [timerfd](https://man7.org/linux/man-pages/man2/timerfd_create.2.html)
//! facility to implement asynchronous timers. The main use-case for this is to
//! put a task to sleep for a specific period of time, which is how the rest of
//! the crate simulates latency.
//!
//! # Example
//! Let's put a task to sleep for 200 milliseconds.
//! ```
//! use settle::futures::timer::Timer;
//! use settle::task::Executor;
//! use std::time::{Duration, Instant};
//!# Executor::block_on(
//! async {
//!     let now = Instant::now();
//!
//!     Timer::sleep(Duration::from_millis(200))?.await;
//!
//!     assert!(now.elapsed() >= Duration::from_millis(200));
//!#     Ok::<(), std::io::Error>(())
//! }
//!# ).unwrap();
//! ```

use std::{
    future::Future,
    io::{self, Result},
    os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd},
    pin::Pin,
    ptr::null_mut,
    task::{Context, Poll, Waker},
    time::{Duration, Instant},
};

use libc::{CLOCK_MONOTONIC, TFD_CLOEXEC, TFD_NONBLOCK};
use log::warn;

use crate::{reactor::Reactor, task::yield_now};

/// The longest single arming of a timer descriptor. Longer sleeps re-arm
/// when it fires.
const MAX_ARM: Duration = Duration::from_secs(i32::MAX as u64);

/// Asynchronous timer.
///
/// This structure is a future that will expire at some point in the future. It
/// can be obtained via the [Timer::sleep] function.
pub struct Timer {
    // `None` when the deadline lies beyond what `Instant` can represent.
    expiration: Option<Instant>,
    fd: OwnedFd,
    registration: Option<usize>,
}

impl Timer {
    fn compute_tspec(&self) -> libc::itimerspec {
        // A zero `it_value` would disarm the timer rather than fire it.
        let remaining = self
            .expiration
            .map_or(MAX_ARM, |expiration| {
                expiration.saturating_duration_since(Instant::now())
            })
            .clamp(Duration::from_nanos(1), MAX_ARM);
        let mut tspec = unsafe { std::mem::zeroed::<libc::itimerspec>() };

        tspec.it_value.tv_sec = remaining.as_secs() as _;
        tspec.it_value.tv_nsec = remaining.subsec_nanos() as _;

        tspec
    }

    fn schedule(&mut self, waker: &Waker) -> Result<()> {
        let tspec = self.compute_tspec();

        let ret = unsafe {
            libc::timerfd_settime(self.fd.as_raw_fd(), 0, &tspec as *const _, null_mut())
        };

        if ret == -1 {
            return Err(io::Error::last_os_error());
        }

        match self.registration {
            Some(key) => Reactor::rearm(self.fd.as_fd(), key, waker.clone()),
            None => {
                self.registration = Some(Reactor::register(self.fd.as_fd(), waker.clone())?);
                Ok(())
            }
        }
    }

    fn release(&mut self) {
        if let Some(key) = self.registration.take() {
            Reactor::deregister(self.fd.as_fd(), key);
        }
    }

    /// Put the current task to sleep for the specified duration.
    ///
    /// This function returns a future, that when `.await`ed will suspend the
    /// execution of the current task until the specified duration has elapsed.
    /// At that point the runtime will queue the task for execution. Note that
    /// it is guaranteed that the task will be suspended for *at least* the
    /// specified duration; it could sleep for longer.
    #[must_use = "a timer does nothing unless `.await`ed"]
    pub fn sleep(d: Duration) -> Result<Self> {
        let expiration = Instant::now().checked_add(d);
        let timer = unsafe { libc::timerfd_create(CLOCK_MONOTONIC, TFD_NONBLOCK | TFD_CLOEXEC) };

        if timer == -1 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            expiration,
            fd: unsafe { OwnedFd::from_raw_fd(timer) },
            registration: None,
        })
    }

    /// The instant at which this timer expires, or `None` if it never does.
    pub fn deadline(&self) -> Option<Instant> {
        self.expiration
    }

    fn expired(&self) -> bool {
        self.expiration
            .is_some_and(|expiration| Instant::now() >= expiration)
    }
}

impl Future for Timer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.expired() {
            this.release();
            return Poll::Ready(());
        }

        if let Err(e) = this.schedule(cx.waker()) {
            warn!("timer could not be armed, polling again instead: {e}");
            cx.waker().wake_by_ref();
        }

        Poll::Pending
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Suspend the current task for at least `d`.
///
/// Unlike [Timer::sleep] this never fails: if no timer descriptor can be
/// created the task yields to the executor until the deadline has passed.
pub async fn delay(d: Duration) {
    match Timer::sleep(d) {
        Ok(timer) => timer.await,
        Err(e) => {
            warn!("timerfd unavailable, delaying by yielding: {e}");

            let deadline = Instant::now().checked_add(d);
            while deadline.map_or(true, |deadline| Instant::now() < deadline) {
                yield_now().await;
            }
        }
    }
}

/// Await `f` and report how long it took, measured from the first poll.
///
/// ```
/// use settle::futures::timer::{delay, timed};
/// use settle::task::Executor;
/// use std::time::Duration;
///
/// let (value, elapsed) = Executor::block_on(timed(async {
///     delay(Duration::from_millis(50)).await;
///     7
/// }));
///
/// assert_eq!(value, 7);
/// assert!(elapsed >= Duration::from_millis(50));
/// ```
pub async fn timed<F: Future>(f: F) -> (F::Output, Duration) {
    let start = Instant::now();
    let value = f.await;

    (value, start.elapsed())
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        pin::pin,
        task::{Context, Poll},
        time::{Duration, Instant},
    };

    use futures_util::task::noop_waker;

    use crate::task::Executor;

    use super::{delay, timed, Timer};

    #[test]
    fn sleep_simple() {
        let before = Instant::now();
        Executor::block_on(async {
            Timer::sleep(Duration::from_millis(300)).unwrap().await;
        });
        assert!(Instant::now() - before >= Duration::from_millis(300));
    }

    #[test]
    fn sleep_multiple_tasks() {
        let before = Instant::now();
        let t1 = Executor::spawn(async {
            Timer::sleep(Duration::from_millis(300)).unwrap().await;
        });
        let t2 = Executor::spawn(async {
            Timer::sleep(Duration::from_millis(300)).unwrap().await;
        });
        let t3 = Executor::spawn(async {
            Timer::sleep(Duration::from_millis(600)).unwrap().await;
        });

        t1.join();
        t2.join();
        assert!(Instant::now() - before >= Duration::from_millis(300));
        assert!(Instant::now() - before < Duration::from_millis(550));

        t3.join();
        assert!(Instant::now() - before >= Duration::from_millis(600));
        assert!(Instant::now() - before < Duration::from_millis(850));
    }

    #[test]
    fn sleep_subtasks() {
        let before = Instant::now();
        Executor::block_on(async move {
            delay(Duration::from_millis(200)).await;
            assert!(Instant::now() - before >= Duration::from_millis(200));

            let t1 = Executor::spawn(delay(Duration::from_millis(200)));
            let t2 = Executor::spawn(delay(Duration::from_millis(200)));

            t1.await;
            t2.await;
            assert!(Instant::now() - before >= Duration::from_millis(400));
            assert!(Instant::now() - before < Duration::from_millis(650));
        });
    }

    #[test]
    fn zero_duration_is_immediate() {
        let before = Instant::now();
        Executor::block_on(delay(Duration::ZERO));
        assert!(before.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn dropped_timer_does_not_keep_executor_alive() {
        let before = Instant::now();
        Executor::block_on(async {
            let timer = Timer::sleep(Duration::from_secs(5)).unwrap();
            drop(timer);
        });
        assert!(before.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn deadline_follows_duration() {
        let before = Instant::now();
        let timer = Timer::sleep(Duration::from_millis(250)).unwrap();
        let deadline = timer.deadline().unwrap();

        assert!(deadline >= before + Duration::from_millis(250));
    }

    #[test]
    fn unrepresentable_deadline_stays_pending() {
        let timer = Timer::sleep(Duration::MAX).unwrap();
        assert_eq!(timer.deadline(), None);

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut timer = pin!(timer);
        assert_eq!(timer.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(timer.as_mut().poll(&mut cx), Poll::Pending);

        let mut forever = pin!(delay(Duration::MAX));
        assert_eq!(forever.as_mut().poll(&mut cx), Poll::Pending);
    }

    #[test]
    fn timed_reports_elapsed() {
        let (_, elapsed) = Executor::block_on(timed(delay(Duration::from_millis(100))));
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(350));
    }
}
