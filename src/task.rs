//! Task and execution management
//!
//! This module provides the methods needed to spawn tasks and execute them
//! until completion. Settle uses a per-thread executor model which means that
//! each OS thread has its own execution environment:
//!
//! 1. The thread upon which a task is spawned is the same thread that will
//!    execute it.
//! 2. Each thread needs to call one of [Executor::block_on], [Executor::run]
//!    or [TaskJoiner::join] to do any work.
//!
//! Tasks are launched in the order in which they were spawned: the run queue
//! is first-in, first-out. This is what lets [crate::runner::run_concurrent]
//! promise that launch order follows input order.
//!
//! # Example
//!
//! Here is a simple hello world using [Executor::block_on].
//!
//! ```
//! use settle::task::Executor;
//! Executor::block_on(async { println!("Hello, world!"); });
//! ```
//!
//! You can also use [Executor::block_on] to easily obtain the result of a
//! future:
//!
//! ```
//! use settle::task::Executor;
//! let x = Executor::block_on(async { 2 + 8 });
//! assert_eq!(x, 10);
//! ```
//!
//! Here is the same but spawning multiple top-level tasks.
//!
//! ```
//! use settle::task::Executor;
//! Executor::spawn(async { println!("Hello"); });
//! Executor::spawn(async { println!("World!"); });
//! Executor::run();
//! ```
//!
//! # Threading Model
//!
//! Since each thread has its own execution state, only a single task is ever
//! executing at once. This allows `!Send` futures to be executed:
//!
//! ```
//! use settle::task::Executor;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! let cell = Rc::new(RefCell::new(0));
//! {
//!     let cell = cell.clone();
//!     Executor::spawn(async move { *cell.borrow_mut() += 10 });
//! }
//! {
//!     let cell = cell.clone();
//!     Executor::spawn(async move { *cell.borrow_mut() += 10 });
//! }
//! Executor::run();
//! assert_eq!(*cell.borrow(), 20);
//! ```
//!
//! Wakers handed out by the executor must be invoked on the thread that
//! spawned the task.
use std::{
    cell::RefCell,
    collections::VecDeque,
    future::Future,
    pin::Pin,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll, Wake, Waker},
};

use log::{trace, warn};
use slab::Slab;

use crate::reactor::Reactor;

struct TaskId {
    key: usize,
    queued: AtomicBool,
}

impl TaskId {
    fn schedule(self: &Arc<Self>) {
        if !self.queued.swap(true, Ordering::AcqRel) {
            EXEC.with(|exec| exec.borrow_mut().run_q.push_back(self.clone()));
        }
    }
}

impl Wake for TaskId {
    fn wake(self: Arc<TaskId>) {
        self.schedule();
    }

    fn wake_by_ref(self: &Arc<TaskId>) {
        self.schedule();
    }
}

struct Task {
    id: Arc<TaskId>,
    // `None` while the future is being polled.
    future: Option<Pin<Box<dyn Future<Output = ()>>>>,
}

/// The async executor.
///
/// A type that is responsible for pushing futures through to completion. You
/// can begin execution of a new task by calling the [Executor::block_on] or
/// [Executor::spawn] functions.
pub struct Executor {
    tasks: Slab<Task>,
    run_q: VecDeque<Arc<TaskId>>,
}

thread_local! {
    static EXEC: RefCell<Executor> = const { RefCell::new(
        Executor {
            tasks: Slab::new(),
            run_q: VecDeque::new(),
        }
    )}
}

struct JoinSlot<T> {
    value: Option<T>,
    waiter: Option<Waker>,
}

/// A handle to a running task.
///
/// You can call [TaskJoiner::join] from a synchronous context to drive the
/// executor until the task has finished and obtain the future's value. If you
/// want to wait for execution to finish from an asynchronous context, use
/// `.await` on the joiner. If the joiner is dropped then execution of the
/// future continues to completion but the return value is lost, aka
/// detach-on-drop.
pub struct TaskJoiner<T> {
    slot: Rc<RefCell<JoinSlot<T>>>,
}

impl<T> TaskJoiner<T> {
    /// Drive this thread's executor until the task has finished executing and
    /// return the value yielded by the task's future.
    ///
    /// *Note* This function should only be called from synchronous contexts.
    /// In an asynchronous context, use `.await` instead.
    ///
    /// # Panics
    ///
    /// Panics if the executor stalls before the task finishes, i.e. no task
    /// is runnable and nothing can ever wake one up.
    pub fn join(self) -> T {
        let slot = self.slot.clone();

        Executor::executor_loop(move || slot.borrow().value.is_some());

        self.take()
            .unwrap_or_else(|| panic!("executor stalled before the joined task finished"))
    }

    /// Returns `true` once the task has produced its value and that value has
    /// not been taken yet.
    pub fn is_finished(&self) -> bool {
        self.slot.borrow().value.is_some()
    }

    fn take(&self) -> Option<T> {
        self.slot.borrow_mut().value.take()
    }
}

impl<T> Future for TaskJoiner<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();

        match slot.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                slot.waiter = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl Executor {
    /// Spawn a new future and add it to the back of this thread's run queue.
    /// If called from an already-running asynchronous task, the future will be
    /// queued for execution. If called from a synchronous context, the task
    /// will *not* be executed until the executor is driven by
    /// [Executor::run], [Executor::block_on] or [TaskJoiner::join].
    ///
    /// A [TaskJoiner] is returned which can be used to wait for completion of
    /// the future `f` and obtain its return value.
    pub fn spawn<Fut, T>(f: Fut) -> TaskJoiner<T>
    where
        Fut: Future<Output = T> + 'static,
        T: 'static,
    {
        let slot = Rc::new(RefCell::new(JoinSlot {
            value: None,
            waiter: None,
        }));
        let task_slot = slot.clone();

        let fut = async move {
            let value = f.await;
            let waiter = {
                let mut slot = task_slot.borrow_mut();
                slot.value = Some(value);
                slot.waiter.take()
            };

            if let Some(waiter) = waiter {
                waiter.wake();
            }
        };

        EXEC.with(|exec| {
            let mut exec = exec.borrow_mut();
            let entry = exec.tasks.vacant_entry();
            let id = Arc::new(TaskId {
                key: entry.key(),
                queued: AtomicBool::new(true),
            });

            trace!("spawning task {}", id.key);

            entry.insert(Task {
                id: id.clone(),
                future: Some(Box::pin(fut)),
            });
            exec.run_q.push_back(id);
        });

        TaskJoiner { slot }
    }

    /// A convenience function for waiting on a future from a synchronous
    /// context. The executor runs until *every* task on this thread has
    /// finished, including tasks detached by `f`, and then returns the value
    /// of `f`.
    ///
    /// # Panics
    ///
    /// Panics if the executor stalls before `f` completes.
    pub fn block_on<Fut, T>(f: Fut) -> T
    where
        Fut: Future<Output = T> + 'static,
        T: 'static,
    {
        let joiner = Self::spawn(f);

        Self::run();

        joiner
            .take()
            .unwrap_or_else(|| panic!("executor stalled before the block_on future finished"))
    }

    /// Run the executor for this thread.
    ///
    /// This function will schedule and run all tasks that have been previously
    /// spawned with [Executor::spawn]. *Note* each thread has its own set of
    /// tasks and execution environment. If you call this function, only tasks
    /// that have been spawned on *this* thread will be executed.
    ///
    /// Blocks until all tasks have finished executing or until the remaining
    /// tasks can no longer make progress.
    pub fn run() {
        Self::executor_loop(|| false)
    }

    fn next_runnable() -> Option<(Arc<TaskId>, Pin<Box<dyn Future<Output = ()>>>)> {
        EXEC.with(|exec| {
            let mut exec = exec.borrow_mut();

            while let Some(id) = exec.run_q.pop_front() {
                id.queued.store(false, Ordering::Release);

                // Entries can outlive their task, and the slab key may since
                // have been handed to a new one.
                let future = exec
                    .tasks
                    .get_mut(id.key)
                    .filter(|task| Arc::ptr_eq(&task.id, &id))
                    .and_then(|task| task.future.take());

                if let Some(future) = future {
                    return Some((id, future));
                }
            }

            None
        })
    }

    fn executor_loop(done: impl Fn() -> bool) {
        loop {
            if done() {
                return;
            }

            let Some((id, mut future)) = Self::next_runnable() else {
                if EXEC.with(|exec| exec.borrow().tasks.is_empty()) {
                    return;
                }

                if !Reactor::react() {
                    warn!("executor stalled: tasks are pending but nothing can wake them");
                    return;
                }

                continue;
            };

            let waker = Waker::from(id.clone());
            let mut cx = Context::from_waker(&waker);

            match future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => {
                    trace!("task {} finished", id.key);
                    EXEC.with(|exec| exec.borrow_mut().tasks.remove(id.key));
                }
                Poll::Pending => EXEC.with(|exec| {
                    if let Some(task) = exec.borrow_mut().tasks.get_mut(id.key) {
                        task.future = Some(future);
                    }
                }),
            }
        }
    }
}

struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.0 {
            return Poll::Ready(());
        }

        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Yield execution back to the executor exactly once, letting every other
/// runnable task on this thread make progress first.
pub async fn yield_now() {
    YieldOnce(false).await
}
