//! Sequential and concurrent task sequencing.
//!
//! An [AsyncTask] is a deferred computation: nothing happens until it is
//! invoked, at which point it hands back a future that settles to either a
//! value or an error. The runner offers three ways of driving a list of them:
//!
//! - [run_sequential] invokes one task at a time and stops at the first
//!   failure. N tasks of duration `d` take at least `N × d`.
//! - [run_concurrent] invokes every task up front, waits for all of them, and
//!   reports the failure that *completed* first, if any. N tasks of duration
//!   `d` take about `d`.
//! - [run_concurrent_settled] is like [run_concurrent] but never fails; every
//!   position carries its own [Outcome].
//!
//! A panic raised while invoking a task or polling its future is reported as
//! [TaskFailure::Panicked] through the same channel as an ordinary error.
//!
//! The concurrent operations spawn onto the current thread's
//! [Executor](crate::task::Executor), so every runner future must be driven by
//! it.
//!
//! # Example
//!
//! ```
//! use settle::futures::timer::delay;
//! use settle::runner::{run_concurrent, run_sequential};
//! use settle::task::Executor;
//! use std::time::Duration;
//!
//! async fn get(n: u32) -> Result<u32, String> {
//!     delay(Duration::from_millis(20)).await;
//!     Ok(n)
//! }
//!
//! let (one_by_one, all_at_once) = Executor::block_on(async {
//!     let a = run_sequential((2..=4).map(|n| move || get(n))).await;
//!     let b = run_concurrent((2..=4).map(|n| move || get(n))).await;
//!     (a, b)
//! });
//!
//! assert_eq!(one_by_one, Ok(vec![2, 3, 4]));
//! assert_eq!(all_at_once, Ok(vec![2, 3, 4]));
//! ```
use std::{
    cell::Cell,
    fmt,
    future::{ready, Future},
    panic::{catch_unwind, AssertUnwindSafe},
    pin::Pin,
    rc::Rc,
};

use log::{debug, trace};

use crate::{
    error::{AggregateFailure, TaskFailure},
    futures::settle::{panic_message, settle},
    task::{Executor, TaskJoiner},
};

/// A deferred unit of asynchronous work.
///
/// Invoking the task consumes it and returns the future that performs the
/// work. Any `FnOnce() -> Fut` closure whose future resolves to a `Result`
/// is an `AsyncTask`.
pub trait AsyncTask {
    type Output: 'static;
    type Error: 'static;
    type Future: Future<Output = Result<Self::Output, Self::Error>> + 'static;

    fn invoke(self) -> Self::Future;
}

impl<F, Fut, T, E> AsyncTask for F
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + 'static,
    T: 'static,
    E: 'static,
{
    type Output = T;
    type Error = E;
    type Future = Fut;

    fn invoke(self) -> Fut {
        self()
    }
}

/// The settled state of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    Success(T),
    Failure(TaskFailure<E>),
}

impl<T, E> Outcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn into_result(self) -> Result<T, TaskFailure<E>> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(failure) => Err(failure),
        }
    }

    /// Transform a successful value, leaving failures untouched.
    pub fn map<U, F>(self, f: F) -> Outcome<U, E>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Failure(failure) => Outcome::Failure(failure),
        }
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&TaskFailure<E>> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(value) => Self::Success(value),
            Err(e) => Self::Failure(TaskFailure::Rejected(e)),
        }
    }
}

impl<T: fmt::Display, E: fmt::Display> fmt::Display for Outcome<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(value) => write!(f, "fulfilled: {value}"),
            Self::Failure(failure) => write!(f, "rejected: {failure}"),
        }
    }
}

type Launched<T, E> = Pin<Box<dyn Future<Output = Outcome<T, E>>>>;

/// Invoke `task` and wrap its future so that it always settles to an
/// [Outcome], even if invoking or polling it panics.
pub(crate) fn launch<A: AsyncTask>(task: A) -> Launched<A::Output, A::Error> {
    match catch_unwind(AssertUnwindSafe(|| task.invoke())) {
        Ok(future) => Box::pin(settle(future)),
        Err(payload) => Box::pin(ready(Outcome::Failure(TaskFailure::Panicked(
            panic_message(payload),
        )))),
    }
}

/// Invoke `tasks` strictly one after the other.
///
/// Each task is only invoked once the previous one has settled, and the input
/// iterator is only advanced at that point too. The first failure is returned
/// immediately and the remaining tasks are never invoked.
pub async fn run_sequential<I, A>(tasks: I) -> Result<Vec<A::Output>, TaskFailure<A::Error>>
where
    I: IntoIterator<Item = A>,
    A: AsyncTask,
{
    let mut values = Vec::new();

    for (index, task) in tasks.into_iter().enumerate() {
        trace!("sequential: invoking task {index}");

        match launch(task).await {
            Outcome::Success(value) => values.push(value),
            Outcome::Failure(failure) => {
                debug!("sequential: task {index} failed, skipping the rest");
                return Err(failure);
            }
        }
    }

    Ok(values)
}

struct Settled<T, E> {
    outcome: Outcome<T, E>,
    completed: usize,
}

/// Invoke every task in input order and spawn it before awaiting any.
fn spawn_all<I, A>(tasks: I) -> Vec<TaskJoiner<Settled<A::Output, A::Error>>>
where
    I: IntoIterator<Item = A>,
    A: AsyncTask,
{
    let completions = Rc::new(Cell::new(0));

    tasks
        .into_iter()
        .enumerate()
        .map(|(index, task)| {
            trace!("concurrent: invoking task {index}");

            let future = launch(task);
            let completions = completions.clone();

            Executor::spawn(async move {
                let outcome = future.await;
                let completed = completions.get();
                completions.set(completed + 1);

                Settled { outcome, completed }
            })
        })
        .collect()
}

/// Invoke every task immediately and wait for all of them to settle.
///
/// Values are returned in input order regardless of the order in which the
/// tasks completed. If any task fails, the error is the failure that
/// completed first, together with its input index. Siblings of a failed task
/// are not cancelled and are still awaited before this returns.
pub async fn run_concurrent<I, A>(tasks: I) -> Result<Vec<A::Output>, AggregateFailure<A::Error>>
where
    I: IntoIterator<Item = A>,
    A: AsyncTask,
{
    let joiners = spawn_all(tasks);
    let total = joiners.len();

    let mut values = Vec::with_capacity(total);
    let mut first_failure: Option<(usize, usize, TaskFailure<A::Error>)> = None;

    for (index, joiner) in joiners.into_iter().enumerate() {
        let Settled { outcome, completed } = joiner.await;

        match outcome {
            Outcome::Success(value) => values.push(value),
            Outcome::Failure(failure) => {
                let earlier = first_failure
                    .as_ref()
                    .is_some_and(|(_, seen, _)| *seen < completed);

                if !earlier {
                    first_failure = Some((index, completed, failure));
                }
            }
        }
    }

    match first_failure {
        None => Ok(values),
        Some((index, _, failure)) => {
            debug!("concurrent: task {index} was the first of {total} to fail");
            Err(AggregateFailure {
                index,
                total,
                failure,
            })
        }
    }
}

/// Invoke every task immediately and return every outcome, aligned with the
/// input. This never fails as a whole.
pub async fn run_concurrent_settled<I, A>(tasks: I) -> Vec<Outcome<A::Output, A::Error>>
where
    I: IntoIterator<Item = A>,
    A: AsyncTask,
{
    let mut outcomes = Vec::new();

    for joiner in spawn_all(tasks) {
        outcomes.push(joiner.await.outcome);
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        future::Future,
        pin::Pin,
        rc::Rc,
        time::{Duration, Instant},
    };

    use crate::{error::TaskFailure, futures::timer::delay, task::Executor};

    use super::{run_concurrent, run_concurrent_settled, run_sequential, AsyncTask, Outcome};

    type Log = Rc<RefCell<Vec<String>>>;
    type BoxFuture = Pin<Box<dyn Future<Output = Result<u32, String>>>>;
    type BoxTask = Box<dyn FnOnce() -> BoxFuture>;

    /// A task that records when it was invoked, waits `ms`, then settles.
    fn task(
        log: &Log,
        name: &'static str,
        ms: u64,
        result: Result<u32, &'static str>,
    ) -> impl AsyncTask<Output = u32, Error = String> {
        let log = log.clone();
        move || {
            log.borrow_mut().push(format!("invoke {name}"));
            async move {
                delay(Duration::from_millis(ms)).await;
                log.borrow_mut().push(format!("settle {name}"));
                result.map_err(str::to_owned)
            }
        }
    }

    #[test]
    fn empty_inputs() {
        let (seq, conc, settled) = Executor::block_on(async {
            (
                run_sequential(Vec::<BoxTask>::new()).await,
                run_concurrent(Vec::<BoxTask>::new()).await,
                run_concurrent_settled(Vec::<BoxTask>::new()).await,
            )
        });

        assert_eq!(seq, Ok(vec![]));
        assert_eq!(conc, Ok(vec![]));
        assert!(settled.is_empty());
    }

    #[test]
    fn sequential_stops_at_first_failure() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let tasks = vec![
            task(&log, "a", 10, Ok(1)),
            task(&log, "b", 10, Err("bad b")),
            task(&log, "c", 10, Ok(3)),
        ];

        let result = Executor::block_on(run_sequential(tasks));

        assert_eq!(result, Err(TaskFailure::Rejected("bad b".to_owned())));
        assert_eq!(
            *log.borrow(),
            vec!["invoke a", "settle a", "invoke b", "settle b"]
        );
    }

    #[test]
    fn concurrent_invokes_all_before_any_settles() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let tasks = vec![
            task(&log, "a", 30, Ok(1)),
            task(&log, "b", 10, Ok(2)),
            task(&log, "c", 20, Ok(3)),
        ];

        let result = Executor::block_on(run_concurrent(tasks));

        assert_eq!(result, Ok(vec![1, 2, 3]));
        assert_eq!(
            *log.borrow(),
            vec![
                "invoke a", "invoke b", "invoke c", "settle b", "settle c", "settle a"
            ]
        );
    }

    #[test]
    fn concurrent_reports_first_failure_by_completion() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let tasks = vec![
            task(&log, "slow", 150, Err("slow failure")),
            task(&log, "ok", 10, Ok(2)),
            task(&log, "fast", 30, Err("fast failure")),
        ];

        let failure = Executor::block_on(run_concurrent(tasks)).unwrap_err();

        assert_eq!(failure.index, 2);
        assert_eq!(failure.total, 3);
        assert_eq!(
            failure.into_failure(),
            TaskFailure::Rejected("fast failure".to_owned())
        );
        // Every sibling still ran to completion.
        assert!(log.borrow().contains(&"settle slow".to_owned()));
    }

    #[test]
    fn concurrent_waits_for_siblings_of_a_failure() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let tasks = vec![
            task(&log, "fails", 10, Err("no")),
            task(&log, "slow", 120, Ok(2)),
        ];

        let before = Instant::now();
        let result = Executor::block_on(run_concurrent(tasks));

        assert!(result.is_err());
        assert!(before.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn settled_keeps_every_outcome_in_place() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let tasks = vec![
            task(&log, "a", 20, Ok(1)),
            task(&log, "b", 10, Err("b failed")),
            task(&log, "c", 5, Ok(3)),
        ];

        let outcomes = Executor::block_on(run_concurrent_settled(tasks));

        assert_eq!(
            outcomes,
            vec![
                Outcome::Success(1),
                Outcome::Failure(TaskFailure::Rejected("b failed".to_owned())),
                Outcome::Success(3),
            ]
        );
    }

    #[test]
    fn panics_are_failures() {
        let invoke_panic: BoxTask = Box::new(|| -> BoxFuture { panic!("invoked badly") });
        let poll_panic: BoxTask = Box::new(|| -> BoxFuture {
            Box::pin(async {
                delay(Duration::from_millis(5)).await;
                if true {
                    panic!("polled badly");
                }
                Ok::<u32, String>(0)
            })
        });
        let fine: BoxTask = Box::new(|| -> BoxFuture { Box::pin(async { Ok(9) }) });

        let outcomes =
            Executor::block_on(run_concurrent_settled(vec![invoke_panic, poll_panic, fine]));

        assert_eq!(
            outcomes,
            vec![
                Outcome::Failure(TaskFailure::Panicked("invoked badly".to_owned())),
                Outcome::Failure(TaskFailure::Panicked("polled badly".to_owned())),
                Outcome::Success(9),
            ]
        );
    }

    #[test]
    fn sequential_panic_is_returned() {
        let boom: BoxTask = Box::new(|| -> BoxFuture { panic!("kaboom") });
        let result = Executor::block_on(run_sequential(vec![boom]));

        assert_eq!(result, Err(TaskFailure::Panicked("kaboom".to_owned())));
    }

    #[test]
    fn outcome_helpers() {
        let ok: Outcome<u32, String> = Ok(27).into();
        assert!(ok.is_success());
        assert_eq!(ok.clone().map(|n| n + 100), Outcome::Success(127));
        assert_eq!(ok.success(), Some(&27));
        assert_eq!(ok.to_string(), "fulfilled: 27");

        let err: Outcome<u32, String> = Err("Failure".to_owned()).into();
        assert!(err.is_failure());
        assert_eq!(err.to_string(), "rejected: Failure");
        assert_eq!(
            err.into_result(),
            Err(TaskFailure::Rejected("Failure".to_owned()))
        );
    }
}
