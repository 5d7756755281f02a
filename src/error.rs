//! Failure types surfaced by the runner.
use thiserror::Error;

/// Why a single task did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure<E> {
    /// The task's future resolved to `Err`.
    #[error("{0}")]
    Rejected(E),
    /// The task panicked while being invoked or polled.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl<E> TaskFailure<E> {
    /// The task's own error, if it failed by rejection.
    pub fn rejection(&self) -> Option<&E> {
        match self {
            Self::Rejected(e) => Some(e),
            Self::Panicked(_) => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    pub fn map<F, E2>(self, f: F) -> TaskFailure<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Self::Rejected(e) => TaskFailure::Rejected(f(e)),
            Self::Panicked(msg) => TaskFailure::Panicked(msg),
        }
    }
}

/// The failure reported by [crate::runner::run_concurrent]: the first task to
/// fail in completion order, identified by its position in the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task {index} of {total} failed: {failure}")]
pub struct AggregateFailure<E> {
    pub index: usize,
    pub total: usize,
    pub failure: TaskFailure<E>,
}

impl<E> AggregateFailure<E> {
    pub fn into_failure(self) -> TaskFailure<E> {
        self.failure
    }
}
