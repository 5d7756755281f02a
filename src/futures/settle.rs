//! Panic capture for task futures.
//!
//! A task can fail in three ways: its future resolves to `Err`, it panics
//! while being invoked, or it panics while being polled. [settle] folds the
//! last one into the same channel as the first, so that a caller only ever
//! sees an [Outcome]. Panics raised while a task is being invoked are caught
//! by the runner before the future exists, using [panic_message] as well.
use std::{any::Any, future::Future, panic::AssertUnwindSafe};

use futures_util::FutureExt;

use crate::{error::TaskFailure, runner::Outcome};

/// Render a panic payload as text. `panic!` payloads are either `&str` or
/// `String`; anything else is reported generically.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => "task panicked with a non-string payload".to_owned(),
        },
    }
}

/// Resolve `future` to an [Outcome], converting a panic raised while it is
/// polled into [TaskFailure::Panicked].
pub fn settle<F, T, E>(future: F) -> impl Future<Output = Outcome<T, E>>
where
    F: Future<Output = Result<T, E>>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .map(|settled| match settled {
            Ok(result) => result.into(),
            Err(payload) => Outcome::Failure(TaskFailure::Panicked(panic_message(payload))),
        })
}
