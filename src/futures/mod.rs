//! Future sub-modules.
//!
//! The `futures` module holds the leaf futures that tasks await. These are
//! the points at which a task can suspend and hand control back to the
//! executor.
//!
//! The following sub-modules are exposed by the `futures` module:
//!
//! - `settle`: Wraps a task's future so that panics settle it as a failure.
//! - `timer`: Implements futures for timer-based tasks using `timerfd`.
pub mod settle;
pub mod timer;
