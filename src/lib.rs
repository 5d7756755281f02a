//! # `settle`: async task sequencing on a tiny executor
//!
//! This crate implements the small amount of machinery needed to reason about
//! `async`/`.await` control flow: when work starts, when it finishes, and
//! where its errors go. It consists of a *real* single-threaded executor, a
//! timer built on Linux's `timerfd` and `epoll`, and a runner that drives
//! lists of deferred tasks in one of three ways:
//!
//! - **sequential**: one after the other, stopping at the first failure
//!   ([runner::run_sequential]);
//! - **concurrent**: all at once, failing if any fails
//!   ([runner::run_concurrent]);
//! - **settle-all**: all at once, reporting every outcome
//!   ([runner::run_concurrent_settled]).
//!
//! For spawning and managing tasks, refer to the [task] module. Timers live
//! in [futures::timer]; the [sink] and [inventory] modules provide the
//! collaborators used by the walkthrough programs under `demos/`.
//!
//! ## Example
//!
//! Three lookups that each take 100ms finish in about 100ms when run
//! concurrently, and in at least 300ms when run one after the other:
//!
//! ```
//! use settle::futures::timer::timed;
//! use settle::inventory::Inventory;
//! use settle::runner::{run_concurrent, run_sequential};
//! use settle::task::Executor;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let basket = Rc::new(Inventory::fruit_basket().with_latency(Duration::from_millis(100)));
//! let fruits = ["apple", "grape", "pear"];
//!
//! let (sequential, concurrent) = Executor::block_on(async move {
//!     let s = timed(run_sequential(fruits.map(|f| basket.lookup(f)))).await;
//!     let c = timed(run_concurrent(fruits.map(|f| basket.lookup(f)))).await;
//!     (s, c)
//! });
//!
//! assert_eq!(sequential.0, Ok(vec![27, 0, 14]));
//! assert!(sequential.1 >= Duration::from_millis(300));
//! assert_eq!(concurrent.0, Ok(vec![27, 0, 14]));
//! assert!(concurrent.1 < Duration::from_millis(300));
//! ```
pub mod error;
pub mod futures;
pub mod inventory;
pub(crate) mod reactor;
pub mod runner;
pub mod sink;
pub mod task;
