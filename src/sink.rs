//! Line-oriented logging sinks.
//!
//! Tasks and walkthrough programs report what they are doing by writing text
//! lines to a [Sink]. Writes are fire-and-forget. The order in which lines
//! arrive is the observable record of how tasks were scheduled, which is why
//! tests use a [MemorySink] to capture it.
//!
//! ```
//! use settle::sink::{MemorySink, Sink};
//!
//! let sink = MemorySink::new();
//! sink.log("Start");
//! sink.log("End");
//! assert_eq!(sink.lines(), vec!["Start", "End"]);
//! ```
use std::{cell::RefCell, rc::Rc};

use log::info;

pub trait Sink {
    fn log(&self, line: &str);
}

impl<S: Sink + ?Sized> Sink for &S {
    fn log(&self, line: &str) {
        (**self).log(line)
    }
}

impl<S: Sink + ?Sized> Sink for Rc<S> {
    fn log(&self, line: &str) {
        (**self).log(line)
    }
}

/// Records every line in memory. Clones share the same record.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Rc<RefCell<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the lines logged so far, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

impl Sink for MemorySink {
    fn log(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_owned());
    }
}

/// Prints every line to standard output.
#[derive(Clone, Copy, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn log(&self, line: &str) {
        println!("{line}");
    }
}

/// Forwards every line to the `log` facade at info level.
#[derive(Clone, Copy, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn log(&self, line: &str) {
        info!(target: "settle::sink", "{line}");
    }
}
