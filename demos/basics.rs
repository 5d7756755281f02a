//! The basics: async functions, awaiting and returning futures.
//!
//! Calling an async function only builds a future; its body runs once the
//! future is awaited or handed to the executor. A future can be awaited and
//! its value used directly, or its result turned into an [Outcome] and mapped.
//! Awaiting a future just to return its value is the same as returning the
//! future itself.
use std::{future::Future, rc::Rc};

use clap::Parser;
use settle::{
    runner::Outcome,
    sink::{LogSink, Sink, StdoutSink},
    task::Executor,
};

/// A settle walkthrough: async basics.
#[derive(Parser, Debug)]
struct Args {
    /// Send output lines to the logger instead of stdout.
    #[arg(long)]
    log: bool,
}

async fn get_one(sink: Rc<dyn Sink>) -> Result<u32, String> {
    sink.log("get_one running");
    Ok(1)
}

async fn awaiting_then_returning(sink: Rc<dyn Sink>) -> Result<u32, String> {
    get_one(sink).await
}

fn returning_the_future(sink: Rc<dyn Sink>) -> impl Future<Output = Result<u32, String>> {
    get_one(sink)
}

async fn walkthrough(sink: Rc<dyn Sink>) {
    let pending = get_one(sink.clone());
    sink.log("future created, nothing has run yet");

    let one = pending.await;
    sink.log(&format!("{one:?}"));

    let outcome = Outcome::from(get_one(sink.clone()).await).map(|one| one + 1);
    sink.log(&outcome.to_string());

    for result in [
        awaiting_then_returning(sink.clone()).await,
        returning_the_future(sink.clone()).await,
    ] {
        match result {
            Ok(one) => sink.log(&one.to_string()),
            Err(e) => sink.log(&e),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let sink: Rc<dyn Sink> = if args.log {
        Rc::new(LogSink)
    } else {
        Rc::new(StdoutSink)
    };

    Executor::block_on(walkthrough(sink));

    Ok(())
}
