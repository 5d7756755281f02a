//! Error handling across awaits.
//!
//! A failing task surfaces its error to whoever awaits it. Handling each
//! await separately reports every failure; letting them propagate with `?`
//! to a single handler reports only the first, because nothing after it runs.
use std::rc::Rc;

use clap::Parser;
use settle::{
    error::TaskFailure,
    runner::{run_sequential, Outcome},
    sink::{Sink, StdoutSink},
    task::Executor,
};

/// A settle walkthrough: errors and awaits.
#[derive(Parser, Debug)]
struct Args {
    /// Make `get_one` succeed instead of failing.
    #[arg(long)]
    succeed: bool,
}

async fn get_one(success: bool) -> Result<u32, String> {
    if success {
        Ok(1)
    } else {
        Err("Failure".to_owned())
    }
}

async fn handled_separately(sink: &dyn Sink, success: bool) {
    for _ in 0..3 {
        if let Err(e) = get_one(success).await {
            sink.log(&e);
        }
    }
}

async fn three_in_a_row(success: bool) -> Result<u32, String> {
    let one = get_one(success).await?;
    let two = get_one(success).await?;
    let three = get_one(success).await?;

    Ok(one + two + three)
}

async fn walkthrough(sink: Rc<dyn Sink>, success: bool) {
    let outcome: Outcome<_, _> = get_one(success).await.into();
    sink.log(&outcome.map(|one| one * 10).to_string());

    handled_separately(&*sink, success).await;

    match three_in_a_row(success).await {
        Ok(sum) => sink.log(&sum.to_string()),
        Err(e) => sink.log(&e),
    }

    let result = run_sequential((0..3).map(|_| move || get_one(success))).await;
    match result {
        Ok(values) => sink.log(&format!("runner finished: {values:?}")),
        Err(TaskFailure::Rejected(e)) => sink.log(&format!("runner stopped at: {e}")),
        Err(TaskFailure::Panicked(message)) => sink.log(&format!("runner panicked: {message}")),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    Executor::block_on(walkthrough(Rc::new(StdoutSink), args.succeed));

    Ok(())
}
