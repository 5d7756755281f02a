//! Sequential versus concurrent awaiting.
//!
//! Three lookups that each take one "latency" are awaited first one after the
//! other, then all at once, and both runs are timed. Finally the basket is
//! queried for a fruit it doesn't have to show the difference between the
//! fail-fast and settle-all aggregates.
use std::{rc::Rc, time::Duration};

use clap::Parser;
use settle::{
    futures::timer::{delay, timed},
    inventory::Inventory,
    runner::{run_concurrent, run_concurrent_settled, run_sequential},
    sink::{LogSink, Sink, StdoutSink},
    task::Executor,
};

/// A settle walkthrough: sequential and concurrent awaits.
#[derive(Parser, Debug)]
struct Args {
    /// Simulated latency of every lookup, in milliseconds.
    #[arg(short, long, default_value_t = 1000)]
    latency_ms: u64,

    /// Send output lines to the logger instead of stdout.
    #[arg(long)]
    log: bool,
}

async fn get_number(n: u32, latency: Duration) -> Result<u32, String> {
    delay(latency).await;
    Ok(n)
}

async fn walkthrough(sink: Rc<dyn Sink>, basket: Rc<Inventory>) {
    let latency = basket.latency();

    sink.log("Now");
    let one = get_number(1, latency).await;
    sink.log(&format!("{one:?}"));

    let (values, elapsed) =
        timed(run_sequential((2..=4).map(|n| move || get_number(n, latency)))).await;
    sink.log(&format!("sequential: {values:?} in {elapsed:.2?}"));

    let (values, elapsed) =
        timed(run_concurrent((2..=4).map(|n| move || get_number(n, latency)))).await;
    sink.log(&format!("concurrent: {values:?} in {elapsed:.2?}"));

    let fruits = ["apple", "grape", "pear", "kiwi"];

    match run_concurrent(fruits.map(|f| basket.lookup(f))).await {
        Ok(counts) => sink.log(&format!("all: {counts:?}")),
        Err(e) => sink.log(&format!("all failed: {e}")),
    }

    for (fruit, outcome) in fruits
        .iter()
        .zip(run_concurrent_settled(fruits.map(|f| basket.lookup(f))).await)
    {
        sink.log(&format!("{fruit}: {outcome}"));
    }

    sink.log("Done");
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let sink: Rc<dyn Sink> = if args.log {
        Rc::new(LogSink)
    } else {
        Rc::new(StdoutSink)
    };
    let basket =
        Rc::new(Inventory::fruit_basket().with_latency(Duration::from_millis(args.latency_ms)));

    Executor::block_on(walkthrough(sink, basket));

    Ok(())
}
