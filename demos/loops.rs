//! Awaiting inside loops.
//!
//! `for`, `while` and iterator-driven sequential runs all wait for each
//! lookup before starting the next. Spawning from inside a loop without
//! awaiting the handles does not: "End" is logged before any count arrives.
//! Mapping the lookups and awaiting them together is the concurrent fix.
use std::{rc::Rc, time::Duration};

use clap::{Parser, ValueEnum};
use settle::{
    inventory::Inventory,
    runner::{run_concurrent, run_sequential},
    sink::{Sink, StdoutSink},
    task::Executor,
};

const FRUITS: [&str; 3] = ["apple", "grape", "pear"];

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Section {
    For,
    While,
    Sequential,
    Detached,
    Map,
    All,
}

/// A settle walkthrough: await in loops.
#[derive(Parser, Debug)]
struct Args {
    /// Simulated latency of every lookup, in milliseconds.
    #[arg(short, long, default_value_t = 1000)]
    latency_ms: u64,

    /// Which loop to demonstrate.
    #[arg(value_enum, default_value_t = Section::All)]
    section: Section,
}

async fn for_loop(sink: Rc<dyn Sink>, basket: Rc<Inventory>) {
    sink.log("Start");
    for fruit in FRUITS {
        match basket.fetch(fruit).await {
            Ok(count) => sink.log(&count.to_string()),
            Err(e) => sink.log(&e.to_string()),
        }
    }
    sink.log("End");
}

async fn while_loop(sink: Rc<dyn Sink>, basket: Rc<Inventory>) {
    sink.log("Start");
    let mut i = 0;
    while i < FRUITS.len() {
        match basket.fetch(FRUITS[i]).await {
            Ok(count) => sink.log(&count.to_string()),
            Err(e) => sink.log(&e.to_string()),
        }
        i += 1;
    }
    sink.log("End");
}

async fn sequential(sink: Rc<dyn Sink>, basket: Rc<Inventory>) {
    sink.log("Start");
    match run_sequential(FRUITS.map(|f| basket.lookup(f))).await {
        Ok(counts) => sink.log(&format!("{counts:?}")),
        Err(e) => sink.log(&e.to_string()),
    }
    sink.log("End");
}

async fn detached(sink: Rc<dyn Sink>, basket: Rc<Inventory>) {
    sink.log("Start");
    for fruit in FRUITS {
        let sink = sink.clone();
        let basket = basket.clone();
        // The handle is dropped, so nothing waits for this lookup.
        Executor::spawn(async move {
            if let Ok(count) = basket.fetch(fruit).await {
                sink.log(&count.to_string());
            }
        });
    }
    sink.log("End");
}

async fn map(sink: Rc<dyn Sink>, basket: Rc<Inventory>) {
    sink.log("Start");
    let tasks = FRUITS.map(|fruit| {
        let basket = basket.clone();
        move || async move { basket.fetch(fruit).await.map(|count| count + 100) }
    });
    match run_concurrent(tasks).await {
        Ok(counts) => sink.log(&format!("{counts:?}")),
        Err(e) => sink.log(&e.to_string()),
    }
    sink.log("End");
}

fn run(section: Section, sink: Rc<dyn Sink>, basket: Rc<Inventory>) {
    match section {
        Section::For => Executor::block_on(for_loop(sink, basket)),
        Section::While => Executor::block_on(while_loop(sink, basket)),
        Section::Sequential => Executor::block_on(sequential(sink, basket)),
        Section::Detached => Executor::block_on(detached(sink, basket)),
        Section::Map => Executor::block_on(map(sink, basket)),
        Section::All => {
            for section in [
                Section::For,
                Section::While,
                Section::Sequential,
                Section::Detached,
                Section::Map,
            ] {
                sink.log(&format!("-- {section:?}"));
                run(section, sink.clone(), basket.clone());
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let basket =
        Rc::new(Inventory::fruit_basket().with_latency(Duration::from_millis(args.latency_ms)));

    run(args.section, Rc::new(StdoutSink), basket);

    Ok(())
}
