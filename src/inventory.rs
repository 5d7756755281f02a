//! A read-only lookup table that pretends to live on a remote server.
//!
//! [Inventory] maps string keys to counts. Reading it synchronously with
//! [Inventory::get] is instant; [Inventory::fetch] first waits for the
//! configured latency, which is how the walkthrough simulates a network round
//! trip. The table is an explicit context object, shared with tasks through an
//! `Rc`, rather than global state.
//!
//! ```
//! use settle::inventory::Inventory;
//! use settle::runner::run_concurrent;
//! use settle::task::Executor;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let basket = Rc::new(Inventory::fruit_basket().with_latency(Duration::from_millis(10)));
//!
//! let counts = Executor::block_on(run_concurrent(
//!     ["apple", "grape", "pear"].map(|fruit| basket.lookup(fruit)),
//! ));
//!
//! assert_eq!(counts, Ok(vec![27, 0, 14]));
//! ```
use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    rc::Rc,
    time::Duration,
};

use thiserror::Error;

use crate::{futures::timer::delay, runner::AsyncTask};

/// How long a fetch takes unless configured otherwise.
pub const DEFAULT_LATENCY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no entry for '{0}'")]
    Missing(String),
}

#[derive(Debug, Clone)]
pub struct Inventory {
    stock: HashMap<String, i64>,
    latency: Duration,
}

impl Inventory {
    pub fn new<K: Into<String>>(stock: impl IntoIterator<Item = (K, i64)>) -> Self {
        Self {
            stock: stock.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            latency: DEFAULT_LATENCY,
        }
    }

    /// `{apple: 27, grape: 0, pear: 14}`
    pub fn fruit_basket() -> Self {
        Self::new([("apple", 27), ("grape", 0), ("pear", 14)])
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.stock.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.stock.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stock.is_empty()
    }

    /// Wait for the simulated latency, then look `key` up.
    pub async fn fetch(&self, key: &str) -> Result<i64, LookupError> {
        delay(self.latency).await;

        self.get(key)
            .ok_or_else(|| LookupError::Missing(key.to_owned()))
    }

    /// A deferred [Inventory::fetch] that can be handed to the runner.
    pub fn lookup(self: &Rc<Self>, key: impl Into<String>) -> Lookup {
        Lookup {
            inventory: self.clone(),
            key: key.into(),
        }
    }
}

/// A pending lookup of one key. Nothing is fetched until it is invoked.
pub struct Lookup {
    inventory: Rc<Inventory>,
    key: String,
}

impl Lookup {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl AsyncTask for Lookup {
    type Output = i64;
    type Error = LookupError;
    type Future = Pin<Box<dyn Future<Output = Result<i64, LookupError>>>>;

    fn invoke(self) -> Self::Future {
        Box::pin(async move { self.inventory.fetch(&self.key).await })
    }
}
