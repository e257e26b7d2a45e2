#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use imagepool::cache::{CacheSettings, CacheStore};
use imagepool::category::CategoryRegistry;
use imagepool::clock::{Clock, ManualClock};
use imagepool::error::StoreError;
use imagepool::metrics::MetricsCollector;
use imagepool::pipeline::FetchPipeline;
use imagepool::replenish::{self, ReplenishQueue};
use imagepool::retry::RetryPolicy;
use imagepool::store::ImageStore;

/// 2026-01-01T00:00:00Z, so tests start on a minute boundary.
pub const START_MS: u64 = 1_767_225_600_000;

/// An in-memory store that answers `sample` calls from a script.
///
/// Each call pops the next scripted reply. Once the script runs out, every
/// call returns `fallback` numbered URLs.
#[derive(Default)]
pub struct ScriptedStore {
    script: Mutex<VecDeque<Result<Vec<String>, StoreError>>>,
    fallback: usize,
    sample_calls: AtomicUsize,
    connect_calls: AtomicUsize,
    ping_fails: AtomicBool,
    last_request: Mutex<Option<(String, usize)>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that always returns `count` URLs.
    pub fn with_fallback(count: usize) -> Self {
        Self {
            fallback: count,
            ..Self::default()
        }
    }

    pub fn push_ok(self, urls: Vec<String>) -> Self {
        self.script.lock().unwrap().push_back(Ok(urls));
        self
    }

    pub fn push_err(self, err: StoreError) -> Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn fail_ping(&self) {
        self.ping_fails.store(true, Ordering::SeqCst);
    }

    pub fn sample_calls(&self) -> usize {
        self.sample_calls.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(String, usize)> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn connect(&self) -> Result<(), StoreError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sample(&self, collection: &str, count: usize) -> Result<Vec<String>, StoreError> {
        self.sample_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((collection.to_string(), count));

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply,
            None => Ok(urls(collection, self.fallback.min(count))),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.ping_fails.load(Ordering::SeqCst) {
            Err(StoreError::Connect("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

/// `count` distinct URLs named after `prefix`, starting at 1.
pub fn urls(prefix: &str, count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| format!("https://img.example.com/{}/{}.jpg", prefix, i))
        .collect()
}

/// A clock that returns a fixed sequence of readings, then repeats the last.
pub struct ScriptedClock {
    readings: Mutex<VecDeque<u64>>,
    last: AtomicU64,
}

impl ScriptedClock {
    pub fn new(readings: impl IntoIterator<Item = u64>) -> Self {
        Self {
            readings: Mutex::new(readings.into_iter().collect()),
            last: AtomicU64::new(START_MS),
        }
    }
}

impl Clock for ScriptedClock {
    fn now_ms(&self) -> u64 {
        match self.readings.lock().unwrap().pop_front() {
            Some(now) => {
                self.last.store(now, Ordering::SeqCst);
                now
            }
            None => self.last.load(Ordering::SeqCst),
        }
    }
}

/// A pipeline over `store` with a manual clock and no replenish workers.
pub struct PipelineHarness {
    pub pipeline: FetchPipeline,
    pub cache: Arc<CacheStore>,
    pub clock: Arc<ManualClock>,
    pub metrics: MetricsCollector,
    pub queue: ReplenishQueue,
}

pub fn pipeline(store: Arc<ScriptedStore>) -> PipelineHarness {
    let clock = Arc::new(ManualClock::new(START_MS));
    let (pipeline, cache, metrics, queue) = assemble(store, Arc::clone(&clock) as Arc<dyn Clock>);

    PipelineHarness {
        pipeline,
        cache,
        clock,
        metrics,
        queue,
    }
}

/// A pipeline over `store` that reads time from `clock`.
pub fn pipeline_with_clock(store: Arc<ScriptedStore>, clock: Arc<dyn Clock>) -> FetchPipeline {
    assemble(store, clock).0
}

fn assemble(
    store: Arc<ScriptedStore>,
    clock: Arc<dyn Clock>,
) -> (FetchPipeline, Arc<CacheStore>, MetricsCollector, ReplenishQueue) {
    let (handle, queue) = replenish::channel(8);
    let cache = Arc::new(CacheStore::new(CacheSettings::default(), handle));
    let metrics = MetricsCollector::new();

    let pipeline = FetchPipeline::new(
        CategoryRegistry::default(),
        Arc::clone(&cache),
        store,
        clock,
        metrics.clone(),
        RetryPolicy::new().max_attempts(3).interval(Duration::from_secs(1)),
        Duration::from_secs(4),
    );

    (pipeline, cache, metrics, queue)
}
