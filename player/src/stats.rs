//! Throughput and latency telemetry for one player: monotone counters,
//! sliding-window rates, and bucketed timing histograms, exposed as a
//! JSON snapshot. Single writer (the applier), any number of readers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

/// Samples kept per rate window.
pub const RATE_SAMPLES: usize = 15;

/// Rate sampling interval, in nanoseconds.
pub const RATE_INTERVAL_NS: u64 = 60_000_000_000;

/// Histogram bucket upper bounds, in milliseconds; one overflow bucket
/// follows the last bound.
const TIMING_BUCKETS_MS: [f64; 14] = [
    0.5, 1.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0,
    30000.0,
];

#[derive(Debug, Default)]
pub struct Counter(AtomicI64);

impl Counter {
    pub fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Elapsed-time recorder: count, total, and a fixed bucket ladder from
/// which percentiles are estimated.
#[derive(Debug)]
pub struct Timings {
    count: AtomicI64,
    total_ns: AtomicI64,
    max_ns: AtomicI64,
    buckets: [AtomicI64; TIMING_BUCKETS_MS.len() + 1],
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            count: AtomicI64::new(0),
            total_ns: AtomicI64::new(0),
            max_ns: AtomicI64::new(0),
            buckets: std::array::from_fn(|_| AtomicI64::new(0)),
        }
    }
}

impl Timings {
    pub fn record(&self, elapsed: Duration) {
        let ns = elapsed.as_nanos().min(i64::MAX as u128) as i64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ns.fetch_add(ns, Ordering::Relaxed);
        self.max_ns.fetch_max(ns, Ordering::Relaxed);
        let ms = elapsed.as_secs_f64() * 1000.0;
        let idx = TIMING_BUCKETS_MS
            .iter()
            .position(|bound| ms <= *bound)
            .unwrap_or(TIMING_BUCKETS_MS.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_ns.load(Ordering::Relaxed).max(0) as u64)
    }

    /// Upper bound, in ms, of the bucket holding the p-th percentile;
    /// the overflow bucket reports the observed maximum.
    fn percentile_ms(&self, p: f64) -> f64 {
        let total = self.count();
        if total == 0 {
            return 0.0;
        }
        let target = (p * total as f64).ceil().max(1.0) as i64;
        let mut seen = 0;
        for (idx, bucket) in self.buckets.iter().enumerate() {
            seen += bucket.load(Ordering::Relaxed);
            if seen >= target {
                return if idx < TIMING_BUCKETS_MS.len() {
                    TIMING_BUCKETS_MS[idx]
                } else {
                    self.max_ns.load(Ordering::Relaxed) as f64 / 1e6
                };
            }
        }
        self.max_ns.load(Ordering::Relaxed) as f64 / 1e6
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "Count": self.count(),
            "TotalNs": self.total_ns.load(Ordering::Relaxed),
            "P50Ms": self.percentile_ms(0.50),
            "P95Ms": self.percentile_ms(0.95),
            "P99Ms": self.percentile_ms(0.99),
        })
    }
}

/// Per-second rate over a sliding window: each sample is the counter
/// delta across one interval divided by the interval length.
#[derive(Debug)]
pub struct Rates {
    interval: Duration,
    max_samples: usize,
    window: Mutex<RateWindow>,
}

#[derive(Debug, Default)]
struct RateWindow {
    samples: VecDeque<f64>,
    last_total: i64,
}

impl Rates {
    fn new(max_samples: usize, interval: Duration) -> Self {
        Self {
            interval,
            max_samples,
            window: Mutex::new(RateWindow::default()),
        }
    }

    /// Feeds the counter's current total as one interval sample.
    pub fn record(&self, total: i64) {
        let mut window = self.window.lock();
        let delta = (total - window.last_total).max(0);
        window.last_total = total;
        let rate = delta as f64 / self.interval.as_secs_f64();
        if window.samples.len() == self.max_samples {
            window.samples.pop_front();
        }
        window.samples.push_back(rate);
    }

    /// Window contents, oldest first.
    pub fn samples(&self) -> Vec<f64> {
        self.window.lock().samples.iter().copied().collect()
    }
}

/// All telemetry of one player.
#[derive(Debug)]
pub struct PlayerStats {
    pub txn_count: Counter,
    pub query_count: Counter,
    pub txn_time: Timings,
    pub query_time: Timings,
    txns_per_sec: Rates,
    queries_per_sec: Rates,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerStats {
    pub fn new() -> Self {
        let interval = Duration::from_nanos(RATE_INTERVAL_NS);
        Self {
            txn_count: Counter::default(),
            query_count: Counter::default(),
            txn_time: Timings::default(),
            query_time: Timings::default(),
            txns_per_sec: Rates::new(RATE_SAMPLES, interval),
            queries_per_sec: Rates::new(RATE_SAMPLES, interval),
        }
    }

    /// Feeds one sample into both rate windows.
    pub fn sample_rates(&self) {
        self.txns_per_sec.record(self.txn_count.get());
        self.queries_per_sec.record(self.query_count.get());
    }

    /// Spawns the periodic rate sampler. The task holds a `Weak`, so it
    /// exits once the collector is dropped.
    pub fn spawn_sampler(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_nanos(RATE_INTERVAL_NS));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            tick.tick().await;
            loop {
                tick.tick().await;
                match weak.upgrade() {
                    Some(stats) => stats.sample_rates(),
                    None => break,
                }
            }
        })
    }

    pub fn json_snapshot(&self) -> String {
        json!({
            "TxnCount": self.txn_count.get(),
            "QueryCount": self.query_count.get(),
            "QueriesPerSec": self.queries_per_sec.samples(),
            "TxnPerSec": self.txns_per_sec.samples(),
            "TxnTime": self.txn_time.summary(),
            "QueryTime": self.query_time.summary(),
        })
        .to_string()
    }
}
