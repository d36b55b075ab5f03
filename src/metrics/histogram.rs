//! Lock-free latency histogram.
//!
//! Buckets span in-memory allocations (tens of microseconds) up to contended
//! database round trips (hundreds of milliseconds), so `histogram_quantile()`
//! stays meaningful for every backend.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of finite buckets.
pub const BUCKET_COUNT: usize = 12;

/// Bucket upper bounds in microseconds.
pub const HISTOGRAM_BUCKETS: [u64; BUCKET_COUNT] = [
    50,        // 50μs
    100,       // 100μs
    250,       // 250μs
    500,       // 500μs
    1_000,     // 1ms
    2_500,     // 2.5ms
    5_000,     // 5ms
    10_000,    // 10ms
    25_000,    // 25ms
    100_000,   // 100ms
    250_000,   // 250ms
    1_000_000, // 1s
];

/// Cumulative-bucket histogram.
///
/// ```
/// use trackseq::metrics::Histogram;
///
/// let histogram = Histogram::new();
/// histogram.observe(300);
///
/// let (sum, count, buckets) = histogram.snapshot();
/// assert_eq!((sum, count), (300, 1));
/// assert_eq!(buckets[2], 0); // <= 250μs
/// assert_eq!(buckets[3], 1); // <= 500μs
/// ```
pub struct Histogram {
    sum: AtomicU64,
    count: AtomicU64,
    buckets: [AtomicU64; BUCKET_COUNT],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Records an observation in microseconds.
    #[inline]
    pub fn observe(&self, value_us: u64) {
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        // Cumulative: every bucket at or above the value counts it
        for (bucket, &boundary) in self.buckets.iter().zip(HISTOGRAM_BUCKETS.iter()) {
            if value_us <= boundary {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Returns `(sum, count, cumulative bucket counts)`.
    pub fn snapshot(&self) -> (u64, u64, [u64; BUCKET_COUNT]) {
        let sum = self.sum.load(Ordering::Relaxed);
        let count = self.count.load(Ordering::Relaxed);
        let buckets = std::array::from_fn(|i| self.buckets[i].load(Ordering::Relaxed));
        (sum, count, buckets)
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Mean observation, or 0 when empty.
    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Renders the histogram in Prometheus exposition format.
    pub fn format_prometheus(&self, name: &str, help: &str) -> String {
        let (sum, count, buckets) = self.snapshot();
        let mut output = String::with_capacity(1024);

        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} histogram", name);
        for (boundary, bucket) in HISTOGRAM_BUCKETS.iter().zip(buckets.iter()) {
            let _ = writeln!(output, "{}_bucket{{le=\"{}\"}} {}", name, boundary, bucket);
        }
        let _ = writeln!(output, "{}_bucket{{le=\"+Inf\"}} {}", name, count);
        let _ = writeln!(output, "{}_sum {}", name, sum);
        let _ = writeln!(output, "{}_count {}", name, count);

        output
    }
}
