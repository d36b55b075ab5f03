//! Allocation metrics and their Prometheus rendering.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use super::Histogram;
use crate::contracts::AllocatorError;

/// Counters for the tracking-ID allocation path.
#[derive(Default)]
pub struct AllocatorMetrics {
    /// Identifiers handed out
    pub issued_total: AtomicU64,
    /// Calls that failed with `StorageUnavailable` (including request timeouts)
    pub storage_unavailable_total: AtomicU64,
    /// Calls that failed with `MalformedState`
    pub malformed_state_total: AtomicU64,
    /// Rolled-back increments retried by the durable allocator
    pub conflict_retries_total: AtomicU64,
    /// Last counter value issued, across all dates
    pub last_counter: AtomicU64,
    /// `generate()` latency in microseconds, successes only
    pub generate_latency_us: Histogram,
    start_time: OnceLock<Instant>,
}

impl AllocatorMetrics {
    pub fn new() -> Self {
        let m = Self::default();
        let _ = m.start_time.set(Instant::now());
        m
    }

    #[inline]
    pub fn record_issued(&self, counter: u64, latency_us: u64) {
        self.issued_total.fetch_add(1, Ordering::Relaxed);
        self.last_counter.store(counter, Ordering::Relaxed);
        self.generate_latency_us.observe(latency_us);
    }

    #[inline]
    pub fn record_failure(&self, error: &AllocatorError) {
        let counter = match error {
            AllocatorError::StorageUnavailable(_) => &self.storage_unavailable_total,
            AllocatorError::MalformedState { .. } => &self.malformed_state_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Mirrors the allocator's running retry count.
    pub fn set_conflict_retries(&self, total: u64) {
        self.conflict_retries_total.store(total, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time
            .get()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn failures_total(&self) -> u64 {
        self.storage_unavailable_total.load(Ordering::Relaxed)
            + self.malformed_state_total.load(Ordering::Relaxed)
    }

    /// Formats all metrics in Prometheus exposition format.
    pub fn format_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        write_counter(
            &mut output,
            "trackseq_issued_total",
            "Tracking ids issued",
            self.issued_total.load(Ordering::Relaxed),
        );

        let _ = writeln!(
            output,
            "# HELP trackseq_generate_failures_total Failed tracking id allocations by error"
        );
        let _ = writeln!(output, "# TYPE trackseq_generate_failures_total counter");
        let _ = writeln!(
            output,
            "trackseq_generate_failures_total{{error=\"storage_unavailable\"}} {}",
            self.storage_unavailable_total.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            output,
            "trackseq_generate_failures_total{{error=\"malformed_state\"}} {}",
            self.malformed_state_total.load(Ordering::Relaxed)
        );
        output.push('\n');

        write_counter(
            &mut output,
            "trackseq_conflict_retries_total",
            "Sequence increments retried after a conflict",
            self.conflict_retries_total.load(Ordering::Relaxed),
        );

        let _ = writeln!(
            output,
            "# HELP trackseq_last_counter Most recent counter value issued"
        );
        let _ = writeln!(output, "# TYPE trackseq_last_counter gauge");
        let _ = writeln!(
            output,
            "trackseq_last_counter {}",
            self.last_counter.load(Ordering::Relaxed)
        );
        output.push('\n');

        let _ = writeln!(output, "# HELP trackseq_uptime_seconds Process uptime");
        let _ = writeln!(output, "# TYPE trackseq_uptime_seconds gauge");
        let _ = writeln!(output, "trackseq_uptime_seconds {:.3}", self.uptime_secs());
        output.push('\n');

        output.push_str(&self.generate_latency_us.format_prometheus(
            "trackseq_generate_latency_us",
            "Histogram of successful generate() latency in microseconds",
        ));

        output
    }
}

fn write_counter(output: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(output, "# HELP {} {}", name, help);
    let _ = writeln!(output, "# TYPE {} counter", name);
    let _ = writeln!(output, "{} {}", name, value);
    output.push('\n');
}
