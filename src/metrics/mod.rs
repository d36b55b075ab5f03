//! Observability metrics for trackseq.
//!
//! All metrics use relaxed atomics so recording never contends with the
//! allocation path.

pub mod histogram;
pub mod registry;

pub use histogram::Histogram;
pub use registry::AllocatorMetrics;
