//! Elapsed-time reporting for coarse operations (discovery, table builds).
//!
//! ```rust
//! use smimon_tracing::TimedSpan;
//!
//! {
//!     let _timer = TimedSpan::new("probe_gpu", Some(100));
//!     // ... work ...
//! } // reported only when it took at least 100µs
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::Level;

const NO_THRESHOLD: u64 = u64::MAX;

static DEFAULT_THRESHOLD_US: AtomicU64 = AtomicU64::new(NO_THRESHOLD);

pub(crate) fn set_default_threshold(threshold_us: Option<u64>) {
    DEFAULT_THRESHOLD_US.store(threshold_us.unwrap_or(NO_THRESHOLD), Ordering::Relaxed);
}

/// Threshold installed by [`crate::init_global_tracing`], if any.
pub fn default_threshold() -> Option<u64> {
    match DEFAULT_THRESHOLD_US.load(Ordering::Relaxed) {
        NO_THRESHOLD => None,
        value => Some(value),
    }
}

/// RAII guard that logs `duration_us` when dropped.
pub struct TimedSpan {
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl TimedSpan {
    /// Debug-level span; `None` falls back to the globally configured threshold.
    pub fn new(name: &'static str, threshold_us: Option<u64>) -> Self {
        Self::with_level(Level::DEBUG, name, threshold_us)
    }

    pub fn with_level(level: Level, name: &'static str, threshold_us: Option<u64>) -> Self {
        let span = match level {
            Level::TRACE => tracing::trace_span!("timed", name),
            Level::DEBUG => tracing::debug_span!("timed", name),
            Level::INFO => tracing::info_span!("timed", name),
            Level::WARN => tracing::warn_span!("timed", name),
            Level::ERROR => tracing::error_span!("timed", name),
        };
        Self {
            threshold_us: threshold_us.or_else(default_threshold),
            start_time: Instant::now(),
            span,
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for TimedSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();
        if self.threshold_us.map_or(true, |t| elapsed_us >= t) {
            let _entered = self.span.enter();
            tracing::debug!(duration_us = elapsed_us, "timed_span_complete");
        }
    }
}
