//! Convenience macros over [`crate::TimedSpan`].

/// Start a [`crate::TimedSpan`], optionally recording fields on an enclosing span.
///
/// ```rust
/// use smimon_tracing::timed_span;
///
/// let _timer = timed_span!("build_table", devices = 2);
/// ```
#[macro_export]
macro_rules! timed_span {
    ($name:expr) => {{
        $crate::timing::TimedSpan::new($name, None)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        $crate::debug!(span = $name, $($field = $value),+, "timed_span_start");
        $crate::timing::TimedSpan::new($name, None)
    }};
}
