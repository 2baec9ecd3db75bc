//! Structured logging support.
//!
//! When the `tracing` feature is enabled, this module emits structured
//! events for invalidation, dooming, thread rebinding and check failures.
//! Without the feature every hook compiles to nothing.

#[cfg(feature = "tracing")]
pub mod internal {
    use std::fmt;

    /// Log the invalidation of one flag generation.
    ///
    /// `outstanding` is the number of `WeakReference`s still holding the
    /// invalidated flag at the moment of invalidation.
    pub fn log_invalidated(generation: u64, outstanding: usize) {
        ::tracing::debug!(generation, outstanding, "weak_ptrs_invalidated");
    }

    /// Log a permanent invalidation.
    pub fn log_doomed(generation: u64, outstanding: usize) {
        ::tracing::debug!(generation, outstanding, "weak_ptrs_doomed");
    }

    /// Log an explicit bind of a flag to the calling thread.
    pub fn log_bound() {
        ::tracing::trace!(thread = ?std::thread::current().id(), "flag_bound");
    }

    /// Log a failed check just before panicking.
    pub fn log_check_failed(message: &fmt::Arguments<'_>) {
        ::tracing::error!(reason = %message, "check_failed");
    }
}

#[cfg(not(feature = "tracing"))]
pub mod internal {
    use std::fmt;

    /// Stub function when tracing is disabled.
    #[inline]
    pub const fn log_invalidated(_generation: u64, _outstanding: usize) {}

    /// Stub function when tracing is disabled.
    #[inline]
    pub const fn log_doomed(_generation: u64, _outstanding: usize) {}

    /// Stub function when tracing is disabled.
    #[inline]
    pub const fn log_bound() {}

    /// Stub function when tracing is disabled.
    #[inline]
    pub const fn log_check_failed(_message: &fmt::Arguments<'_>) {}
}
