//! A one-way, thread-safe boolean latch.

#[cfg(loom)]
use loom::sync::atomic::{AtomicU8, Ordering};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicU8, Ordering};

use crate::thread_checker::ThreadChecker;

/// A flag that can be set once and observed from any thread.
///
/// [`set`](Self::set) stores with `Release` ordering and
/// [`is_set`](Self::is_set) loads with `Acquire` ordering: a thread that
/// observes the flag as set also observes every write the setting thread
/// made before setting it.
///
/// All calls to `set` must come from the same thread over the flag's
/// lifetime. Checked builds assert this; unchecked builds do not.
///
/// # Examples
///
/// ```
/// use weakptr::AtomicFlag;
///
/// let flag = AtomicFlag::new();
/// assert!(!flag.is_set());
/// flag.set();
/// flag.set();
/// assert!(flag.is_set());
/// ```
pub struct AtomicFlag {
    flag: AtomicU8,
    set_thread_checker: ThreadChecker,
}

impl AtomicFlag {
    /// Creates an unset flag that is not bound to any thread.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: AtomicU8::new(0),
            set_thread_checker: ThreadChecker::new(),
        }
    }

    /// Sets the flag. Idempotent.
    ///
    /// # Panics
    ///
    /// In checked builds, panics if called from a different thread than an
    /// earlier `set`.
    #[track_caller]
    pub fn set(&self) {
        crate::dcheck!(
            self.set_thread_checker.called_on_valid_thread(),
            "AtomicFlag::set() must be called from the same thread on every call"
        );
        self.flag.store(1, Ordering::Release);
    }

    /// Returns `true` if [`set`](Self::set) happened before this call.
    ///
    /// May be called from any thread.
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire) != 0
    }

    /// Clears the flag and detaches it from its setting thread.
    ///
    /// Code relying on a set flag never becoming unset breaks if this is
    /// called while other threads observe the flag. Tests only.
    pub fn unsafe_reset_for_testing(&self) {
        self.set_thread_checker.detach_from_thread();
        self.flag.store(0, Ordering::Release);
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AtomicFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicFlag")
            .field("is_set", &self.is_set())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn reset_detaches_setting_thread() {
        let flag = AtomicFlag::new();
        flag.set();
        flag.unsafe_reset_for_testing();
        assert!(!flag.is_set());

        // The checker was detached, so another thread may set it now.
        std::thread::scope(|s| {
            s.spawn(|| flag.set()).join().unwrap();
        });
        assert!(flag.is_set());
    }
}
