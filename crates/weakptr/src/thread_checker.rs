//! Thread-affinity checking.
//!
//! A [`ThreadChecker`] remembers the thread it was last bound to and answers
//! whether the caller runs on that thread. It starts detached; the first
//! call to [`ThreadChecker::called_on_valid_thread`] binds it.
//!
//! In unchecked builds the checker is zero-sized and every query returns
//! `true`, so affinity checks compile away.

#[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
use parking_lot::Mutex;
#[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
use std::thread::{self, ThreadId};

/// Records which thread a value is bound to.
///
/// # Examples
///
/// ```
/// use weakptr::ThreadChecker;
///
/// let checker = ThreadChecker::new();
/// assert!(checker.called_on_valid_thread());
///
/// let on_other_thread = std::thread::scope(|s| {
///     s.spawn(|| checker.called_on_valid_thread()).join().unwrap()
/// });
/// # if weakptr::DCHECK_IS_ON {
/// assert!(!on_other_thread);
/// # }
/// ```
#[derive(Default)]
pub struct ThreadChecker {
    #[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
    bound: Mutex<Option<ThreadId>>,
}

#[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
impl ThreadChecker {
    /// Creates a detached checker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bound: Mutex::new(None),
        }
    }

    /// Returns `true` if the caller runs on the bound thread.
    ///
    /// A detached checker binds to the caller and returns `true`.
    #[must_use]
    pub fn called_on_valid_thread(&self) -> bool {
        let current = thread::current().id();
        let mut bound = self.bound.lock();
        *bound.get_or_insert(current) == current
    }

    /// Clears the binding. The next caller of
    /// [`called_on_valid_thread`](Self::called_on_valid_thread) rebinds.
    pub fn detach_from_thread(&self) {
        *self.bound.lock() = None;
    }

    /// The thread this checker is bound to, if any.
    #[must_use]
    pub fn bound_thread(&self) -> Option<ThreadId> {
        *self.bound.lock()
    }
}

#[cfg(not(any(debug_assertions, feature = "dcheck-always-on")))]
impl ThreadChecker {
    /// Creates a detached checker.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Always `true` in unchecked builds.
    #[inline]
    #[must_use]
    pub const fn called_on_valid_thread(&self) -> bool {
        true
    }

    /// No-op in unchecked builds.
    #[inline]
    pub const fn detach_from_thread(&self) {}

    /// Always `None` in unchecked builds.
    #[inline]
    #[must_use]
    pub const fn bound_thread(&self) -> Option<std::thread::ThreadId> {
        None
    }
}

impl std::fmt::Debug for ThreadChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadChecker")
            .field("bound", &self.bound_thread())
            .finish()
    }
}
