//! Invalidation flags shared between an owner and its weak references.
//!
//! A [`WeakReferenceOwner`] holds the current flag generation and hands
//! out [`WeakReference`]s that share it. Invalidating the owner sets the flag
//! for every outstanding reference at once and, unless the owner is doomed,
//! starts a fresh generation for references created afterwards.
//!
//! ```text
//!  WeakReferenceOwner ──► Arc<Flag> (generation n)   ◄── WeakReference ×k
//!          │ invalidate()
//!          ▼
//!  WeakReferenceOwner ──► Arc<Flag> (generation n+1)
//!                         Arc<Flag> (generation n, invalidated) ◄── WeakReference ×k
//! ```
//!
//! The flag itself stays internal; only the owner can invalidate it.
//!
//! ```compile_fail
//! let _ = weakptr::reference::Flag::invalidate;
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::atomic_flag::AtomicFlag;
use crate::thread_checker::ThreadChecker;

// ============================================================================
// Flag - one invalidation generation
// ============================================================================

/// The shared state behind one generation of weak references.
///
/// Only [`WeakReferenceOwner`] creates flags. Holders read it; the owner is
/// the only party that invalidates or rebinds it.
#[derive(Debug)]
pub(crate) struct Flag {
    invalidated: AtomicFlag,
    thread_checker: ThreadChecker,
}

impl Flag {
    fn new() -> Self {
        Self {
            invalidated: AtomicFlag::new(),
            thread_checker: ThreadChecker::new(),
        }
    }

    /// Marks every reference sharing this flag as invalid.
    ///
    /// Must run on the bound thread, unless the caller holds the only
    /// reference to the flag: with no outstanding weak references an object
    /// may be destroyed on any thread.
    ///
    /// # Panics
    ///
    /// In checked builds, panics when called off the bound thread while
    /// other references to the flag exist.
    #[track_caller]
    pub(crate) fn invalidate(self: &Arc<Self>) {
        crate::dcheck!(
            self.thread_checker.called_on_valid_thread() || Arc::strong_count(self) == 1,
            "WeakPtrs must be invalidated on the thread they are bound to"
        );
        self.invalidated.set();
    }

    /// Strict validity check.
    ///
    /// # Panics
    ///
    /// In checked builds, panics when called off the bound thread. An
    /// unbound flag binds to the caller.
    #[track_caller]
    #[must_use]
    pub(crate) fn is_valid(&self) -> bool {
        crate::dcheck!(
            self.thread_checker.called_on_valid_thread(),
            "WeakPtrs must be checked on the thread they are bound to"
        );
        !self.invalidated.is_set()
    }

    /// Loose validity check, callable from any thread.
    ///
    /// A `false` result is final. A `true` result may already be stale when
    /// it returns, so it only filters out work that is certainly pointless.
    #[inline]
    #[must_use]
    pub(crate) fn maybe_valid(&self) -> bool {
        !self.invalidated.is_set()
    }

    /// Forgets the bound thread so the next strict check rebinds.
    pub(crate) fn detach_from_thread(&self) {
        self.thread_checker.detach_from_thread();
    }

    /// Binds the flag to the calling thread, replacing any earlier binding.
    pub(crate) fn bind_to_current_thread(&self) {
        self.thread_checker.detach_from_thread();
        crate::dcheck!(
            self.thread_checker.called_on_valid_thread(),
            "a detached flag must bind to the calling thread"
        );
        crate::tracing::internal::log_bound();
    }
}

// ============================================================================
// WeakReference - a holder of one flag generation
// ============================================================================

/// A cheap, cloneable handle onto one flag generation.
///
/// A default (or [`reset`](Self::reset)) reference holds no flag and is
/// never valid.
#[derive(Clone, Debug, Default)]
pub struct WeakReference {
    flag: Option<Arc<Flag>>,
}

impl WeakReference {
    /// A reference that holds no flag.
    #[must_use]
    pub const fn null() -> Self {
        Self { flag: None }
    }

    const fn new(flag: Arc<Flag>) -> Self {
        Self { flag: Some(flag) }
    }

    /// Strict check: the flag exists and is not invalidated.
    ///
    /// # Panics
    ///
    /// In checked builds, panics when called off the flag's bound thread.
    #[track_caller]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.flag.as_ref().is_some_and(|flag| flag.is_valid())
    }

    /// Loose check, callable from any thread.
    ///
    /// A `false` result is final. A `true` result may already be stale.
    #[must_use]
    pub fn maybe_valid(&self) -> bool {
        self.flag.as_ref().is_some_and(|flag| flag.maybe_valid())
    }

    /// Drops the held flag, if any.
    pub fn reset(&mut self) {
        self.flag = None;
    }

    /// Returns `true` if both references share the same flag generation.
    #[must_use]
    pub fn same_generation(this: &Self, other: &Self) -> bool {
        match (&this.flag, &other.flag) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ============================================================================
// WeakReferenceOwner - the issuing side
// ============================================================================

struct OwnerState {
    /// `None` once doomed.
    flag: Option<Arc<Flag>>,
    generation: u64,
}

/// Issues [`WeakReference`]s and invalidates them.
///
/// Dropping the owner invalidates the current generation.
///
/// # Examples
///
/// ```
/// use weakptr::WeakReferenceOwner;
///
/// let owner = WeakReferenceOwner::new();
/// let first = owner.get_ref();
/// assert!(first.is_valid());
///
/// owner.invalidate();
/// assert!(!first.is_valid());
/// assert!(owner.get_ref().is_valid());
/// ```
pub struct WeakReferenceOwner {
    state: Mutex<OwnerState>,
}

impl WeakReferenceOwner {
    /// Creates an owner with a fresh, unbound generation-0 flag.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OwnerState {
                flag: Some(Arc::new(Flag::new())),
                generation: 0,
            }),
        }
    }

    /// Returns a reference sharing the current flag.
    ///
    /// When no reference to the current flag is outstanding, the flag is
    /// first detached from its thread. An object built on one thread can thus
    /// be handed to another thread, provided no weak reference is in flight,
    /// and its first reference there binds to the new thread.
    ///
    /// # Panics
    ///
    /// In checked builds, panics if the owner is doomed. Unchecked builds
    /// return a null reference instead.
    #[track_caller]
    #[must_use]
    pub fn get_ref(&self) -> WeakReference {
        let state = self.state.lock();
        let Some(flag) = &state.flag else {
            drop(state);
            crate::dcheck!(false, "get_ref() called on a doomed WeakReferenceOwner");
            return WeakReference::null();
        };
        if Arc::strong_count(flag) == 1 {
            flag.detach_from_thread();
        }
        WeakReference::new(Arc::clone(flag))
    }

    /// Returns `true` if any reference to the current flag is outstanding.
    ///
    /// Advisory when references live on other threads.
    #[must_use]
    pub fn has_refs(&self) -> bool {
        self.state
            .lock()
            .flag
            .as_ref()
            .is_some_and(|flag| Arc::strong_count(flag) > 1)
    }

    /// Invalidates every outstanding reference and starts a new generation.
    ///
    /// # Panics
    ///
    /// In checked builds, panics when called off the bound thread while
    /// references are outstanding.
    #[track_caller]
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        let previous = state.flag.replace(Arc::new(Flag::new()));
        let generation = state.generation;
        state.generation += 1;
        drop(state);

        if let Some(flag) = previous {
            crate::tracing::internal::log_invalidated(generation, Arc::strong_count(&flag) - 1);
            flag.invalidate();
        }
    }

    /// Invalidates every outstanding reference without starting a new
    /// generation. The owner cannot issue valid references afterwards.
    ///
    /// # Panics
    ///
    /// Same conditions as [`invalidate`](Self::invalidate).
    #[track_caller]
    pub fn invalidate_and_doom(&self) {
        let mut state = self.state.lock();
        let previous = state.flag.take();
        let generation = state.generation;
        drop(state);

        if let Some(flag) = previous {
            crate::tracing::internal::log_doomed(generation, Arc::strong_count(&flag) - 1);
            flag.invalidate();
        }
    }

    /// Binds the current flag to the calling thread without issuing a
    /// reference.
    pub fn bind_to_current_thread(&self) {
        if let Some(flag) = &self.state.lock().flag {
            flag.bind_to_current_thread();
        }
    }

    /// Number of completed [`invalidate`](Self::invalidate) calls.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Returns `true` after [`invalidate_and_doom`](Self::invalidate_and_doom).
    #[must_use]
    pub fn is_doomed(&self) -> bool {
        self.state.lock().flag.is_none()
    }
}

impl Default for WeakReferenceOwner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WeakReferenceOwner {
    fn drop(&mut self) {
        if let Some(flag) = self.state.get_mut().flag.take() {
            flag.invalidate();
        }
    }
}

impl std::fmt::Debug for WeakReferenceOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WeakReferenceOwner")
            .field("generation", &state.generation)
            .field("doomed", &state.flag.is_none())
            .field(
                "refs",
                &state.flag.as_ref().map_or(0, |flag| Arc::strong_count(flag) - 1),
            )
            .finish()
    }
}
