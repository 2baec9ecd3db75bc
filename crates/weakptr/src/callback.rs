//! Callbacks bound to a weak receiver.
//!
//! A [`WeakCallback`] couples a closure with a [`WeakPtr`] receiver. Running
//! it after the receiver was invalidated does nothing, which is how pending
//! work is cancelled: invalidate the factory, and every callback bound to
//! the old generation turns into a no-op.

use std::fmt;

use crate::ptr::WeakPtr;

/// A closure that runs only while its receiver is valid.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use weakptr::WeakPtrFactory;
///
/// struct Counter {
///     weak_factory: WeakPtrFactory<Counter>,
///     hits: Cell<u32>,
/// }
///
/// // SAFETY: the box is never moved out of.
/// let counter = unsafe {
///     WeakPtrFactory::new_boxed(|weak_factory| Counter { weak_factory, hits: Cell::new(0) })
/// };
///
/// let mut on_event = counter
///     .weak_factory
///     .get_weak_ptr()
///     .bind(|counter: &Counter, amount: u32| counter.hits.set(counter.hits.get() + amount));
///
/// assert_eq!(on_event.run(2), Some(()));
/// counter.weak_factory.invalidate_weak_ptrs();
/// assert_eq!(on_event.run(5), None);
/// assert!(on_event.is_cancelled());
/// assert_eq!(counter.hits.get(), 2);
/// ```
pub struct WeakCallback<T: ?Sized, F> {
    receiver: WeakPtr<T>,
    f: F,
}

impl<T: ?Sized, F> WeakCallback<T, F> {
    /// Binds `f` to `receiver`.
    pub const fn new(receiver: WeakPtr<T>, f: F) -> Self {
        Self { receiver, f }
    }

    /// Runs the callback if the receiver is still valid.
    ///
    /// # Panics
    ///
    /// In checked builds, panics when called off the receiver's bound thread.
    #[track_caller]
    pub fn run<A, R>(&mut self, arg: A) -> Option<R>
    where
        F: FnMut(&T, A) -> R,
    {
        let receiver = self.receiver.get()?;
        Some((self.f)(receiver, arg))
    }

    /// Consumes the callback and runs it if the receiver is still valid.
    ///
    /// # Panics
    ///
    /// Same conditions as [`run`](Self::run).
    #[track_caller]
    pub fn run_once<A, R>(self, arg: A) -> Option<R>
    where
        F: FnOnce(&T, A) -> R,
    {
        let receiver = self.receiver.get()?;
        Some((self.f)(receiver, arg))
    }

    /// Returns `true` if running the callback would do nothing.
    ///
    /// # Panics
    ///
    /// In checked builds, panics when called off the receiver's bound thread.
    #[track_caller]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        !self.receiver.is_valid()
    }

    /// Loose check usable from any thread, see [`WeakPtr::maybe_valid`].
    ///
    /// Lets a thread that is about to post this callback to the receiver's
    /// thread skip callbacks that are certainly cancelled.
    #[must_use]
    pub fn maybe_valid(&self) -> bool {
        self.receiver.maybe_valid()
    }

    /// The bound receiver.
    #[must_use]
    pub const fn receiver(&self) -> &WeakPtr<T> {
        &self.receiver
    }
}

impl<T: ?Sized, F: Clone> Clone for WeakCallback<T, F> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
            f: self.f.clone(),
        }
    }
}

impl<T: ?Sized, F> fmt::Debug for WeakCallback<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCallback")
            .field("receiver", &self.receiver)
            .finish_non_exhaustive()
    }
}
