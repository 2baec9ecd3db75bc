//! The `WeakPtr<T>` handle.
//!
//! A `WeakPtr<T>` pairs a [`WeakReference`] with the address of a `T`. It
//! never keeps `T` alive; every access re-checks the reference, so a handle
//! that outlives its target simply stops yielding it.

#![allow(clippy::ptr_as_ptr)]

use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::callback::WeakCallback;
use crate::reference::WeakReference;

// ============================================================================
// WeakPtr<T>
// ============================================================================

/// A non-owning pointer that its [`WeakPtrFactory`](crate::WeakPtrFactory)
/// can invalidate.
///
/// Obtain one from [`WeakPtrFactory::get_weak_ptr`](crate::WeakPtrFactory::get_weak_ptr).
/// All handles from the same factory generation share one invalidation
/// flag. Accessing the target ([`get`](Self::get), `Deref`,
/// [`is_valid`](Self::is_valid)) must happen on the thread the generation is
/// bound to; checked builds enforce this.
///
/// # Examples
///
/// ```
/// use std::ptr::NonNull;
/// use weakptr::{WeakPtr, WeakPtrFactory};
///
/// let data = Box::new(7);
/// // SAFETY: `data` is neither moved nor dropped before `factory`.
/// let factory = unsafe { WeakPtrFactory::new(NonNull::from(&*data)) };
///
/// let weak: WeakPtr<i32> = factory.get_weak_ptr();
/// assert_eq!(weak.get(), Some(&7));
///
/// factory.invalidate_weak_ptrs();
/// assert_eq!(weak.get(), None);
/// assert!(weak.was_invalidated());
/// ```
pub struct WeakPtr<T: ?Sized> {
    reference: WeakReference,
    ptr: Option<NonNull<T>>,
}

impl<T: ?Sized> WeakPtr<T> {
    /// A handle that never pointed at anything.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            reference: WeakReference::null(),
            ptr: None,
        }
    }

    pub(crate) const fn from_parts(reference: WeakReference, ptr: Option<NonNull<T>>) -> Self {
        Self { reference, ptr }
    }

    /// Returns the target if it is still valid.
    ///
    /// # Panics
    ///
    /// In checked builds, panics when called off the bound thread.
    #[track_caller]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        if !self.reference.is_valid() {
            return None;
        }
        // SAFETY: the reference is valid, so the factory that issued it has
        // not been invalidated or dropped and its target is alive.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Returns `true` if [`get`](Self::get) would return the target.
    #[track_caller]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.ptr.is_some() && self.reference.is_valid()
    }

    /// Loose, thread-agnostic validity check.
    ///
    /// A `false` result is final. A `true` result may already be stale when
    /// it returns: it is a cheap way to skip pointless cross-thread work, but
    /// the target must still be reached through [`get`](Self::get) on the
    /// bound thread.
    #[must_use]
    pub fn maybe_valid(&self) -> bool {
        self.reference.maybe_valid()
    }

    /// Returns `true` if this handle pointed at a target that has since been
    /// invalidated. Null and [`reset`](Self::reset) handles return `false`.
    #[track_caller]
    #[must_use]
    pub fn was_invalidated(&self) -> bool {
        self.ptr.is_some() && !self.reference.is_valid()
    }

    /// Clears the handle.
    pub fn reset(&mut self) {
        self.reference.reset();
        self.ptr = None;
    }

    /// Returns `true` if both handles store the same address.
    ///
    /// Validity is not consulted: two invalidated handles that pointed at
    /// the same target still compare equal.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (this.ptr, other.ptr) {
            (Some(a), Some(b)) => std::ptr::addr_eq(a.as_ptr(), b.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }

    /// Narrows the handle to a part of the target, such as a field.
    ///
    /// The resulting handle shares this handle's invalidation flag. The
    /// projection runs against the live target, so the target must be valid
    /// and the call must happen on the bound thread. Projecting an
    /// invalidated or null handle yields [`WeakPtr::null`].
    ///
    /// # Examples
    ///
    /// ```
    /// use weakptr::WeakPtrFactory;
    ///
    /// struct Pair {
    ///     left: u64,
    ///     right: u64,
    /// }
    ///
    /// let pair = Box::new(Pair { left: 1, right: 2 });
    /// // SAFETY: `pair` outlives `factory`.
    /// let factory = unsafe { WeakPtrFactory::new(std::ptr::NonNull::from(&*pair)) };
    ///
    /// let right = factory.get_weak_ptr().project(|pair| &pair.right);
    /// assert_eq!(right.get(), Some(&2));
    /// # assert_eq!(pair.left, 1);
    /// ```
    #[track_caller]
    #[must_use]
    pub fn project<U: ?Sized>(self, f: impl FnOnce(&T) -> &U) -> WeakPtr<U> {
        let Some(target) = self.get() else {
            return WeakPtr::null();
        };
        let projected = NonNull::from(f(target));
        WeakPtr {
            reference: self.reference,
            ptr: Some(projected),
        }
    }

    /// Re-types the stored address with `f` and keeps the invalidation flag.
    ///
    /// Unlike [`project`](Self::project) this never touches the target, so
    /// it works on invalidated handles and on any thread.
    /// [`weak_upcast!`](crate::weak_upcast) builds on it for unsizing
    /// conversions.
    ///
    /// # Safety
    ///
    /// Whenever the original address is valid for reads as a `T`, the
    /// address returned by `f` must be valid for reads as a `U` and must stay
    /// so at least as long as the original target.
    #[must_use]
    pub unsafe fn map_raw<U: ?Sized>(self, f: impl FnOnce(NonNull<T>) -> NonNull<U>) -> WeakPtr<U> {
        WeakPtr {
            reference: self.reference,
            ptr: self.ptr.map(f),
        }
    }

    /// Binds `f` to this handle as its receiver.
    ///
    /// The returned callback runs `f` only while the target is valid.
    #[must_use]
    pub const fn bind<F>(self, f: F) -> WeakCallback<T, F> {
        WeakCallback::new(self, f)
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        Self {
            reference: self.reference.clone(),
            ptr: self.ptr,
        }
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    /// Equivalent to [`WeakPtr::null`]. Together with [`std::mem::take`] this
    /// gives a move that clears the source.
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Deref for WeakPtr<T> {
    type Target = T;

    /// # Panics
    ///
    /// Always panics (in every build) if the handle is null or invalidated.
    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(target) => target,
            None => crate::check::check_failed(format_args!(
                "dereferenced a null or invalidated WeakPtr"
            )),
        }
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPtr")
            .field("ptr", &self.ptr.map(|ptr| ptr.as_ptr() as *const ()))
            .field("maybe_valid", &self.maybe_valid())
            .finish()
    }
}

// A `WeakPtr` only ever hands out `&T`, and only on the bound thread.
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: ?Sized + Sync> Send for WeakPtr<T> {}
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: ?Sized + Sync> Sync for WeakPtr<T> {}

/// Converts a [`WeakPtr`] by unsizing coercion, e.g. to a trait object.
///
/// The address is kept as is and the flag is shared, so the conversion works
/// on invalidated handles and on any thread.
///
/// # Examples
///
/// ```
/// use std::fmt::Display;
/// use weakptr::{weak_upcast, WeakPtr, WeakPtrFactory};
///
/// let value = Box::new(42_u32);
/// // SAFETY: `value` outlives `factory`.
/// let factory = unsafe { WeakPtrFactory::new(std::ptr::NonNull::from(&*value)) };
///
/// let display: WeakPtr<dyn Display> = weak_upcast!(factory.get_weak_ptr() => dyn Display);
/// assert_eq!(display.get().map(ToString::to_string).as_deref(), Some("42"));
/// ```
#[macro_export]
macro_rules! weak_upcast {
    ($ptr:expr => $target:ty) => {{
        let ptr: $crate::WeakPtr<_> = $ptr;
        // SAFETY: an unsizing coercion keeps the address and provenance of
        // the original target.
        unsafe { ptr.map_raw(|raw| -> ::core::ptr::NonNull<$target> { raw }) }
    }};
}

// ============================================================================
// WeakPtrMut<T>
// ============================================================================

/// The mutable flavour of [`WeakPtr`], from
/// [`WeakPtrFactory::get_mutable_weak_ptr`](crate::WeakPtrFactory::get_mutable_weak_ptr).
///
/// Converts into a `WeakPtr<T>` with `From`; there is no
/// conversion in the other direction.
pub struct WeakPtrMut<T: ?Sized> {
    inner: WeakPtr<T>,
}

impl<T: ?Sized> WeakPtrMut<T> {
    /// A handle that never pointed at anything.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            inner: WeakPtr::null(),
        }
    }

    pub(crate) const fn from_weak(inner: WeakPtr<T>) -> Self {
        Self { inner }
    }

    /// Shared access, see [`WeakPtr::get`].
    #[track_caller]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.inner.get()
    }

    /// Exclusive access to a still valid target.
    ///
    /// # Safety
    ///
    /// No other reference to the target may be alive while the returned
    /// reference is, including references obtained through other handles of
    /// the same factory or through the owner itself.
    #[track_caller]
    #[must_use]
    pub unsafe fn get_mut(&mut self) -> Option<&mut T> {
        if !self.inner.reference.is_valid() {
            return None;
        }
        // SAFETY: the target is alive (valid reference) and the caller
        // guarantees exclusivity.
        self.inner.ptr.map(|mut ptr| unsafe { ptr.as_mut() })
    }

    /// See [`WeakPtr::is_valid`].
    #[track_caller]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    /// See [`WeakPtr::maybe_valid`].
    #[must_use]
    pub fn maybe_valid(&self) -> bool {
        self.inner.maybe_valid()
    }

    /// See [`WeakPtr::was_invalidated`].
    #[track_caller]
    #[must_use]
    pub fn was_invalidated(&self) -> bool {
        self.inner.was_invalidated()
    }

    /// Clears the handle.
    pub fn reset(&mut self) {
        self.inner.reset();
    }

    /// Gives up mutable access.
    #[must_use]
    pub fn into_shared(self) -> WeakPtr<T> {
        self.inner
    }
}

impl<T: ?Sized> From<WeakPtrMut<T>> for WeakPtr<T> {
    fn from(ptr: WeakPtrMut<T>) -> Self {
        ptr.into_shared()
    }
}

impl<T: ?Sized> Clone for WeakPtrMut<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> Default for WeakPtrMut<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtrMut<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakPtrMut").field(&self.inner).finish()
    }
}

// Mutable access moves `&mut T` across threads, so `T: Send` is needed too.
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: ?Sized + Send + Sync> Send for WeakPtrMut<T> {}
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: ?Sized + Send + Sync> Sync for WeakPtrMut<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WeakPtrFactory;

    #[test]
    fn null_handles_compare_equal() {
        let a: WeakPtr<u8> = WeakPtr::null();
        let b = WeakPtr::default();
        assert!(WeakPtr::ptr_eq(&a, &b));
    }

    #[test]
    fn map_raw_keeps_flag_after_invalidation() {
        let value = Box::new([1_u8, 2, 3]);
        // SAFETY: `value` outlives `factory`.
        let factory = unsafe { WeakPtrFactory::new(NonNull::from(&*value)) };
        let weak = factory.get_weak_ptr();
        factory.invalidate_weak_ptrs();

        let slice: WeakPtr<[u8]> = crate::weak_upcast!(weak => [u8]);
        assert!(slice.was_invalidated());
        assert!(slice.get().is_none());
    }

    #[test]
    fn mutable_handle_writes_through() {
        let mut value = Box::new(10_i32);
        // SAFETY: `value` outlives `factory` and is only accessed through it.
        let factory = unsafe { WeakPtrFactory::new(NonNull::from(&mut *value)) };
        let mut weak = factory.get_mutable_weak_ptr();
        // SAFETY: no other reference to the target is alive.
        if let Some(target) = unsafe { weak.get_mut() } {
            *target += 5;
        }
        assert_eq!(weak.get(), Some(&15));
        drop((weak, factory));
        assert_eq!(*value, 15);
    }
}
