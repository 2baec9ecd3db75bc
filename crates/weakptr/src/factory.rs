//! `WeakPtrFactory<T>`, the issuing side of `WeakPtr<T>`.

use std::fmt;
use std::mem::{ManuallyDrop, MaybeUninit};
use std::ptr::NonNull;

use crate::ptr::{WeakPtr, WeakPtrMut};
use crate::reference::WeakReferenceOwner;

/// Issues and invalidates [`WeakPtr`]s to one target.
///
/// The factory normally lives inside its target as the **first** field.
/// Rust drops fields in declaration order, so declaring it first invalidates
/// every outstanding `WeakPtr` before any other field is torn down, while
/// the target's own `Drop` impl (which runs before any field) still sees
/// valid handles.
///
/// Dropping the factory invalidates every outstanding `WeakPtr`.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use weakptr::WeakPtrFactory;
///
/// struct Controller {
///     weak_factory: WeakPtrFactory<Controller>,
///     clicks: Cell<u32>,
/// }
///
/// // SAFETY: the box is never moved out of and the controller is only
/// // dropped once no `get()` borrow is alive.
/// let controller = unsafe {
///     WeakPtrFactory::new_boxed(|weak_factory| Controller {
///         weak_factory,
///         clicks: Cell::new(0),
///     })
/// };
///
/// let weak = controller.weak_factory.get_weak_ptr();
/// if let Some(controller) = weak.get() {
///     controller.clicks.set(controller.clicks.get() + 1);
/// }
///
/// drop(controller);
/// assert!(weak.get().is_none());
/// ```
pub struct WeakPtrFactory<T: ?Sized> {
    owner: WeakReferenceOwner,
    target: NonNull<T>,
}

impl<T: ?Sized> WeakPtrFactory<T> {
    /// Creates a factory for the value at `target`.
    ///
    /// # Safety
    ///
    /// - `target` must point to a live `T` that stays at the same address
    ///   until this factory is dropped or doomed.
    /// - The target must not be dropped, moved or mutably borrowed while a
    ///   reference obtained through one of the factory's `WeakPtr`s is alive.
    /// - For [`get_mutable_weak_ptr`](Self::get_mutable_weak_ptr),
    ///   `target` must be derived from a unique borrow or allocation.
    #[must_use]
    pub unsafe fn new(target: NonNull<T>) -> Self {
        Self {
            owner: WeakReferenceOwner::new(),
            target,
        }
    }

    /// Returns a `WeakPtr` sharing the current generation's flag.
    ///
    /// # Panics
    ///
    /// In checked builds, panics if the factory is doomed. Unchecked builds
    /// return a null `WeakPtr` instead.
    #[track_caller]
    #[must_use]
    pub fn get_weak_ptr(&self) -> WeakPtr<T> {
        if self.owner.is_doomed() {
            crate::dcheck!(false, "get_weak_ptr() called on a doomed WeakPtrFactory");
            return WeakPtr::null();
        }
        WeakPtr::from_parts(self.owner.get_ref(), Some(self.target))
    }

    /// Returns a [`WeakPtrMut`], even through a shared borrow of the
    /// factory.
    ///
    /// Meant for narrow cases such as a lazily built cache behind a shared
    /// accessor. Writing still requires the `unsafe`
    /// [`WeakPtrMut::get_mut`].
    ///
    /// # Panics
    ///
    /// Same conditions as [`get_weak_ptr`](Self::get_weak_ptr).
    #[track_caller]
    #[must_use]
    pub fn get_mutable_weak_ptr(&self) -> WeakPtrMut<T> {
        WeakPtrMut::from_weak(self.get_weak_ptr())
    }

    /// Invalidates every outstanding `WeakPtr`. The factory stays usable and
    /// later calls to [`get_weak_ptr`](Self::get_weak_ptr) start a new
    /// generation.
    ///
    /// # Panics
    ///
    /// In checked builds, panics if the factory is doomed, or when called off
    /// the bound thread while `WeakPtr`s are outstanding.
    #[track_caller]
    pub fn invalidate_weak_ptrs(&self) {
        crate::dcheck!(
            !self.owner.is_doomed(),
            "invalidate_weak_ptrs() called on a doomed WeakPtrFactory"
        );
        self.owner.invalidate();
    }

    /// Invalidates every outstanding `WeakPtr` for good. The factory cannot
    /// issue `WeakPtr`s afterwards.
    ///
    /// Cheaper than [`invalidate_weak_ptrs`](Self::invalidate_weak_ptrs)
    /// because no new generation is allocated; meant to run right before the
    /// target is destroyed.
    ///
    /// # Panics
    ///
    /// Same conditions as [`invalidate_weak_ptrs`](Self::invalidate_weak_ptrs).
    #[track_caller]
    pub fn invalidate_weak_ptrs_and_doom(&self) {
        crate::dcheck!(
            !self.owner.is_doomed(),
            "invalidate_weak_ptrs_and_doom() called on a doomed WeakPtrFactory"
        );
        self.owner.invalidate_and_doom();
    }

    /// Returns `true` if the factory is usable and any `WeakPtr` of the
    /// current generation is outstanding.
    ///
    /// Advisory when `WeakPtr`s live on other threads.
    #[must_use]
    pub fn has_weak_ptrs(&self) -> bool {
        !self.owner.is_doomed() && self.owner.has_refs()
    }

    /// Binds the current generation to the calling thread without creating
    /// a `WeakPtr`.
    ///
    /// Lets a target built on one thread claim the thread it will live on
    /// before any `WeakPtr` is taken.
    pub fn bind_to_current_thread(&self) {
        self.owner.bind_to_current_thread();
    }

    /// Number of completed [`invalidate_weak_ptrs`](Self::invalidate_weak_ptrs) calls.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.owner.generation()
    }

    /// Returns `true` after
    /// [`invalidate_weak_ptrs_and_doom`](Self::invalidate_weak_ptrs_and_doom).
    #[must_use]
    pub fn is_doomed(&self) -> bool {
        self.owner.is_doomed()
    }

    /// Returns `true` if this factory issues pointers to `target`.
    #[must_use]
    pub fn targets(&self, target: &T) -> bool {
        std::ptr::addr_eq(self.target.as_ptr(), std::ptr::from_ref(target))
    }
}

impl<T> WeakPtrFactory<T> {
    /// Allocates a `T` whose factory points at its final heap address.
    ///
    /// `build` receives the factory and returns the value to place in the
    /// allocation; store the factory as the first field.
    ///
    /// # Safety
    ///
    /// The returned box must not be moved out of (`*boxed`), and it must not
    /// be dropped while a reference obtained through one of the factory's
    /// `WeakPtr`s is alive. See [`new`](Self::new).
    #[must_use]
    pub unsafe fn new_boxed(build: impl FnOnce(Self) -> T) -> Box<T> {
        let slot = UninitSlot::<T>::new();
        // SAFETY: the allocation stays put until the returned box is dropped,
        // and the caller upholds the borrow rules.
        let factory = unsafe { Self::new(slot.ptr.cast::<T>()) };
        // A panic in `build` drops `slot`, which frees the allocation.
        let value = build(factory);
        slot.init(value)
    }
}

/// A heap slot for a `T` that is freed, without dropping a `T`, unless it
/// gets initialized.
struct UninitSlot<T> {
    ptr: NonNull<MaybeUninit<T>>,
}

impl<T> UninitSlot<T> {
    fn new() -> Self {
        Self {
            ptr: NonNull::from(Box::leak(Box::<T>::new_uninit())),
        }
    }

    fn init(self, value: T) -> Box<T> {
        let slot = ManuallyDrop::new(self);
        let raw = slot.ptr.as_ptr();
        // SAFETY: `raw` came from `Box::leak` and ownership passes back to a
        // `Box` exactly once, here, after the slot is initialized.
        unsafe {
            raw.write(MaybeUninit::new(value));
            Box::from_raw(raw.cast::<T>())
        }
    }
}

impl<T> Drop for UninitSlot<T> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `Box::leak` and was never initialized, so
        // freeing it as `MaybeUninit<T>` runs no destructor.
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtrFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPtrFactory")
            .field("target", &self.target.as_ptr().cast::<()>())
            .field("owner", &self.owner)
            .finish()
    }
}

// The factory only ever hands out `WeakPtr<T>`, which is `Send`/`Sync` for
// `T: Sync`.
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: ?Sized + Sync> Send for WeakPtrFactory<T> {}
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl<T: ?Sized + Sync> Sync for WeakPtrFactory<T> {}

// ============================================================================
// SupportsWeakPtr
// ============================================================================

/// Types that embed their own [`WeakPtrFactory`].
///
/// Usually implemented with `#[derive(SupportsWeakPtr)]`, which picks the
/// field marked `#[weak_factory]` (or the only `WeakPtrFactory` field) and
/// requires it to be declared first.
///
/// # Examples
///
/// ```
/// use weakptr::{SupportsWeakPtr, WeakPtrFactory};
///
/// struct Session {
///     weak_factory: WeakPtrFactory<Session>,
///     id: u32,
/// }
///
/// impl SupportsWeakPtr for Session {
///     fn weak_ptr_factory(&self) -> &WeakPtrFactory<Self> {
///         &self.weak_factory
///     }
/// }
///
/// // SAFETY: the box is never moved out of.
/// let session = unsafe { WeakPtrFactory::new_boxed(|weak_factory| Session { weak_factory, id: 9 }) };
/// assert_eq!(session.as_weak_ptr().get().map(|s| s.id), Some(9));
/// ```
pub trait SupportsWeakPtr {
    /// The factory embedded in `self`.
    fn weak_ptr_factory(&self) -> &WeakPtrFactory<Self>;

    /// Returns a [`WeakPtr`] to `self`.
    ///
    /// # Panics
    ///
    /// In checked builds, panics if the factory targets another address,
    /// which happens when `self` was moved after the factory was created.
    #[track_caller]
    fn as_weak_ptr(&self) -> WeakPtr<Self> {
        let factory = self.weak_ptr_factory();
        crate::dcheck!(
            factory.targets(self),
            "as_weak_ptr(): the value moved after its WeakPtrFactory was created"
        );
        factory.get_weak_ptr()
    }
}
