//! Thread-affine weak pointers invalidated by their owner.
//!
//! `weakptr` lets one owner be observed by many non-owning holders. The
//! owner embeds a [`WeakPtrFactory<T>`]; holders keep [`WeakPtr<T>`]s. When
//! the owner invalidates them (explicitly, or by dropping the factory),
//! every holder's next access returns `None` instead of touching a dead
//! object. No shared ownership of `T` is involved.
//!
//! # Features
//!
//! - **Generational invalidation**: [`WeakPtrFactory::invalidate_weak_ptrs`]
//!   cancels every outstanding pointer and keeps the factory usable
//! - **Thread affinity**: all pointers of a generation are bound to one
//!   thread and checked against it in checked builds
//! - **Lock-free validity**: invalidation is a single `Release` store on a
//!   shared [`AtomicFlag`], observed with `Acquire` loads
//! - **Cancelable callbacks**: [`WeakCallback`] runs only while its
//!   receiver is alive
//!
//! # Quick Start
//!
//! ```
//! use weakptr::{SupportsWeakPtr, WeakPtrFactory};
//!
//! #[derive(SupportsWeakPtr)]
//! struct Download {
//!     #[weak_factory]
//!     weak_factory: WeakPtrFactory<Download>,
//!     url: String,
//! }
//!
//! // SAFETY: the box is never moved out of.
//! let download = unsafe {
//!     WeakPtrFactory::new_boxed(|weak_factory| Download {
//!         weak_factory,
//!         url: "https://example.org/file".into(),
//!     })
//! };
//!
//! let weak = download.as_weak_ptr();
//! assert_eq!(weak.get().map(|d| d.url.as_str()), Some("https://example.org/file"));
//!
//! drop(download);
//! assert!(weak.get().is_none());
//! assert!(weak.was_invalidated());
//! ```
//!
//! # Checked builds
//!
//! Thread-affinity and API-misuse checks ([`dcheck!`]) are active when
//! `debug_assertions` are on or the `dcheck-always-on` feature is enabled
//! (see [`DCHECK_IS_ON`]). A failed check panics. In unchecked builds the
//! checks compile away and violating the contract is undefined behavior.
//! Dereferencing a dead `WeakPtr` through `Deref` panics in every build.
//!
//! # Thread Safety
//!
//! `WeakPtr<T>` is `Send + Sync` when `T: Sync`, so it can travel to other
//! threads, but only [`WeakPtr::maybe_valid`] is meaningful off the bound
//! thread. A generation can move to another thread once no pointer of it is
//! outstanding: the next [`WeakPtrFactory::get_weak_ptr`] rebinds.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod atomic_flag;
mod callback;
pub mod check;
mod factory;
mod ptr;
mod thread_checker;
mod tracing;

/// Invalidation flags and the owner/reference pair built on them.
///
/// This module is public for custom weak-handle types. Most users should
/// use `WeakPtrFactory<T>` directly.
pub mod reference;

// Re-export public API
pub use atomic_flag::AtomicFlag;
pub use callback::WeakCallback;
pub use check::DCHECK_IS_ON;
pub use factory::{SupportsWeakPtr, WeakPtrFactory};
pub use ptr::{WeakPtr, WeakPtrMut};
pub use reference::{WeakReference, WeakReferenceOwner};
pub use thread_checker::ThreadChecker;

// Re-export derive macro when feature is enabled
#[cfg(feature = "derive")]
pub use weakptr_derive::SupportsWeakPtr;
