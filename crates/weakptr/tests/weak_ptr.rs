//! Tests for `WeakPtr<T>`.

use std::ptr::NonNull;

use weakptr::{weak_upcast, WeakPtr, WeakPtrFactory};

fn factory_for<T: ?Sized>(target: &T) -> WeakPtrFactory<T> {
    // SAFETY: every test drops the factory, and stops using borrows obtained
    // through it, before the target goes away.
    unsafe { WeakPtrFactory::new(NonNull::from(target)) }
}

// ============================================================================
// Basic access
// ============================================================================

#[test]
fn test_get_returns_target() {
    let data = 42_i32;
    let factory = factory_for(&data);
    let weak = factory.get_weak_ptr();

    assert!(std::ptr::eq(weak.get().unwrap(), &data));
    assert!(weak.is_valid());
    assert!(!weak.was_invalidated());
    assert_eq!(*weak, 42);
}

#[test]
fn test_factory_drop_invalidates() {
    let data = 1_i32;
    let weak;
    {
        let factory = factory_for(&data);
        weak = factory.get_weak_ptr();
        assert_eq!(weak.get(), Some(&1));
    }

    assert!(weak.get().is_none());
    assert!(!weak.is_valid());
    assert!(weak.was_invalidated());
}

#[test]
fn test_clone_shares_validity() {
    let data = String::from("shared");
    let factory = factory_for(&data);
    let weak = factory.get_weak_ptr();
    let copy = weak.clone();

    assert_eq!(copy.get().map(String::as_str), Some("shared"));
    assert!(WeakPtr::ptr_eq(&weak, &copy));

    factory.invalidate_weak_ptrs();
    assert!(weak.get().is_none());
    assert!(copy.get().is_none());
    assert!(copy.was_invalidated());
}

// ============================================================================
// Invalidation and generations
// ============================================================================

#[test]
fn test_invalidate_then_reuse() {
    let data = 5_u64;
    let factory = factory_for(&data);
    let old = factory.get_weak_ptr();

    factory.invalidate_weak_ptrs();
    let new = factory.get_weak_ptr();

    assert!(old.get().is_none());
    assert!(old.was_invalidated());
    assert_eq!(new.get(), Some(&5));
    assert!(!new.was_invalidated());

    // The old generation stays dead for good.
    factory.invalidate_weak_ptrs();
    let newer = factory.get_weak_ptr();
    assert!(old.get().is_none());
    assert!(new.get().is_none());
    assert_eq!(newer.get(), Some(&5));
    assert_eq!(factory.generation(), 2);
}

#[test]
fn test_invalidate_without_weak_ptrs() {
    let data = 0_u8;
    let factory = factory_for(&data);
    factory.invalidate_weak_ptrs();
    factory.invalidate_weak_ptrs();
    assert_eq!(factory.get_weak_ptr().get(), Some(&0));
}

// ============================================================================
// Null, reset and move
// ============================================================================

#[test]
fn test_null_is_not_invalidated() {
    let weak: WeakPtr<i32> = WeakPtr::null();
    assert!(weak.get().is_none());
    assert!(!weak.is_valid());
    assert!(!weak.was_invalidated());
    assert!(!weak.maybe_valid());

    let default: WeakPtr<i32> = WeakPtr::default();
    assert!(!default.was_invalidated());
}

#[test]
fn test_reset_clears_without_invalidating() {
    let data = 9_i32;
    let factory = factory_for(&data);
    let mut weak = factory.get_weak_ptr();

    weak.reset();
    assert!(weak.get().is_none());
    assert!(!weak.was_invalidated());
    assert!(!factory.has_weak_ptrs());
}

#[test]
fn test_take_clears_source() {
    let data = 3_i32;
    let factory = factory_for(&data);
    let mut weak = factory.get_weak_ptr();

    let moved = std::mem::take(&mut weak);
    assert!(weak.get().is_none());
    assert!(!weak.was_invalidated());
    assert_eq!(moved.get(), Some(&3));

    factory.invalidate_weak_ptrs();
    assert!(moved.was_invalidated());
    assert!(!weak.was_invalidated());
}

#[test]
fn test_reassign_from_other_generation() {
    let data = 11_i32;
    let factory = factory_for(&data);
    let mut weak = factory.get_weak_ptr();
    factory.invalidate_weak_ptrs();
    assert!(weak.was_invalidated());

    weak = factory.get_weak_ptr();
    assert_eq!(weak.get(), Some(&11));
}

// ============================================================================
// Deref
// ============================================================================

#[test]
#[should_panic(expected = "dereferenced a null or invalidated WeakPtr")]
fn test_deref_null_panics() {
    let weak: WeakPtr<i32> = WeakPtr::null();
    let _ = *weak;
}

#[test]
#[should_panic(expected = "dereferenced a null or invalidated WeakPtr")]
fn test_deref_invalidated_panics() {
    let data = 1_i32;
    let factory = factory_for(&data);
    let weak = factory.get_weak_ptr();
    factory.invalidate_weak_ptrs();
    let _ = *weak;
}

// ============================================================================
// Conversions
// ============================================================================

#[repr(C)]
struct Header {
    tag: u32,
}

#[repr(C)]
struct Body {
    len: u64,
}

/// `body` sits at a non-zero offset.
#[repr(C)]
struct Message {
    header: Header,
    padding: [u8; 24],
    body: Body,
}

#[test]
fn test_project_offsets_pointer() {
    let message = Message {
        header: Header { tag: 7 },
        padding: [0; 24],
        body: Body { len: 128 },
    };
    let factory = factory_for(&message);

    let body: WeakPtr<Body> = factory.get_weak_ptr().project(|m| &m.body);
    assert!(std::ptr::eq(body.get().unwrap(), &message.body));
    assert_ne!(
        std::ptr::from_ref(&message.body).cast::<u8>(),
        std::ptr::from_ref(&message).cast::<u8>()
    );
    assert_eq!(body.len, 128);

    let header: WeakPtr<Header> = factory.get_weak_ptr().project(|m| &m.header);
    assert_eq!(header.get().map(|h| h.tag), Some(7));
    assert_eq!(message.padding.len(), 24);

    // Projections share the generation of the handle they came from.
    factory.invalidate_weak_ptrs();
    assert!(body.get().is_none());
    assert!(body.was_invalidated());
    assert!(header.was_invalidated());
}

#[test]
fn test_project_invalidated_is_null() {
    let message = Message {
        header: Header { tag: 1 },
        padding: [0; 24],
        body: Body { len: 0 },
    };
    let factory = factory_for(&message);
    let weak = factory.get_weak_ptr();
    factory.invalidate_weak_ptrs();

    let body = weak.project(|m| &m.body);
    assert!(body.get().is_none());
    assert!(!body.was_invalidated());
}

trait Shape {
    fn area(&self) -> u32;
}

struct Square {
    side: u32,
}

impl Shape for Square {
    fn area(&self) -> u32 {
        self.side * self.side
    }
}

#[test]
fn test_upcast_to_trait_object() {
    let square = Square { side: 4 };
    let factory = factory_for(&square);

    let concrete = factory.get_weak_ptr();
    let shape: WeakPtr<dyn Shape> = weak_upcast!(concrete.clone() => dyn Shape);
    assert_eq!(shape.get().map(Shape::area), Some(16));
    assert!(std::ptr::addr_eq(
        std::ptr::from_ref(shape.get().unwrap()),
        std::ptr::from_ref(concrete.get().unwrap())
    ));

    factory.invalidate_weak_ptrs();
    assert!(shape.was_invalidated());
}

#[test]
fn test_upcast_null_stays_null() {
    let weak: WeakPtr<Square> = WeakPtr::null();
    let shape: WeakPtr<dyn Shape> = weak_upcast!(weak => dyn Shape);
    assert!(shape.get().is_none());
    assert!(!shape.was_invalidated());
}

#[test]
fn test_unsized_target() {
    let words: Vec<&str> = vec!["a", "b", "c"];
    let factory: WeakPtrFactory<[&str]> = factory_for(words.as_slice());
    let weak = factory.get_weak_ptr();
    assert_eq!(weak.get().map(<[&str]>::len), Some(3));
    drop(factory);
    assert!(weak.get().is_none());
}

// ============================================================================
// Mutable flavour
// ============================================================================

#[test]
fn test_mutable_weak_ptr_converts_to_shared() {
    let mut data = Box::new(vec![1, 2]);
    // SAFETY: `data` outlives `factory` and is only reached through it.
    let factory = unsafe { WeakPtrFactory::new(NonNull::from(&mut *data)) };

    let mut weak_mut = factory.get_mutable_weak_ptr();
    // SAFETY: no other reference to the vector is alive.
    unsafe { weak_mut.get_mut() }.unwrap().push(3);

    let shared: WeakPtr<Vec<i32>> = weak_mut.into();
    assert_eq!(shared.get().map(Vec::len), Some(3));

    factory.invalidate_weak_ptrs();
    assert!(shared.was_invalidated());
    drop(factory);
    assert_eq!(*data, vec![1, 2, 3]);
}

#[test]
fn test_mutable_weak_ptr_after_invalidation() {
    let mut data = Box::new(0_u32);
    // SAFETY: `data` outlives `factory` and is only reached through it.
    let factory = unsafe { WeakPtrFactory::new(NonNull::from(&mut *data)) };
    let mut weak_mut = factory.get_mutable_weak_ptr();
    factory.invalidate_weak_ptrs();

    // SAFETY: no other reference to the target is alive.
    assert!(unsafe { weak_mut.get_mut() }.is_none());
    assert!(weak_mut.was_invalidated());
    weak_mut.reset();
    assert!(!weak_mut.was_invalidated());
}

#[test]
fn test_debug_does_not_bind() {
    let data = 2_i32;
    let factory = factory_for(&data);
    let weak = factory.get_weak_ptr();

    // Debug only uses the loose check, so it is fine on any thread.
    let rendered = std::thread::scope(|s| s.spawn(|| format!("{weak:?}")).join().unwrap());
    assert!(rendered.contains("maybe_valid: true"));
    assert_eq!(weak.get(), Some(&2));
}
