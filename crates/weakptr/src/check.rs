//! Invariant checks.
//!
//! Two strengths of check exist:
//!
//! - [`dcheck!`](crate::dcheck) guards thread affinity and API misuse. It is
//!   evaluated only in checked builds ([`DCHECK_IS_ON`]); in unchecked builds
//!   the condition is not evaluated at all and violating code is undefined
//!   behavior by contract.
//! - [`check_failed`] is the fatal path shared by `dcheck!` and by the
//!   always-on checks (dereferencing an invalid `WeakPtr`). It never returns.
//!
//! Neither path is recoverable. Misuse is reported by panicking at the
//! offending call site, never converted into an error value.

use std::fmt;

/// `true` in checked builds.
///
/// A build is checked when `debug_assertions` are on, or when the
/// `dcheck-always-on` feature is enabled for a release build.
pub const DCHECK_IS_ON: bool = cfg!(any(debug_assertions, feature = "dcheck-always-on"));

/// Asserts an invariant in checked builds.
///
/// The message is formatted lazily, only on failure.
///
/// ```
/// weakptr::dcheck!(1 + 1 == 2, "arithmetic is broken");
/// ```
#[macro_export]
macro_rules! dcheck {
    ($cond:expr, $($arg:tt)+) => {
        if $crate::DCHECK_IS_ON && !$cond {
            $crate::check::check_failed(::core::format_args!($($arg)+));
        }
    };
}

/// Reports a failed check and panics at the caller's location.
///
/// With the `tracing` feature the failure is also emitted as an
/// `error`-level `check_failed` event before unwinding starts.
#[cold]
#[inline(never)]
#[track_caller]
pub fn check_failed(message: fmt::Arguments<'_>) -> ! {
    crate::tracing::internal::log_check_failed(&message);
    panic!("check failed: {message}");
}
