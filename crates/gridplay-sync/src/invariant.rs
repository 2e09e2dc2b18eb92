//! Fatal invariant checks.
//!
//! Some conditions can only happen if the server's own bookkeeping is
//! broken: a seat index of 2, a session bound twice, a queue that
//! overflowed. Running on with corrupted room state is worse than
//! stopping, so these never become `Result`s. They dump the state they
//! were given and panic, and the workspace profiles set `panic = "abort"`,
//! so the process goes down with them.
//!
//! ```rust,no_run
//! use gridplay_sync::invariant;
//!
//! let seat = 2u8;
//! invariant!(seat < 2, "seat index out of range", seat = seat);
//! ```

use std::backtrace::Backtrace;
use std::panic::Location;

/// Logs `message` with every key/value pair of `state`, then panics.
///
/// Prefer the [`fatal!`](crate::fatal) macro, which builds `state` from
/// `key = value` pairs.
#[cold]
#[track_caller]
pub fn violated(message: &'static str, state: &[(&'static str, String)]) -> ! {
    let location = Location::caller();
    tracing::error!(%location, "invariant violated: {message}");
    for (key, value) in state {
        tracing::error!(key, value = %value, "state at violation");
    }
    tracing::error!("backtrace:\n{}", Backtrace::force_capture());
    panic!("invariant violated: {message}");
}

/// Aborts on a broken invariant, dumping `key = value` state first.
///
/// Values only need `Debug`.
#[macro_export]
macro_rules! fatal {
    ($msg:literal $(, $key:ident = $val:expr)* $(,)?) => {
        $crate::invariant::violated(
            $msg,
            &[$((stringify!($key), format!("{:?}", $val))),*],
        )
    };
}

/// Checks a condition and calls [`fatal!`] when it does not hold.
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $msg:literal $(, $key:ident = $val:expr)* $(,)?) => {
        if !$cond {
            $crate::fatal!($msg $(, $key = $val)*);
        }
    };
}
