//! Panics inside scrubbed code.
//!
//! An active [`Harness`] catches unwinding panics in its protected call and
//! sends them through the same pipeline as returned exceptions, as
//! [`PANIC_ERROR`](crate::PANIC_ERROR). The process panic hook still runs
//! first and, by default, prints the raw payload to stderr.
//! [`install_panic_hook`] replaces it with one that prints nothing for
//! panics an active harness will catch, and a scrubbed trace for all
//! others. Under `panic = "abort"` nothing is caught, so the hook prints
//! every panic.

use crate::exception::{Exception, Frame, UNKNOWN_FUNCTION};
use crate::harness::{Harness, HarnessError};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

thread_local! {
    /// Active harness calls on this thread.
    static CATCHING: Cell<usize> = const { Cell::new(0) };
    /// Location of the last panic a harness will catch, left by the hook.
    static PANIC_FRAME: RefCell<Option<Frame>> = const { RefCell::new(None) };
}

/// Run `protected`, turning an unwinding panic into an exception.
pub(crate) fn catch_panic<R>(protected: impl FnOnce() -> R) -> Result<R, Exception> {
    CATCHING.with(|depth| depth.set(depth.get() + 1));
    let outcome = panic::catch_unwind(AssertUnwindSafe(protected));
    CATCHING.with(|depth| depth.set(depth.get() - 1));

    outcome.map_err(|payload| {
        let exception = Exception::from_panic(payload.as_ref());
        match PANIC_FRAME.with(|slot| slot.borrow_mut().take()) {
            Some(frame) => exception.with_frame(frame),
            None => exception,
        }
    })
}

/// Replace the process panic hook with one that prints scrubbed traces
/// through `harness`.
///
/// Panics an active harness will catch are left for that harness; the
/// hook only records where they happened.
pub fn install_panic_hook(harness: Harness) {
    panic::set_hook(Box::new(move |info| {
        let frame = info
            .location()
            .map(|location| Frame::new(location.file(), location.line(), UNKNOWN_FUNCTION));

        if cfg!(panic = "unwind") && CATCHING.with(Cell::get) > 0 {
            PANIC_FRAME.with(|slot| *slot.borrow_mut() = frame);
            return;
        }

        let mut exception = Exception::from_panic(info.payload());
        if let Some(frame) = frame {
            exception = exception.with_frame(frame);
        }
        if let HarnessError::Pipeline(err) = harness.scrub_and_raise(Some(exception)) {
            warn!(target: "cmu_scrub::panic", error = %err, "could not print scrubbed panic");
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::PANIC_ERROR;

    #[test]
    fn test_catch_panic_passes_values() {
        assert_eq!(catch_panic(|| 5).unwrap(), 5);
        assert_eq!(CATCHING.with(Cell::get), 0);
    }

    #[test]
    fn test_catch_panic_builds_exception() {
        let err = catch_panic(|| -> u32 { panic!("secret {}", 42) }).unwrap_err();
        assert!(err.is(&PANIC_ERROR));
        assert_eq!(err.message(), "secret 42");
        assert_eq!(CATCHING.with(Cell::get), 0);
    }
}
