//! Exception-chain scrubbing for confidential pipelines.
//!
//! Code that may fail with confidential payloads (file paths, record
//! contents, credentials) runs inside a [`Harness`]. When it fails, the
//! harness prints the exception chain to a shared log with every line
//! prefixed and every message replaced by a scrub marker unless the policy
//! allows it, then returns an exception of the original type whose string
//! arguments carry the same decision.
//!
//! # Key Features
//!
//! - **Type preserving**: the error reaching the caller has the original
//!   [`ExceptionType`], so handling by type keeps working.
//! - **Whole-message redaction**: a message is either shown verbatim or
//!   replaced entirely; frames (file, line, function) are always shown.
//! - **Allow-list**: case-insensitive regex search over type name and
//!   message, evaluated independently per exception in the chain.
//! - **Panics included**: an unwinding panic inside an active harness is
//!   scrubbed and raised as [`PANIC_ERROR`]; [`install_panic_hook`] keeps
//!   the process panic hook from printing raw payloads.
//! - **Plain-data configuration**: [`ScrubPolicy`] serializes, so the same
//!   harness can be rebuilt in a worker process.
//!
//! # Example
//!
//! ```
//! use cmu_scrub::{Exception, Harness, ScrubPolicy, SharedBuffer, Sink, VALUE_ERROR};
//!
//! let buffer = SharedBuffer::new();
//! let harness = Harness::new(
//!     ScrubPolicy::new()
//!         .with_disabled(false)
//!         .with_sink(Sink::Buffer(buffer.clone())),
//! );
//!
//! let err = harness
//!     .call(|| Err::<(), _>(Exception::with_message(&VALUE_ERROR, "row 17: alice@example.com")))
//!     .unwrap_err();
//!
//! assert!(err.is_instance(&VALUE_ERROR));
//! assert!(!buffer.contents().contains("alice@example.com"));
//! assert!(buffer.contents().contains("SystemLog: ValueError: **Exception message scrubbed**"));
//! ```

pub mod allow;
pub mod chain;
pub mod error;
pub mod exception;
pub mod harness;
pub mod panic;
pub mod policy;
pub mod printer;
pub mod render;
pub mod rethrow;

pub use allow::{default_patterns, is_allowed, AllowList};
pub use chain::{walk, ExceptionNode};
pub use error::{Result, ScrubError};
pub use exception::{
    Exception, ExceptionType, Frame, OpaqueValue, Payload, ResultExt, ARGUMENT_ERROR,
    ARITHMETIC_ERROR, ASSERTION_ERROR, EXCEPTION, IMPORT_ERROR, KEY_ERROR, LOOKUP_ERROR,
    MODULE_NOT_FOUND_ERROR, OS_ERROR, PANIC_ERROR, PUBLIC_ARGUMENT_ERROR, PUBLIC_RUNTIME_ERROR,
    PUBLIC_VALUE_ERROR, RUNTIME_ERROR, VALUE_ERROR, ZERO_DIVISION_ERROR,
};
pub use harness::{Harness, HarnessError, HarnessState};
pub use panic::install_panic_hook;
pub use policy::{ScrubPolicy, DEFAULT_PREFIX, DEFAULT_SCRUB_MARKER};
pub use printer::{SharedBuffer, SharedWriter, Sink};
pub use render::{render, HARNESS_MARKER};
pub use rethrow::{rethrow, ArgTransform};
