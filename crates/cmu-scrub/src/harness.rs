//! The scrub-and-rethrow harness.
//!
//! A [`Harness`] wraps a call. While active, an [`Exception`] escaping the
//! call, or an unwinding panic, is captured, rendered with redaction,
//! printed to the policy's sink, and replaced by a rebuilt exception of the
//! same type. While disabled the call's result passes through untouched.

use crate::chain::walk;
use crate::exception::{Exception, ExceptionType};
use crate::panic::catch_panic;
use crate::policy::ScrubPolicy;
use crate::printer::print;
use crate::render::render;
use crate::rethrow::rethrow;
use crate::{Result, ScrubError};
use thiserror::Error;
use tracing::debug;

/// Error leaving a harness.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The (possibly rebuilt) user exception.
    #[error(transparent)]
    Raised(#[from] Exception),

    /// The pipeline itself failed. Never scrubbed by any harness.
    #[error(transparent)]
    Pipeline(#[from] ScrubError),
}

impl HarnessError {
    pub fn exception(&self) -> Option<&Exception> {
        match self {
            HarnessError::Raised(e) => Some(e),
            HarnessError::Pipeline(_) => None,
        }
    }

    pub fn into_exception(self) -> Option<Exception> {
        match self {
            HarnessError::Raised(e) => Some(e),
            HarnessError::Pipeline(_) => None,
        }
    }

    /// Whether this is a raised exception of type `ty` or a subtype.
    pub fn is_instance(&self, ty: &ExceptionType) -> bool {
        self.exception().is_some_and(|e| e.is_instance(ty))
    }
}

/// Harness mode, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Active,
    Disabled,
}

/// Reusable scrub-and-rethrow wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct Harness {
    policy: ScrubPolicy,
    state: HarnessState,
}

impl Harness {
    pub fn new(policy: ScrubPolicy) -> Self {
        let state = if policy.disabled {
            HarnessState::Disabled
        } else {
            HarnessState::Active
        };
        Self { policy, state }
    }

    /// Harness configured from `CMU_SCRUB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        ScrubPolicy::from_env().map(Self::new)
    }

    pub fn policy(&self) -> &ScrubPolicy {
        &self.policy
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    pub fn is_disabled(&self) -> bool {
        self.state == HarnessState::Disabled
    }

    /// Run `protected` inside the harness.
    ///
    /// Pipeline errors coming out of `protected` (for example from a nested
    /// harness) are passed through unmodified. When active, a panic in
    /// `protected` is raised as a scrubbed
    /// [`PANIC_ERROR`](crate::PANIC_ERROR) instead of unwinding further.
    pub fn call<T, E, F>(&self, protected: F) -> std::result::Result<T, HarnessError>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: Into<HarnessError>,
    {
        match self.state {
            HarnessState::Disabled => protected().map_err(Into::into),
            HarnessState::Active => match catch_panic(protected) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => match err.into() {
                    HarnessError::Raised(exception) => Err(self.scrub_and_raise(Some(exception))),
                    pipeline => Err(pipeline),
                },
                Err(panicked) => Err(self.scrub_and_raise(Some(panicked))),
            },
        }
    }

    /// Wrap a function so every call runs inside this harness.
    pub fn wrap<A, T, E, F>(&self, function: F) -> impl Fn(A) -> std::result::Result<T, HarnessError>
    where
        F: Fn(A) -> std::result::Result<T, E>,
        E: Into<HarnessError>,
    {
        let harness = self.clone();
        move |arg| harness.call(|| function(arg))
    }

    /// Print the scrubbed trace of `err` and build the exception to raise
    /// in its place. Runs regardless of the harness state.
    pub fn scrub_and_raise(&self, err: Option<Exception>) -> HarnessError {
        match self.pipeline(err) {
            Ok(exception) => HarnessError::Raised(exception),
            Err(internal) => HarnessError::Pipeline(internal),
        }
    }

    fn pipeline(&self, err: Option<Exception>) -> Result<Exception> {
        let root = walk(err.as_ref());
        let blocks = render(&root, &self.policy)?;
        print(&blocks, &self.policy)?;
        let allowed = root.allowed(&self.policy.allow_list)?;

        debug!(
            target: "cmu_scrub::harness",
            type_name = %root.type_name,
            nodes = root.len(),
            allowed,
            keep_message = self.policy.keep_message,
            "printed scrubbed stack trace"
        );

        rethrow(err, &root, &self.policy)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(ScrubPolicy::default())
    }
}
