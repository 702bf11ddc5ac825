//! Type-preserving re-raise.

use crate::chain::ExceptionNode;
use crate::exception::{Exception, Frame, Payload, EXCEPTION};
use crate::policy::ScrubPolicy;
use crate::render::HARNESS_MARKER;
use crate::Result;

/// Rewrite applied to the string arguments of a re-raised exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgTransform {
    /// `"{prefix} {arg}"`
    Verbatim,
    /// `"{prefix} {scrub_marker}"`
    Scrub,
}

impl ArgTransform {
    /// Pick the transform for a chain whose outermost node is `root`.
    pub fn for_root(root: &ExceptionNode, policy: &ScrubPolicy) -> Result<Self> {
        if policy.keep_message || root.allowed(&policy.allow_list)? {
            Ok(ArgTransform::Verbatim)
        } else {
            Ok(ArgTransform::Scrub)
        }
    }

    pub fn apply(&self, payload: &Payload, policy: &ScrubPolicy) -> Payload {
        match (self, payload) {
            (ArgTransform::Verbatim, Payload::Str(s)) => {
                Payload::Str(format!("{} {}", policy.prefix, s))
            }
            (ArgTransform::Scrub, Payload::Str(_)) => {
                Payload::Str(format!("{} {}", policy.prefix, policy.scrub_marker))
            }
            (_, opaque) => opaque.clone(),
        }
    }
}

/// Frame recorded on every re-raised exception.
pub fn harness_frame() -> Frame {
    Frame::new(file!(), line!(), "scrub_and_raise").with_source(HARNESS_MARKER)
}

/// Build the exception to propagate in place of `original`.
///
/// The result has the same [`ExceptionType`](crate::ExceptionType) as
/// `original`, transformed string arguments, and `original` as its explicit
/// cause. Without an original, a bare generic exception is produced.
pub fn rethrow(
    original: Option<Exception>,
    root: &ExceptionNode,
    policy: &ScrubPolicy,
) -> Result<Exception> {
    let Some(original) = original else {
        return Ok(Exception::bare(&EXCEPTION).with_frame(harness_frame()));
    };

    let transform = ArgTransform::for_root(root, policy)?;
    let args = original
        .args()
        .iter()
        .map(|payload| transform.apply(payload, policy))
        .collect();

    Ok(Exception::bare(original.kind())
        .with_args(args)
        .with_frame(harness_frame())
        .caused_by(original))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::walk;
    use crate::exception::{ASSERTION_ERROR, VALUE_ERROR};

    fn policy() -> ScrubPolicy {
        ScrubPolicy::new().with_disabled(false)
    }

    fn raise_again(err: Exception, policy: &ScrubPolicy) -> Exception {
        let root = walk(Some(&err));
        rethrow(Some(err), &root, policy).unwrap()
    }

    #[test]
    fn test_scrubs_string_args() {
        let err = Exception::with_message(&VALUE_ERROR, "original secret");
        let raised = raise_again(err, &policy());
        assert!(raised.is(&VALUE_ERROR));
        assert_eq!(raised.message(), "SystemLog: **Exception message scrubbed**");
        assert_eq!(raised.cause().unwrap().message(), "original secret");
    }

    #[test]
    fn test_keep_message_prefixes() {
        let err = Exception::with_message(&VALUE_ERROR, "detail");
        let raised = raise_again(err, &policy().with_keep_message(true));
        assert_eq!(raised.message(), "SystemLog: detail");
    }

    #[test]
    fn test_allowed_root_prefixes() {
        let err = Exception::with_message(&VALUE_ERROR, "detail");
        let raised = raise_again(err, &policy().allow("ValueError"));
        assert_eq!(raised.message(), "SystemLog: detail");
    }

    #[test]
    fn test_opaque_args_pass_through() {
        let err = Exception::new(&VALUE_ERROR).arg("s").opaque_arg(17u32);
        let original_opaque = err.args()[1].clone();
        let raised = raise_again(err, &policy());
        assert_eq!(raised.args().len(), 2);
        assert_eq!(raised.args()[1], original_opaque);
        assert_eq!(
            raised.args()[0].as_str(),
            Some("SystemLog: **Exception message scrubbed**")
        );
    }

    #[test]
    fn test_zero_args_stay_zero() {
        let raised = raise_again(Exception::new(&ASSERTION_ERROR), &policy());
        assert!(raised.is(&ASSERTION_ERROR));
        assert!(raised.args().is_empty());
    }

    #[test]
    fn test_no_original_gives_generic() {
        let raised = rethrow(None, &walk(None), &policy()).unwrap();
        assert!(raised.is(&EXCEPTION));
        assert!(raised.args().is_empty());
        assert!(raised.cause().is_none());
    }

    #[test]
    fn test_rethrown_frame_is_marked() {
        let raised = raise_again(Exception::new(&VALUE_ERROR), &policy());
        assert_eq!(raised.frames().len(), 1);
        assert_eq!(raised.frames()[0].source_text, HARNESS_MARKER);
    }
}
