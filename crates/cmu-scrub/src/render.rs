//! Trace rendering with message redaction.
//!
//! Frames are always rendered as captured; only the final message line of a
//! node is subject to the policy, and it is either shown verbatim or
//! replaced whole by the scrub marker.

use crate::chain::ExceptionNode;
use crate::exception::Frame;
use crate::policy::ScrubPolicy;
use crate::Result;

/// Source text of the frame a harness records for its own re-raise.
/// Frames carrying it are never rendered.
pub const HARNESS_MARKER: &str = "return protected_call(); // cmu_scrub::harness";

pub const TRACEBACK_HEADER: &str = "Traceback (most recent call last):";

pub const CAUSE_BRIDGE: &str =
    "\nThe above exception was the direct cause of the following exception:\n";

pub const CONTEXT_BRIDGE: &str =
    "\nDuring handling of the above exception, another exception occurred:\n";

/// Render `node` and its linked nodes, outermost first.
///
/// Each returned block may hold several physical lines.
pub fn render(node: &ExceptionNode, policy: &ScrubPolicy) -> Result<Vec<String>> {
    let mut blocks = Vec::new();
    render_into(node, policy, &mut blocks)?;
    Ok(blocks)
}

fn render_into(node: &ExceptionNode, policy: &ScrubPolicy, blocks: &mut Vec<String>) -> Result<()> {
    blocks.push(TRACEBACK_HEADER.to_string());
    blocks.extend(
        node.frames
            .iter()
            .filter(|frame| frame.source_text != HARNESS_MARKER)
            .map(render_frame),
    );
    blocks.push(final_line(node, policy)?);

    if let Some(cause) = node.explicit_cause.as_deref() {
        blocks.push(CAUSE_BRIDGE.to_string());
        render_into(cause, policy, blocks)?;
    }
    if let Some(context) = node.implicit_context.as_deref() {
        blocks.push(CONTEXT_BRIDGE.to_string());
        render_into(context, policy, blocks)?;
    }
    Ok(())
}

fn render_frame(frame: &Frame) -> String {
    let location = format!(
        "  File \"{}\", line {}, in {}",
        frame.file, frame.line, frame.function
    );
    if frame.source_text.is_empty() {
        location
    } else {
        format!("{location}\n    {}", frame.source_text)
    }
}

/// Message shown for `node` under `policy`.
pub fn content(node: &ExceptionNode, policy: &ScrubPolicy) -> Result<String> {
    if policy.keep_message || node.allowed(&policy.allow_list)? {
        Ok(node.message.clone())
    } else {
        Ok(policy.scrub_marker.clone())
    }
}

fn final_line(node: &ExceptionNode, policy: &ScrubPolicy) -> Result<String> {
    let content = content(node, policy)?;
    if content.is_empty() {
        Ok(node.type_name.clone())
    } else {
        Ok(format!("{}: {}", node.type_name, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::walk;
    use crate::exception::{
        Exception, ARITHMETIC_ERROR, KEY_ERROR, MODULE_NOT_FOUND_ERROR, VALUE_ERROR,
    };
    use crate::ScrubError;

    fn policy() -> ScrubPolicy {
        ScrubPolicy::new().with_disabled(false)
    }

    fn frame(line: u32) -> Frame {
        Frame::new("src/job.rs", line, "run").with_source("let rows = load(path)?;")
    }

    #[test]
    fn test_single_node_scrubbed() {
        let err = Exception::bare(&VALUE_ERROR)
            .arg("original secret")
            .with_frame(frame(10));
        let blocks = render(&walk(Some(&err)), &policy()).unwrap();
        assert_eq!(
            blocks,
            [
                "Traceback (most recent call last):",
                "  File \"src/job.rs\", line 10, in run\n    let rows = load(path)?;",
                "ValueError: **Exception message scrubbed**",
            ]
        );
    }

    #[test]
    fn test_source_text_whitespace_kept() {
        let err = Exception::bare(&VALUE_ERROR)
            .with_frame(Frame::new("job.py", 3, "main").with_source("    x = 1  "));
        let blocks = render(&walk(Some(&err)), &policy()).unwrap();
        assert_eq!(blocks[1], "  File \"job.py\", line 3, in main\n        x = 1  ");
    }

    #[test]
    fn test_keep_message_shows_verbatim() {
        let err = Exception::bare(&VALUE_ERROR).arg("original secret");
        let blocks = render(&walk(Some(&err)), &policy().with_keep_message(true)).unwrap();
        assert_eq!(blocks.last().unwrap(), "ValueError: original secret");
    }

    #[test]
    fn test_empty_message_disclosed_as_type_only() {
        let err = Exception::bare(&KEY_ERROR);
        let blocks = render(&walk(Some(&err)), &policy().allow("KeyError")).unwrap();
        assert_eq!(blocks.last().unwrap(), "KeyError");
    }

    #[test]
    fn test_empty_message_scrubbed_still_gets_marker() {
        let err = Exception::bare(&ARITHMETIC_ERROR);
        let blocks = render(&walk(Some(&err)), &policy()).unwrap();
        assert_eq!(
            blocks.last().unwrap(),
            "ArithmeticError: **Exception message scrubbed**"
        );
    }

    #[test]
    fn test_harness_frame_dropped() {
        let err = Exception::bare(&VALUE_ERROR)
            .with_frame(frame(3))
            .with_frame(Frame::new("harness.rs", 1, "call").with_source(HARNESS_MARKER));
        let blocks = render(&walk(Some(&err)), &policy()).unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| !b.contains("harness.rs")));
    }

    #[test]
    fn test_frame_without_source_is_one_line() {
        let err = Exception::bare(&VALUE_ERROR).with_frame(Frame::new("a.rs", 2, "f"));
        let blocks = render(&walk(Some(&err)), &policy()).unwrap();
        assert_eq!(blocks[1], "  File \"a.rs\", line 2, in f");
    }

    #[test]
    fn test_context_bridge_and_per_node_redaction() {
        let inner = Exception::bare(&MODULE_NOT_FOUND_ERROR).arg("No module named 'x'");
        let err = Exception::bare(&ARITHMETIC_ERROR).during(inner);
        let blocks = render(&walk(Some(&err)), &policy().allow("ModuleNotFound")).unwrap();
        assert_eq!(
            blocks,
            [
                TRACEBACK_HEADER,
                "ArithmeticError: **Exception message scrubbed**",
                CONTEXT_BRIDGE,
                TRACEBACK_HEADER,
                "ModuleNotFoundError: No module named 'x'",
            ]
        );
    }

    #[test]
    fn test_cause_bridge() {
        let err = Exception::bare(&VALUE_ERROR)
            .arg("outer")
            .caused_by(Exception::bare(&KEY_ERROR).arg("inner"));
        let blocks = render(&walk(Some(&err)), &policy()).unwrap();
        assert_eq!(blocks[2], CAUSE_BRIDGE);
        assert!(!blocks.iter().any(|b| b.contains("outer") || b.contains("inner")));
    }

    #[test]
    fn test_bad_pattern_is_error() {
        let err = Exception::bare(&VALUE_ERROR);
        let result = render(&walk(Some(&err)), &policy().allow("*"));
        assert!(matches!(result, Err(ScrubError::Pattern { .. })));
    }

    #[test]
    fn test_keep_message_skips_pattern_evaluation() {
        let err = Exception::bare(&VALUE_ERROR).arg("m");
        let blocks = render(
            &walk(Some(&err)),
            &policy().allow("*").with_keep_message(true),
        )
        .unwrap();
        assert_eq!(blocks.last().unwrap(), "ValueError: m");
    }
}
