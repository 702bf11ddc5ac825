//! Exception chain capture.
//!
//! [`walk`] snapshots a thrown [`Exception`] and everything reachable through
//! its cause and context links into a tree of [`ExceptionNode`]s. Each node
//! appears once: a link to an already captured exception is dropped.

use crate::allow::AllowList;
use crate::exception::{Exception, Frame, Payload, EXCEPTION};
use crate::Result;
use once_cell::unsync::OnceCell;
use std::collections::HashSet;

/// One captured exception.
#[derive(Debug, Clone)]
pub struct ExceptionNode {
    pub type_name: String,
    pub message: String,
    pub arguments: Vec<Payload>,
    pub frames: Vec<Frame>,
    pub explicit_cause: Option<Box<ExceptionNode>>,
    pub implicit_context: Option<Box<ExceptionNode>>,
    allowed: OnceCell<bool>,
}

impl ExceptionNode {
    /// Placeholder used when there is no exception to capture.
    pub fn generic() -> Self {
        Self::leaf(EXCEPTION.name(), String::new(), Vec::new(), Vec::new())
    }

    fn leaf(
        type_name: &str,
        message: String,
        arguments: Vec<Payload>,
        frames: Vec<Frame>,
    ) -> Self {
        Self {
            type_name: type_name.to_string(),
            message,
            arguments,
            frames,
            explicit_cause: None,
            implicit_context: None,
            allowed: OnceCell::new(),
        }
    }

    /// Whether this node's own type name or message passes the allow-list.
    ///
    /// Evaluated once per node; linked nodes do not influence the result.
    pub fn allowed(&self, allow_list: &AllowList) -> Result<bool> {
        self.allowed
            .get_or_try_init(|| allow_list.is_allowed(&self.type_name, &self.message))
            .copied()
    }

    /// Number of nodes in the chain, this one included.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Nodes in render order: this node, then its cause chain, then its
    /// context chain.
    pub fn iter(&self) -> impl Iterator<Item = &ExceptionNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            if let Some(context) = node.implicit_context.as_deref() {
                stack.push(context);
            }
            if let Some(cause) = node.explicit_cause.as_deref() {
                stack.push(cause);
            }
            Some(node)
        })
    }
}

/// Capture `thrown` and its linked exceptions.
///
/// `None` yields [`ExceptionNode::generic`].
pub fn walk(thrown: Option<&Exception>) -> ExceptionNode {
    match thrown {
        Some(exception) => {
            let mut visited = HashSet::new();
            capture(exception, &mut visited)
        }
        None => ExceptionNode::generic(),
    }
}

fn capture(exception: &Exception, visited: &mut HashSet<*const Exception>) -> ExceptionNode {
    visited.insert(exception as *const Exception);

    let mut node = ExceptionNode::leaf(
        exception.type_name(),
        exception.message(),
        exception.args().to_vec(),
        exception.frames().to_vec(),
    );

    node.explicit_cause = exception
        .cause()
        .filter(|cause| !visited.contains(&(*cause as *const Exception)))
        .map(|cause| Box::new(capture(cause, visited)));

    node.implicit_context = exception
        .context()
        .filter(|context| !visited.contains(&(*context as *const Exception)))
        .map(|context| Box::new(capture(context, visited)));

    node
}
