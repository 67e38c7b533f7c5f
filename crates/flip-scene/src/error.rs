//! Error types for capture, fitting and coordinate conversion.

use thiserror::Error;

use crate::timeline::TimelineId;
use crate::tree::ElementId;

/// Result type for flip operations.
pub type Result<T> = std::result::Result<T, FlipError>;

/// Errors that can occur while flipping.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlipError {
    /// The two elements live in disjoint trees.
    #[error("{from} and {to} share no common ancestor")]
    NoCommonAncestor { from: ElementId, to: ElementId },

    /// A transform chain collapsed to zero scale and cannot be inverted.
    #[error("transform chain of {0} is singular")]
    SingularMatrix(ElementId),

    /// The element is not (or no longer) part of the tree.
    #[error("unknown element {0}")]
    UnknownElement(ElementId),

    /// Animation was requested before a tween engine was registered.
    #[error("no tween engine registered")]
    EngineNotRegistered,

    /// Selector outside the supported grammar.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// The timeline already completed or never existed.
    #[error("unknown timeline {0}")]
    UnknownTimeline(TimelineId),
}
