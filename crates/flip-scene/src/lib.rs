//! Layout-transition ("FLIP") engine over an abstract element tree.
//!
//! This crate provides:
//! - **Capture**: snapshots of element geometry and style ([`FlipState`], [`ElementState`])
//! - **Fit**: transforms that put one element exactly over another's box, through
//!   any nesting of transformed parents
//! - **Flip**: timelines that animate elements from a saved capture to the live
//!   layout (or back), with enter/leave handling and cleanup
//! - **Coordinates**: 2×3 affine matrices and conversion between element spaces
//!
//! # Architecture
//!
//! ```text
//! Flip (orchestrator, owns timelines + registry)
//!   ├── FlipState ── ElementState (per element capture)
//!   ├── diff::Partition (persisting / entering / leaving ids)
//!   ├── fit::fit_values (matrix composition + decomposition)
//!   └── Timeline ── Tween + Cleanup, eased by a registered TweenEngine
//!
//! ElementTree (trait) ── SceneGraph (in-memory implementation)
//! ```

pub mod absolute;
pub mod convert;
pub mod diff;
pub mod element_state;
pub mod engine;
pub mod error;
pub mod events;
pub mod fit;
pub mod flip;
pub mod flip_state;
pub mod geometry;
pub mod matrix;
pub mod property;
pub mod scene;
pub mod selector;
pub mod timeline;
pub mod tree;

pub use diff::Partition;
pub use element_state::{ElementState, LiveElement, ReadProperty, get_property};
pub use engine::{LinearEngine, TweenEngine};
pub use error::{FlipError, Result};
pub use events::{EventQueue, FlipEvent};
pub use fit::{FitValues, TransformDelta, fit_values};
pub use flip::{ElementsCallback, FitOutcome, FitTarget, FitVars, Flip, FlipVars};
pub use flip_state::{CaptureVars, FlipState, FlipStateId, StateComparison};
pub use geometry::{Point, Rect};
pub use matrix::{Matrix2D, TransformParts};
pub use property::{Interpolate, PropValue, Property};
pub use scene::SceneGraph;
pub use selector::Selector;
pub use timeline::{Cleanup, Timeline, TimelineId, TimelineState, TimelineVars, Tween};
pub use tree::{
    ComputedStyle, Display, ElementId, ElementTree, ElementTreeExt, InlineStyle, Position, Targets,
};
