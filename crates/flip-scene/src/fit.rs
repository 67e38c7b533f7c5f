//! Fit engine: the transform that makes one element occupy another box.
//!
//! The target box is known by its global matrix (element box -> root). The
//! element's own local matrix must satisfy
//!
//! ```text
//! global(parent) · local = target global · S(size ratio)
//! ```
//!
//! so `local = parent⁻¹ · target global · S`, which is then decomposed about
//! the element centre into the parts the timeline tweens. Composing through
//! the full parent chain is what keeps nested scaled or rotated containers
//! from distorting the result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::convert;
use crate::element_state::ElementState;
use crate::matrix::{Matrix2D, TransformParts, ZERO_EPSILON, normalize_angle, shortest_angle};
use crate::property::{PropValue, Property};
use crate::tree::{ElementId, ElementTree, ElementTreeExt};

/// Absolute values an element must take to fit a target box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitValues {
    pub x: f64,
    pub y: f64,
    /// Degrees.
    pub rotation: f64,
    /// Degrees.
    pub skew_x: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Explicit size when fitting without scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl FitValues {
    /// The values an element already has, optionally with its size.
    pub fn natural(state: &ElementState, with_size: bool) -> Self {
        Self::from_parts(
            state.parts(),
            with_size.then_some(state.width),
            with_size.then_some(state.height),
        )
    }

    fn from_parts(parts: TransformParts, width: Option<f64>, height: Option<f64>) -> Self {
        Self {
            x: parts.x,
            y: parts.y,
            rotation: parts.rotation,
            skew_x: parts.skew_x,
            scale_x: parts.scale_x,
            scale_y: parts.scale_y,
            width,
            height,
        }
    }

    pub fn parts(&self) -> TransformParts {
        TransformParts {
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            skew_x: self.skew_x,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        }
    }

    /// Tweenable property map. Size is only present when set.
    pub fn to_props(&self) -> BTreeMap<Property, PropValue> {
        let mut props = BTreeMap::from([
            (Property::X, PropValue::Number(self.x)),
            (Property::Y, PropValue::Number(self.y)),
            (Property::Rotation, PropValue::Number(self.rotation)),
            (Property::SkewX, PropValue::Number(self.skew_x)),
            (Property::ScaleX, PropValue::Number(self.scale_x)),
            (Property::ScaleY, PropValue::Number(self.scale_y)),
        ]);
        if let Some(width) = self.width {
            props.insert(Property::Width, PropValue::Number(width));
        }
        if let Some(height) = self.height {
            props.insert(Property::Height, PropValue::Number(height));
        }
        props
    }

    /// Write the values into the element's inline style.
    pub fn apply<T: ElementTree + ?Sized>(&self, tree: &mut T, el: ElementId) {
        tree.set_transform(el, self.parts());
        if let Some(width) = self.width {
            tree.set_property(el, &Property::Width, &PropValue::Number(width));
        }
        if let Some(height) = self.height {
            tree.set_property(el, &Property::Height, &PropValue::Number(height));
        }
    }

    /// Change relative to `from`: translation difference, angle difference
    /// on the short path, scale ratio.
    pub fn delta(&self, from: &TransformParts) -> TransformDelta {
        let ratio = |to: f64, from: f64| {
            if from.abs() < ZERO_EPSILON {
                if to.abs() < ZERO_EPSILON { 1.0 } else { to / ZERO_EPSILON }
            } else {
                to / from
            }
        };
        TransformDelta {
            x: self.x - from.x,
            y: self.y - from.y,
            rotation: normalize_angle(self.rotation - from.rotation),
            skew_x: normalize_angle(self.skew_x - from.skew_x),
            scale_x: ratio(self.scale_x, from.scale_x),
            scale_y: ratio(self.scale_y, from.scale_y),
        }
    }
}

/// Relative change between two sets of parts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformDelta {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub skew_x: f64,
    /// Ratio, 1 for unchanged.
    pub scale_x: f64,
    pub scale_y: f64,
}

impl TransformDelta {
    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.x.abs() < epsilon
            && self.y.abs() < epsilon
            && self.rotation.abs() < epsilon
            && self.skew_x.abs() < epsilon
            && (self.scale_x - 1.0).abs() < epsilon
            && (self.scale_y - 1.0).abs() < epsilon
    }
}

/// Values that make `current`'s element visually occupy `target`'s box.
///
/// The parent chain is read live, so parents fitted earlier in the same pass
/// are taken into account. With `scale`, the size difference goes into
/// `scale_x`/`scale_y`; otherwise the element is resized and the transform
/// is decomposed about the new centre.
pub fn fit_values<T: ElementTree + ?Sized>(
    tree: &T,
    current: &ElementState,
    target: &ElementState,
    scale: bool,
) -> FitValues {
    let el = current.element;
    let parent_inverse = tree
        .parent(el)
        .filter(|p| tree.contains(*p))
        .map(|p| convert::global_matrix(tree, p))
        .unwrap_or(Matrix2D::IDENTITY);
    if !parent_inverse.is_invertible() {
        warn!(%el, "parent transform collapsed, clamping inverse");
    }
    let parent_inverse = parent_inverse.inverse_clamped();

    let layout = tree.layout_box(el);
    let current_w = layout.width.max(ZERO_EPSILON);
    let current_h = layout.height.max(ZERO_EPSILON);

    let mut dest = target.global_matrix;
    if scale {
        dest = dest.then(&Matrix2D::scale(
            target.width / current_w,
            target.height / current_h,
        ));
    }
    let local = Matrix2D::translate(-layout.x, -layout.y)
        .then(&parent_inverse)
        .then(&dest);

    let (parts, width, height) = if scale {
        (local.decompose_about(current_w * 0.5, current_h * 0.5), None, None)
    } else {
        (
            local.decompose_about(target.width * 0.5, target.height * 0.5),
            Some(target.width),
            Some(target.height),
        )
    };

    let from = current.parts();
    FitValues {
        rotation: shortest_angle(from.rotation, parts.rotation),
        skew_x: shortest_angle(from.skew_x, parts.skew_x),
        ..FitValues::from_parts(parts, width, height)
    }
}
