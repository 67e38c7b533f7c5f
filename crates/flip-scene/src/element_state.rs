//! Geometry and style snapshot of one element.
//!
//! An `ElementState` is taken atomically by [`ElementState::capture`] and
//! stays untouched until [`ElementState::update`] re-measures the same
//! element in place. It records both the raw matrices (local and global) and
//! the decomposed transform so the fit engine can compose geometry while the
//! timeline interpolates scalars.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::convert;
use crate::geometry::Rect;
use crate::matrix::{Matrix2D, TransformParts};
use crate::property::{PropValue, Property};
use crate::tree::{Display, ElementId, ElementTree, ElementTreeExt, Position};

/// Tolerance for deciding that two captures differ.
pub const CHANGE_EPSILON: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementState {
    /// The live element this snapshot describes (not owned).
    pub element: ElementId,
    /// Identity used to match captures.
    pub id: String,
    /// Element box -> parent box.
    pub matrix: Matrix2D,
    /// Element box -> root coordinates.
    pub global_matrix: Matrix2D,
    /// Rendered axis-aligned box in root coordinates.
    pub bounds: Rect,
    /// Untransformed layout box relative to the parent.
    pub layout: Rect,
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Degrees.
    pub rotation: f64,
    /// Degrees.
    pub skew_x: f64,
    pub opacity: f64,
    pub width: f64,
    pub height: f64,
    pub display: Display,
    pub position: Position,
    pub z_index: Option<i32>,
    pub is_visible: bool,
    /// Parent at capture time.
    pub parent: Option<ElementId>,
    /// Captured without matrix decomposition.
    pub simple: bool,
    /// Extra style properties, keyed by CSS name.
    pub props: BTreeMap<String, PropValue>,
}

impl ElementState {
    /// Measure `el` now.
    ///
    /// `props` names extra style properties to record. With `simple`, the
    /// transform is read as a pure translation and never decomposed.
    pub fn capture<T: ElementTree + ?Sized>(
        tree: &T,
        el: ElementId,
        id: String,
        props: &[String],
        simple: bool,
    ) -> Self {
        let mut state = Self {
            element: el,
            id,
            matrix: Matrix2D::IDENTITY,
            global_matrix: Matrix2D::IDENTITY,
            bounds: Rect::ZERO,
            layout: Rect::ZERO,
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            skew_x: 0.0,
            opacity: 1.0,
            width: 0.0,
            height: 0.0,
            display: Display::None,
            position: Position::Static,
            z_index: None,
            is_visible: false,
            parent: None,
            simple,
            props: props.iter().map(|p| (p.clone(), PropValue::Number(0.0))).collect(),
        };
        state.measure(tree);
        state
    }

    /// Re-measure the same element, keeping its id and recorded property names.
    pub fn update<T: ElementTree + ?Sized>(&mut self, tree: &T) {
        self.measure(tree);
    }

    fn measure<T: ElementTree + ?Sized>(&mut self, tree: &T) {
        let el = self.element;
        if !tree.contains(el) {
            trace!(%el, id = %self.id, "element detached, recorded as invisible");
            self.is_visible = false;
            self.display = Display::None;
            self.parent = None;
            return;
        }

        let style = tree.computed_style(el);
        let layout = tree.layout_box(el);
        self.parent = tree.parent(el);
        self.display = style.display;
        self.position = style.position;
        self.z_index = style.z_index;
        self.opacity = style.opacity;
        self.layout = layout;
        self.width = layout.width;
        self.height = layout.height;
        self.is_visible = tree.is_rendered(el);

        self.matrix = convert::local_matrix(tree, el);
        self.global_matrix = convert::global_matrix(tree, el);
        self.bounds = if self.is_visible {
            convert::bounding_rect(tree, el)
        } else {
            let origin = self.global_matrix.apply(crate::geometry::Point::ZERO);
            Rect::new(origin.x, origin.y, 0.0, 0.0)
        };

        let parts = if self.simple {
            // Fast path: only the translation of the local matrix matters.
            TransformParts::translate(self.matrix.e - layout.x, self.matrix.f - layout.y)
        } else {
            Matrix2D::translate(-layout.x, -layout.y)
                .then(&self.matrix)
                .decompose_about(layout.width * 0.5, layout.height * 0.5)
        };
        self.set_parts(parts);

        let names: Vec<String> = self.props.keys().cloned().collect();
        for name in names {
            let value = tree
                .live_property(el, &Property::Style(name.clone()))
                .unwrap_or(PropValue::Text(String::new()));
            self.props.insert(name, value);
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

    fn set_parts(&mut self, parts: TransformParts) {
        self.x = parts.x;
        self.y = parts.y;
        self.rotation = parts.rotation;
        self.skew_x = parts.skew_x;
        self.scale_x = parts.scale_x;
        self.scale_y = parts.scale_y;
    }

    /// Whether two snapshots differ in geometry, opacity, visibility or recorded props.
    pub fn is_different(&self, other: &ElementState) -> bool {
        let geometry_same = self.bounds.approx_eq(&other.bounds, CHANGE_EPSILON)
            && self.global_matrix.approx_eq(&other.global_matrix, CHANGE_EPSILON)
            && (self.width - other.width).abs() < CHANGE_EPSILON
            && (self.height - other.height).abs() < CHANGE_EPSILON;
        let style_same = (self.opacity - other.opacity).abs() < CHANGE_EPSILON
            && self.is_visible == other.is_visible
            && self.display == other.display;
        let props_same = self.props.iter().all(|(name, value)| {
            other
                .props
                .get(name)
                .is_none_or(|o| value.approx_eq(o, CHANGE_EPSILON))
        });
        !(geometry_same && style_same && props_same)
    }
}

/// Uniform property reads over live elements and snapshots.
pub trait ReadProperty {
    fn read_property(&self, prop: &Property) -> Option<PropValue>;
}

impl ReadProperty for ElementState {
    fn read_property(&self, prop: &Property) -> Option<PropValue> {
        let value = match prop {
            Property::X => self.x,
            Property::Y => self.y,
            Property::Rotation => self.rotation,
            Property::SkewX => self.skew_x,
            Property::ScaleX => self.scale_x,
            Property::ScaleY => self.scale_y,
            Property::Width => self.width,
            Property::Height => self.height,
            Property::Left => self.layout.x,
            Property::Top => self.layout.y,
            Property::Opacity => self.opacity,
            Property::Style(name) => return self.props.get(name).cloned(),
        };
        Some(PropValue::Number(value))
    }
}

/// A live element viewed through [`ReadProperty`].
pub struct LiveElement<'a, T: ElementTree + ?Sized> {
    pub tree: &'a T,
    pub element: ElementId,
}

impl<'a, T: ElementTree + ?Sized> LiveElement<'a, T> {
    pub fn new(tree: &'a T, element: ElementId) -> Self {
        Self { tree, element }
    }
}

impl<T: ElementTree + ?Sized> ReadProperty for LiveElement<'_, T> {
    fn read_property(&self, prop: &Property) -> Option<PropValue> {
        self.tree.live_property(self.element, prop)
    }
}

/// Resolve `prop` on either a snapshot or a live element.
pub fn get_property(source: &impl ReadProperty, prop: &Property) -> Option<PropValue> {
    source.read_property(prop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneGraph;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_capture_decomposes_transform() {
        let mut scene = SceneGraph::new();
        let root = scene.add_root(Rect::new(0.0, 0.0, 500.0, 500.0));
        let el = scene.add_child(root, Rect::new(40.0, 30.0, 100.0, 50.0));
        let parts = TransformParts {
            x: 12.0,
            y: -7.0,
            rotation: 35.0,
            skew_x: 8.0,
            scale_x: 1.5,
            scale_y: 0.8,
        };
        scene.set_base_transform(el, parts).set_opacity(el, 0.5);

        let state = ElementState::capture(&scene, el, "a".into(), &[], false);
        assert!(state.parts().approx_eq(&parts, 1e-6));
        assert!(state.is_visible);
        assert_eq!(state.parent, Some(root));
        assert!(approx_eq(state.width, 100.0));
        assert!(approx_eq(state.opacity, 0.5));
        assert_eq!(state.bounds, scene.bounding_rect(el));
    }

    #[test]
    fn test_simple_capture_keeps_translation_only() {
        let mut scene = SceneGraph::new();
        let el = scene.add_root(Rect::new(0.0, 0.0, 10.0, 10.0));
        scene.set_base_transform(el, TransformParts::translate(4.0, 9.0));
        let state = ElementState::capture(&scene, el, "a".into(), &[], true);
        assert!(approx_eq(state.x, 4.0));
        assert!(approx_eq(state.y, 9.0));
        assert!(approx_eq(state.scale_x, 1.0));
        assert!(state.simple);
    }

    #[test]
    fn test_display_none_is_not_visible() {
        let mut scene = SceneGraph::new();
        let el = scene.add_root(Rect::new(5.0, 5.0, 10.0, 10.0));
        scene.set_display(el, Display::None);
        let state = ElementState::capture(&scene, el, "a".into(), &[], false);
        assert!(!state.is_visible);
        assert_eq!(state.bounds.width, 0.0);
    }

    #[test]
    fn test_update_twice_is_idempotent() {
        let mut scene = SceneGraph::new();
        let el = scene.add_root(Rect::new(0.0, 0.0, 80.0, 40.0));
        scene
            .set_base_transform(
                el,
                TransformParts {
                    rotation: 170.0,
                    scale_x: 2.0,
                    ..TransformParts::IDENTITY
                },
            )
            .set_style(el, "background-color", "#336699");
        let mut state = ElementState::capture(&scene, el, "a".into(), &["background-color".into()], false);
        state.update(&scene);
        let first = state.clone();
        state.update(&scene);
        assert_eq!(first, state);
    }

    #[test]
    fn test_get_property_uniform_over_live_and_snapshot() {
        let mut scene = SceneGraph::new();
        let el = scene.add_root(Rect::new(0.0, 0.0, 80.0, 40.0));
        scene
            .set_base_transform(el, TransformParts::translate(3.0, 4.0))
            .set_style(el, "color", "red");
        let state = ElementState::capture(&scene, el, "a".into(), &["color".into()], false);
        let live = LiveElement::new(&scene, el);
        for prop in [
            Property::X,
            Property::Y,
            Property::Width,
            Property::Opacity,
            Property::Style("color".into()),
        ] {
            let captured = get_property(&state, &prop).unwrap();
            let current = get_property(&live, &prop).unwrap();
            assert!(captured.approx_eq(&current, 1e-9), "{prop}");
        }
    }

    #[test]
    fn test_is_different() {
        let mut scene = SceneGraph::new();
        let el = scene.add_root(Rect::new(0.0, 0.0, 80.0, 40.0));
        let before = ElementState::capture(&scene, el, "a".into(), &[], false);
        assert!(!before.is_different(&before.clone()));
        scene.set_flow_box(el, Rect::new(10.0, 0.0, 80.0, 40.0));
        let after = ElementState::capture(&scene, el, "a".into(), &[], false);
        assert!(before.is_different(&after));
    }
}
