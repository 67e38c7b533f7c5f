//! Rendered geometry and coordinate conversion between elements.
//!
//! An element's local matrix maps its own box coordinates (`0..width`,
//! `0..height`) into its parent's box coordinates:
//!
//! ```text
//! local  = T(layout.x, layout.y) · transform-about-centre
//! global = global(parent) · local
//! ```
//!
//! Conversions walk both ancestor chains, so two elements in disjoint trees
//! have no meaningful mapping and fail with `NoCommonAncestor`.

use crate::error::{FlipError, Result};
use crate::geometry::{Point, Rect};
use crate::matrix::Matrix2D;
use crate::tree::{ElementId, ElementTree, ElementTreeExt};

/// Element box -> parent box.
pub fn local_matrix<T: ElementTree + ?Sized>(tree: &T, el: ElementId) -> Matrix2D {
    let layout = tree.layout_box(el);
    let style = tree.computed_style(el);
    Matrix2D::translate(layout.x, layout.y).then(
        &style
            .transform
            .about_origin(layout.width * 0.5, layout.height * 0.5),
    )
}

/// Element box -> root coordinates.
pub fn global_matrix<T: ElementTree + ?Sized>(tree: &T, el: ElementId) -> Matrix2D {
    let mut m = local_matrix(tree, el);
    let mut cursor = tree.parent(el);
    while let Some(parent) = cursor {
        m = local_matrix(tree, parent).then(&m);
        cursor = tree.parent(parent);
    }
    m
}

/// Axis-aligned bounds of the element's transformed box, in root coordinates.
pub fn bounding_rect<T: ElementTree + ?Sized>(tree: &T, el: ElementId) -> Rect {
    let layout = tree.layout_box(el);
    let m = global_matrix(tree, el);
    let corners = Rect::new(0.0, 0.0, layout.width, layout.height)
        .corners()
        .map(|p| m.apply(p));
    Rect::bounds_of(&corners)
}

fn root_of<T: ElementTree + ?Sized>(tree: &T, el: ElementId) -> ElementId {
    tree.ancestors(el).last().copied().unwrap_or(el)
}

/// Matrix mapping points in `from`'s local space into `to`'s local space.
pub fn convert_coordinates<T: ElementTree + ?Sized>(
    tree: &T,
    from: ElementId,
    to: ElementId,
) -> Result<Matrix2D> {
    for el in [from, to] {
        if !tree.contains(el) {
            return Err(FlipError::UnknownElement(el));
        }
    }
    if root_of(tree, from) != root_of(tree, to) {
        return Err(FlipError::NoCommonAncestor { from, to });
    }
    let to_inverse = global_matrix(tree, to)
        .inverse()
        .ok_or(FlipError::SingularMatrix(to))?;
    Ok(to_inverse.then(&global_matrix(tree, from)))
}

/// Map one point from `from`'s local space into `to`'s local space.
pub fn convert_point<T: ElementTree + ?Sized>(
    tree: &T,
    from: ElementId,
    to: ElementId,
    point: Point,
) -> Result<Point> {
    Ok(convert_coordinates(tree, from, to)?.apply(point))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::TransformParts;
    use crate::scene::SceneGraph;

    const EPSILON: f64 = 1e-9;

    fn nested_scene() -> (SceneGraph, ElementId, ElementId, ElementId) {
        let mut scene = SceneGraph::new();
        let root = scene.add_root(Rect::new(0.0, 0.0, 400.0, 400.0));
        let panel = scene.add_child(root, Rect::new(100.0, 50.0, 200.0, 100.0));
        scene.set_base_transform(
            panel,
            TransformParts {
                rotation: 30.0,
                scale_x: 2.0,
                scale_y: 0.5,
                ..TransformParts::IDENTITY
            },
        );
        let item = scene.add_child(panel, Rect::new(10.0, 10.0, 20.0, 20.0));
        scene.set_base_transform(item, TransformParts::translate(5.0, -3.0));
        let other = scene.add_child(root, Rect::new(300.0, 300.0, 50.0, 50.0));
        scene.set_base_transform(
            other,
            TransformParts {
                rotation: -45.0,
                skew_x: 10.0,
                ..TransformParts::IDENTITY
            },
        );
        (scene, panel, item, other)
    }

    #[test]
    fn test_bounding_rect_untransformed() {
        let mut scene = SceneGraph::new();
        let root = scene.add_root(Rect::new(10.0, 10.0, 400.0, 400.0));
        let child = scene.add_child(root, Rect::new(50.0, 50.0, 20.0, 20.0));
        assert!(
            scene
                .bounding_rect(child)
                .approx_eq(&Rect::new(60.0, 60.0, 20.0, 20.0), EPSILON)
        );
    }

    #[test]
    fn test_bounding_rect_scales_about_center() {
        let mut scene = SceneGraph::new();
        let el = scene.add_root(Rect::new(0.0, 0.0, 100.0, 50.0));
        scene.set_base_transform(
            el,
            TransformParts {
                scale_x: 2.0,
                scale_y: 2.0,
                ..TransformParts::IDENTITY
            },
        );
        assert!(
            scene
                .bounding_rect(el)
                .approx_eq(&Rect::new(-50.0, -25.0, 200.0, 100.0), EPSILON)
        );
    }

    #[test]
    fn test_convert_inverse_consistency() {
        let (scene, panel, item, other) = nested_scene();
        for (x, y) in [(item, other), (panel, item), (other, panel)] {
            let forward = convert_coordinates(&scene, x, y).unwrap();
            let back = convert_coordinates(&scene, y, x).unwrap();
            assert!(back.then(&forward).is_identity(1e-9));
        }
    }

    #[test]
    fn test_convert_point_matches_global_positions() {
        let (scene, _panel, item, other) = nested_scene();
        let p = Point::new(3.0, 4.0);
        let mapped = convert_point(&scene, item, other, p).unwrap();
        let a = global_matrix(&scene, item).apply(p);
        let b = global_matrix(&scene, other).apply(mapped);
        assert!(a.approx_eq(&b, 1e-9));
    }

    #[test]
    fn test_convert_without_common_ancestor_fails() {
        let (mut scene, _panel, item, _other) = nested_scene();
        let stray = scene.add_root(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(
            convert_coordinates(&scene, item, stray),
            Err(FlipError::NoCommonAncestor {
                from: item,
                to: stray
            })
        );
    }

    #[test]
    fn test_convert_to_collapsed_element_fails() {
        let (mut scene, panel, item, _other) = nested_scene();
        scene.set_base_transform(
            panel,
            TransformParts {
                scale_x: 0.0,
                ..TransformParts::IDENTITY
            },
        );
        assert_eq!(
            convert_coordinates(&scene, panel, item),
            Err(FlipError::SingularMatrix(item))
        );
    }
}
