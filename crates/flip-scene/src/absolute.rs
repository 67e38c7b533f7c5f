//! Switching elements to absolute positioning without moving them.

use tracing::{debug, trace};

use crate::geometry::Rect;
use crate::tree::{ElementId, ElementTree, ElementTreeExt, InlineStyle, Position};

/// Switch `elements` to `position: absolute`, pinned at their current box.
///
/// Every box is measured before any element is switched, so siblings that
/// reflow as earlier ones leave the flow keep their pre-switch positions.
/// Elements that are detached, not rendered or already out of flow are
/// skipped. Returns exactly the elements that were changed.
pub fn make_absolute<T: ElementTree + ?Sized>(tree: &mut T, elements: &[ElementId]) -> Vec<ElementId> {
    let measured: Vec<(ElementId, Rect)> = elements
        .iter()
        .copied()
        .filter(|el| {
            if !tree.is_rendered(*el) {
                trace!(%el, "not rendered, left in place");
                return false;
            }
            !tree.computed_style(*el).position.is_out_of_flow()
        })
        .map(|el| (el, tree.layout_box(el)))
        .collect();

    for (el, rect) in &measured {
        pin_absolute(tree, *el, *rect);
    }
    debug!(count = measured.len(), "made absolute");
    measured.into_iter().map(|(el, _)| el).collect()
}

/// Pin `el` absolutely at `rect` (offsets relative to its parent).
pub(crate) fn pin_absolute<T: ElementTree + ?Sized>(tree: &mut T, el: ElementId, rect: Rect) {
    let inline = tree.inline_style(el);
    tree.set_inline_style(
        el,
        InlineStyle {
            position: Some(Position::Absolute),
            left: Some(rect.x),
            top: Some(rect.y),
            width: Some(rect.width),
            height: Some(rect.height),
            ..inline
        },
    );
}
