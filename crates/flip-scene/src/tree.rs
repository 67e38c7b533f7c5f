//! The element tree seam.
//!
//! The flip engine never owns elements. It reads them through the primitive
//! queries of [`ElementTree`] (structure, layout box, computed style) and
//! mutates them only through inline styles and classes. [`SceneGraph`] is the
//! in-memory implementation; a host toolkit implements the trait over its own
//! node type.
//!
//! Rendered geometry (global matrix, bounding box) is derived from the
//! primitives in [`crate::convert`], so every implementation measures the
//! same way.
//!
//! [`SceneGraph`]: crate::scene::SceneGraph

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geometry::Rect;
use crate::matrix::TransformParts;
use crate::property::{PropValue, Property};
use crate::selector::Selector;

/// Stable handle to a node in an element tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u32);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Layout-affecting display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Display {
    #[default]
    Block,
    Inline,
    InlineBlock,
    Flex,
    Grid,
    /// Removed from layout; cannot be measured.
    None,
}

/// Positioning scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
}

impl Position {
    /// Taken out of flow (offsets are explicit).
    pub fn is_out_of_flow(&self) -> bool {
        matches!(self, Self::Absolute | Self::Fixed)
    }
}

/// Resolved style of an element: inline values layered over its base style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedStyle {
    pub display: Display,
    pub position: Position,
    pub opacity: f64,
    pub transform: TransformParts,
    pub z_index: Option<i32>,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            position: Position::Static,
            opacity: 1.0,
            transform: TransformParts::IDENTITY,
            z_index: None,
        }
    }
}

/// Inline style overrides, the only style surface the flip engine writes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InlineStyle {
    pub display: Option<Display>,
    pub position: Option<Position>,
    pub left: Option<f64>,
    pub top: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub transform: Option<TransformParts>,
    pub opacity: Option<f64>,
    pub z_index: Option<i32>,
    /// Other properties by CSS name.
    pub extra: BTreeMap<String, String>,
}

/// Primitive queries and mutations over a tree of visual elements.
pub trait ElementTree {
    /// Whether the element is attached to the tree.
    fn contains(&self, el: ElementId) -> bool;

    fn parent(&self, el: ElementId) -> Option<ElementId>;

    /// Children in document order.
    fn children(&self, el: ElementId) -> Vec<ElementId>;

    /// All attached elements matching `selector`, in document order.
    fn query(&self, selector: &Selector) -> Vec<ElementId>;

    /// Pre-assigned flip identifier (`data-flip-id`, falling back to the element id).
    fn flip_id(&self, el: ElementId) -> Option<String>;

    /// Untransformed layout box, relative to the parent's layout origin.
    fn layout_box(&self, el: ElementId) -> Rect;

    fn computed_style(&self, el: ElementId) -> ComputedStyle;

    /// Computed value of an arbitrary style property, as CSS text.
    fn style_value(&self, el: ElementId, name: &str) -> Option<String>;

    fn inline_style(&self, el: ElementId) -> InlineStyle;

    fn set_inline_style(&mut self, el: ElementId, style: InlineStyle);

    fn has_class(&self, el: ElementId, class: &str) -> bool;

    fn add_class(&mut self, el: ElementId, class: &str);

    fn remove_class(&mut self, el: ElementId, class: &str);
}

/// Derived reads and writes shared by every [`ElementTree`].
pub trait ElementTreeExt: ElementTree {
    /// Attached, and neither the element nor an ancestor is `display: none`.
    fn is_rendered(&self, el: ElementId) -> bool {
        if !self.contains(el) {
            return false;
        }
        let mut cursor = Some(el);
        while let Some(node) = cursor {
            if self.computed_style(node).display == Display::None {
                return false;
            }
            cursor = self.parent(node);
        }
        true
    }

    /// Ancestors from the parent up to the root.
    fn ancestors(&self, el: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut cursor = self.parent(el);
        while let Some(node) = cursor {
            out.push(node);
            cursor = self.parent(node);
        }
        out
    }

    fn depth(&self, el: ElementId) -> usize {
        self.ancestors(el).len()
    }

    /// Live value of a property, read the same way `ElementState` records it.
    fn live_property(&self, el: ElementId, prop: &Property) -> Option<PropValue> {
        if !self.contains(el) {
            return None;
        }
        let style = self.computed_style(el);
        let layout = self.layout_box(el);
        let t = style.transform;
        let value = match prop {
            Property::X => t.x,
            Property::Y => t.y,
            Property::Rotation => t.rotation,
            Property::SkewX => t.skew_x,
            Property::ScaleX => t.scale_x,
            Property::ScaleY => t.scale_y,
            Property::Width => layout.width,
            Property::Height => layout.height,
            Property::Left => layout.x,
            Property::Top => layout.y,
            Property::Opacity => style.opacity,
            Property::Style(name) => return self.style_value(el, name).map(|v| PropValue::parse(&v)),
        };
        Some(PropValue::Number(value))
    }

    /// Write one property into the element's inline style.
    fn set_property(&mut self, el: ElementId, prop: &Property, value: &PropValue) {
        let mut inline = self.inline_style(el);
        if let Property::Style(name) = prop {
            inline.extra.insert(name.clone(), value.to_css());
            self.set_inline_style(el, inline);
            return;
        }
        let Some(v) = value.as_f64() else {
            warn!(%el, property = %prop, ?value, "non-numeric value for numeric property");
            return;
        };
        if prop.is_transform() {
            let mut parts = inline
                .transform
                .unwrap_or_else(|| self.computed_style(el).transform);
            match prop {
                Property::X => parts.x = v,
                Property::Y => parts.y = v,
                Property::Rotation => parts.rotation = v,
                Property::SkewX => parts.skew_x = v,
                Property::ScaleX => parts.scale_x = v,
                Property::ScaleY => parts.scale_y = v,
                _ => {}
            }
            inline.transform = Some(parts);
        } else {
            match prop {
                Property::Width => inline.width = Some(v.max(0.0)),
                Property::Height => inline.height = Some(v.max(0.0)),
                Property::Left => inline.left = Some(v),
                Property::Top => inline.top = Some(v),
                Property::Opacity => inline.opacity = Some(v.clamp(0.0, 1.0)),
                _ => {}
            }
        }
        self.set_inline_style(el, inline);
    }

    fn set_transform(&mut self, el: ElementId, parts: TransformParts) {
        let mut inline = self.inline_style(el);
        inline.transform = Some(parts);
        self.set_inline_style(el, inline);
    }
}

impl<T: ElementTree + ?Sized> ElementTreeExt for T {}

/// What to capture: a single element, a selector, nothing, or a list of those.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Targets {
    #[default]
    None,
    Element(ElementId),
    Selector(String),
    Many(Vec<Targets>),
}

impl Targets {
    /// Resolve to attached elements, deduplicated, first occurrence wins.
    ///
    /// Invalid selectors and detached elements resolve to nothing.
    pub fn resolve<T: ElementTree + ?Sized>(&self, tree: &T) -> Vec<ElementId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect(tree, &mut seen, &mut out);
        out
    }

    fn collect<T: ElementTree + ?Sized>(
        &self,
        tree: &T,
        seen: &mut HashSet<ElementId>,
        out: &mut Vec<ElementId>,
    ) {
        match self {
            Self::None => {}
            Self::Element(el) => {
                if tree.contains(*el) && seen.insert(*el) {
                    out.push(*el);
                }
            }
            Self::Selector(text) => match Selector::parse_list(text) {
                Ok(selectors) => {
                    for selector in &selectors {
                        for el in tree.query(selector) {
                            if seen.insert(el) {
                                out.push(el);
                            }
                        }
                    }
                }
                Err(error) => warn!(%error, "selector resolves to no targets"),
            },
            Self::Many(list) => {
                for t in list {
                    t.collect(tree, seen, out);
                }
            }
        }
    }
}

impl From<ElementId> for Targets {
    fn from(el: ElementId) -> Self {
        Self::Element(el)
    }
}

impl From<Option<ElementId>> for Targets {
    fn from(el: Option<ElementId>) -> Self {
        el.map_or(Self::None, Self::Element)
    }
}

impl From<&str> for Targets {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl From<&[ElementId]> for Targets {
    fn from(list: &[ElementId]) -> Self {
        Self::Many(list.iter().copied().map(Self::Element).collect())
    }
}

impl From<Vec<ElementId>> for Targets {
    fn from(list: Vec<ElementId>) -> Self {
        Self::from(list.as_slice())
    }
}
