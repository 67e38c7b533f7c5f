//! In-memory element tree.
//!
//! `SceneGraph` is an arena of nodes implementing [`ElementTree`]. It does no
//! layout of its own: the host (or a test) assigns each node its in-flow box
//! with [`SceneGraph::set_flow_box`], the way a layout engine would after a
//! DOM change. Positioning then resolves that box against the inline style:
//!
//! - `static`: the flow box, with inline `width`/`height` overriding its size
//! - `relative`: the flow box shifted by inline `left`/`top`
//! - `absolute`/`fixed`: inline `left`/`top` replace the flow origin
//!
//! Every node is the containing block of its children, so all offsets are
//! relative to the parent's layout origin.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::convert;
use crate::geometry::Rect;
use crate::matrix::{Matrix2D, TransformParts};
use crate::selector::Selector;
use crate::tree::{ComputedStyle, Display, ElementId, ElementTree, InlineStyle, Position};

/// Style a node has before any inline override.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BaseStyle {
    pub computed: ComputedStyle,
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
struct Node {
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    attached: bool,
    dom_id: Option<String>,
    flip_id: Option<String>,
    classes: BTreeSet<String>,
    flow: Rect,
    base: BaseStyle,
    inline: InlineStyle,
}

#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    roots: Vec<ElementId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level node with the given flow box.
    pub fn add_root(&mut self, flow: Rect) -> ElementId {
        let id = self.push_node(None, flow);
        self.roots.push(id);
        id
    }

    /// Append a child node with the given flow box (relative to `parent`).
    pub fn add_child(&mut self, parent: ElementId, flow: Rect) -> ElementId {
        let id = self.push_node(Some(parent), flow);
        if let Some(node) = self.node_mut(parent) {
            node.children.push(id);
        }
        id
    }

    fn push_node(&mut self, parent: Option<ElementId>, flow: Rect) -> ElementId {
        let id = ElementId(self.nodes.len() as u32);
        let attached = parent.is_none_or(|p| self.contains(p));
        self.nodes.push(Node {
            parent,
            attached,
            flow,
            ..Node::default()
        });
        id
    }

    fn node(&self, el: ElementId) -> Option<&Node> {
        self.nodes.get(el.0 as usize)
    }

    fn node_mut(&mut self, el: ElementId) -> Option<&mut Node> {
        self.nodes.get_mut(el.0 as usize)
    }

    pub fn set_dom_id(&mut self, el: ElementId, id: &str) -> &mut Self {
        if let Some(node) = self.node_mut(el) {
            node.dom_id = Some(id.to_string());
        }
        self
    }

    pub fn set_flip_id(&mut self, el: ElementId, id: &str) -> &mut Self {
        if let Some(node) = self.node_mut(el) {
            node.flip_id = Some(id.to_string());
        }
        self
    }

    /// Assign the box layout gives this node while it is in flow.
    pub fn set_flow_box(&mut self, el: ElementId, flow: Rect) -> &mut Self {
        if let Some(node) = self.node_mut(el) {
            node.flow = flow;
        }
        self
    }

    pub fn set_display(&mut self, el: ElementId, display: Display) -> &mut Self {
        if let Some(node) = self.node_mut(el) {
            node.base.computed.display = display;
        }
        self
    }

    pub fn set_position(&mut self, el: ElementId, position: Position) -> &mut Self {
        if let Some(node) = self.node_mut(el) {
            node.base.computed.position = position;
        }
        self
    }

    pub fn set_opacity(&mut self, el: ElementId, opacity: f64) -> &mut Self {
        if let Some(node) = self.node_mut(el) {
            node.base.computed.opacity = opacity;
        }
        self
    }

    /// Base (stylesheet) transform, as opposed to the inline one the engine writes.
    pub fn set_base_transform(&mut self, el: ElementId, parts: TransformParts) -> &mut Self {
        if let Some(node) = self.node_mut(el) {
            node.base.computed.transform = parts;
        }
        self
    }

    pub fn set_z_index(&mut self, el: ElementId, z_index: Option<i32>) -> &mut Self {
        if let Some(node) = self.node_mut(el) {
            node.base.computed.z_index = z_index;
        }
        self
    }

    pub fn set_style(&mut self, el: ElementId, name: &str, value: &str) -> &mut Self {
        if let Some(node) = self.node_mut(el) {
            node.base.extra.insert(name.to_string(), value.to_string());
        }
        self
    }

    /// Move `el` (and its subtree) under `new_parent`, appended last.
    pub fn reparent(&mut self, el: ElementId, new_parent: ElementId) {
        if el == new_parent || self.is_ancestor(el, new_parent) {
            return;
        }
        self.unlink(el);
        let attached = self.contains(new_parent);
        if let Some(parent) = self.node_mut(new_parent) {
            parent.children.push(el);
        }
        if let Some(node) = self.node_mut(el) {
            node.parent = Some(new_parent);
        }
        self.set_attached(el, attached);
    }

    /// Detach `el` and its subtree from the tree. Handles stay valid.
    pub fn remove(&mut self, el: ElementId) {
        self.unlink(el);
        if let Some(node) = self.node_mut(el) {
            node.parent = None;
        }
        self.set_attached(el, false);
    }

    fn unlink(&mut self, el: ElementId) {
        let parent = self.node(el).and_then(|n| n.parent);
        match parent {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.children.retain(|c| *c != el);
                }
            }
            None => self.roots.retain(|r| *r != el),
        }
    }

    fn set_attached(&mut self, el: ElementId, attached: bool) {
        let mut stack = vec![el];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.node_mut(current) {
                node.attached = attached;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    fn is_ancestor(&self, ancestor: ElementId, el: ElementId) -> bool {
        let mut cursor = self.node(el).and_then(|n| n.parent);
        while let Some(node) = cursor {
            if node == ancestor {
                return true;
            }
            cursor = self.node(node).and_then(|n| n.parent);
        }
        false
    }

    /// Attached elements in document order.
    pub fn document_order(&self) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self.roots.iter().rev().copied().collect();
        while let Some(el) = stack.pop() {
            out.push(el);
            if let Some(node) = self.node(el) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Rendered bounding box in root coordinates.
    pub fn bounding_rect(&self, el: ElementId) -> Rect {
        convert::bounding_rect(self, el)
    }

    pub fn global_matrix(&self, el: ElementId) -> Matrix2D {
        convert::global_matrix(self, el)
    }

    fn matches(&self, node: &Node, selector: &Selector) -> bool {
        match selector {
            Selector::Any => true,
            Selector::Id(id) => node.dom_id.as_deref() == Some(id.as_str()),
            Selector::Class(class) => node.classes.contains(class),
            Selector::FlipId(id) => node.flip_id.as_deref() == Some(id.as_str()),
        }
    }
}

impl ElementTree for SceneGraph {
    fn contains(&self, el: ElementId) -> bool {
        self.node(el).is_some_and(|n| n.attached)
    }

    fn parent(&self, el: ElementId) -> Option<ElementId> {
        self.node(el).and_then(|n| n.parent)
    }

    fn children(&self, el: ElementId) -> Vec<ElementId> {
        self.node(el).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn query(&self, selector: &Selector) -> Vec<ElementId> {
        self.document_order()
            .into_iter()
            .filter(|el| self.node(*el).is_some_and(|n| self.matches(n, selector)))
            .collect()
    }

    fn flip_id(&self, el: ElementId) -> Option<String> {
        let node = self.node(el)?;
        node.flip_id.clone().or_else(|| node.dom_id.clone())
    }

    fn layout_box(&self, el: ElementId) -> Rect {
        let Some(node) = self.node(el) else {
            return Rect::ZERO;
        };
        let inline = &node.inline;
        let position = inline.position.unwrap_or(node.base.computed.position);
        let mut rect = node.flow;
        match position {
            Position::Static => {}
            Position::Relative => {
                rect.x += inline.left.unwrap_or(0.0);
                rect.y += inline.top.unwrap_or(0.0);
            }
            Position::Absolute | Position::Fixed => {
                rect.x = inline.left.unwrap_or(rect.x);
                rect.y = inline.top.unwrap_or(rect.y);
            }
        }
        rect.width = inline.width.unwrap_or(rect.width);
        rect.height = inline.height.unwrap_or(rect.height);
        rect
    }

    fn computed_style(&self, el: ElementId) -> ComputedStyle {
        let Some(node) = self.node(el) else {
            return ComputedStyle::default();
        };
        let base = &node.base.computed;
        let inline = &node.inline;
        ComputedStyle {
            display: inline.display.unwrap_or(base.display),
            position: inline.position.unwrap_or(base.position),
            opacity: inline.opacity.unwrap_or(base.opacity),
            transform: inline.transform.unwrap_or(base.transform),
            z_index: inline.z_index.or(base.z_index),
        }
    }

    fn style_value(&self, el: ElementId, name: &str) -> Option<String> {
        let node = self.node(el)?;
        node.inline
            .extra
            .get(name)
            .or_else(|| node.base.extra.get(name))
            .cloned()
    }

    fn inline_style(&self, el: ElementId) -> InlineStyle {
        self.node(el).map(|n| n.inline.clone()).unwrap_or_default()
    }

    fn set_inline_style(&mut self, el: ElementId, style: InlineStyle) {
        if let Some(node) = self.node_mut(el) {
            node.inline = style;
        }
    }

    fn has_class(&self, el: ElementId, class: &str) -> bool {
        self.node(el).is_some_and(|n| n.classes.contains(class))
    }

    fn add_class(&mut self, el: ElementId, class: &str) {
        if let Some(node) = self.node_mut(el) {
            node.classes.insert(class.to_string());
        }
    }

    fn remove_class(&mut self, el: ElementId, class: &str) {
        if let Some(node) = self.node_mut(el) {
            node.classes.remove(class);
        }
    }
}
