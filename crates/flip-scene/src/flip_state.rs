//! A full capture: ordered element states with id-based lookup.
//!
//! `targets` and `element_states` are parallel and always the same length.
//! `id_lookup` maps every id to an index into them. When two captured
//! elements share an id (a card and its enlarged twin, for example), the
//! visible one is indexed in `id_lookup` and the other in `alt`.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::absolute;
use crate::diff::Partition;
use crate::element_state::{ElementState, ReadProperty};
use crate::fit::fit_values;
use crate::matrix::ZERO_EPSILON;
use crate::property::{PropValue, Property};
use crate::timeline::Cleanup;
use crate::tree::{ElementId, ElementTree, ElementTreeExt, InlineStyle, Targets};

/// Unique identifier of one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlipStateId(pub u64);

impl FlipStateId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for FlipStateId {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for [`FlipState::capture`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureVars {
    /// Comma-delimited extra style properties, e.g. `"background-color,color"`.
    pub props: Option<String>,
    /// Skip matrix decomposition (translation only).
    pub simple: bool,
}

impl CaptureVars {
    pub fn prop_names(&self) -> Vec<String> {
        self.props
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Element-level result of [`FlipState::compare`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateComparison {
    /// Present in both, geometry or style differs.
    pub changed: Vec<ElementId>,
    /// Present in both, unchanged.
    pub unchanged: Vec<ElementId>,
    /// Only in the other state.
    pub enter: Vec<ElementId>,
    /// Only in this state.
    pub leave: Vec<ElementId>,
}

/// Id used for elements without a pre-assigned one. Stable per element.
pub fn synthesize_id(el: ElementId) -> String {
    format!("auto-{}", el.0)
}

#[derive(Debug, Clone)]
pub struct FlipState {
    pub id: FlipStateId,
    pub targets: Vec<ElementId>,
    pub element_states: Vec<ElementState>,
    pub id_lookup: HashMap<String, usize>,
    pub alt: HashMap<String, usize>,
    /// Extra style properties captured beyond the geometric core.
    pub props: Vec<String>,
    pub simple: bool,
    inline_styles: HashMap<ElementId, InlineStyle>,
}

impl FlipState {
    /// Resolve `targets` and capture every element.
    ///
    /// Unresolvable or empty targets give an empty state.
    pub fn capture<T: ElementTree + ?Sized>(
        tree: &T,
        targets: &Targets,
        vars: &CaptureVars,
    ) -> Self {
        let elements = targets.resolve(tree);
        Self::capture_elements(tree, &elements, vars.prop_names(), vars.simple)
    }

    pub(crate) fn capture_elements<T: ElementTree + ?Sized>(
        tree: &T,
        elements: &[ElementId],
        props: Vec<String>,
        simple: bool,
    ) -> Self {
        let element_states = elements
            .iter()
            .map(|&el| {
                let id = tree.flip_id(el).unwrap_or_else(|| synthesize_id(el));
                ElementState::capture(tree, el, id, &props, simple)
            })
            .collect();
        let mut state = Self {
            id: FlipStateId::new(),
            targets: elements.to_vec(),
            element_states,
            id_lookup: HashMap::new(),
            alt: HashMap::new(),
            props,
            simple,
            inline_styles: HashMap::new(),
        };
        state.reindex();
        debug!(
            count = state.len(),
            alt = state.alt.len(),
            simple,
            "captured flip state"
        );
        state
    }

    fn reindex(&mut self) {
        self.id_lookup.clear();
        self.alt.clear();
        for (index, state) in self.element_states.iter().enumerate() {
            let Some(&existing) = self.id_lookup.get(&state.id) else {
                self.id_lookup.insert(state.id.clone(), index);
                continue;
            };
            if state.is_visible && !self.element_states[existing].is_visible {
                self.alt.insert(state.id.clone(), existing);
                self.id_lookup.insert(state.id.clone(), index);
            } else {
                self.alt.insert(state.id.clone(), index);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.element_states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element_states.is_empty()
    }

    /// Re-measure every captured element in place. Ids and order are kept.
    pub fn update<T: ElementTree + ?Sized>(&mut self, tree: &T) {
        for state in &mut self.element_states {
            state.update(tree);
        }
        self.reindex();
    }

    pub fn lookup(&self, id: &str) -> Option<&ElementState> {
        self.id_lookup.get(id).map(|&i| &self.element_states[i])
    }

    /// The non-primary element sharing `id`, if any.
    pub fn alt_state(&self, id: &str) -> Option<&ElementState> {
        self.alt.get(id).map(|&i| &self.element_states[i])
    }

    pub fn get_element_state(&self, el: ElementId) -> Option<&ElementState> {
        self.element_states.iter().find(|s| s.element == el)
    }

    /// Captured value of `prop` for `el`.
    pub fn get_property(&self, el: ElementId, prop: &Property) -> Option<PropValue> {
        self.get_element_state(el)?.read_property(prop)
    }

    /// Ids of visible elements in capture order. Invisible states count as absent.
    pub fn visible_ids(&self) -> Vec<&str> {
        self.element_states
            .iter()
            .enumerate()
            .filter(|(i, s)| s.is_visible && self.id_lookup.get(&s.id) == Some(i))
            .map(|(_, s)| s.id.as_str())
            .collect()
    }

    /// Classify the elements of `other` against this state.
    pub fn compare(&self, other: &FlipState) -> StateComparison {
        let partition = Partition::between(self, other);
        let mut out = StateComparison::default();
        for id in &partition.persisting {
            let (Some(before), Some(after)) = (self.lookup(id), other.lookup(id)) else {
                continue;
            };
            if before.element != after.element || before.is_different(after) {
                out.changed.push(after.element);
            } else {
                out.unchanged.push(after.element);
            }
        }
        out.enter = partition
            .entering
            .iter()
            .filter_map(|id| other.lookup(id).map(|s| s.element))
            .collect();
        out.leave = partition
            .leaving
            .iter()
            .filter_map(|id| self.lookup(id).map(|s| s.element))
            .collect();
        out
    }

    /// Merge another capture. States of `other` replace same-id states and
    /// are appended after the remaining ones.
    pub fn add(&mut self, other: &FlipState) {
        let incoming: BTreeSet<&str> = other.element_states.iter().map(|s| s.id.as_str()).collect();
        self.element_states.retain(|s| !incoming.contains(s.id.as_str()));
        self.element_states.extend(other.element_states.iter().cloned());
        self.targets = self.element_states.iter().map(|s| s.element).collect();
        for prop in &other.props {
            if !self.props.contains(prop) {
                self.props.push(prop.clone());
            }
        }
        self.reindex();
    }

    pub fn clear(&mut self) {
        self.targets.clear();
        self.element_states.clear();
        self.id_lookup.clear();
        self.alt.clear();
        self.inline_styles.clear();
    }

    /// Pin captured elements absolutely at their captured layout boxes.
    ///
    /// The snapshot itself is untouched. Returns the elements changed.
    pub fn make_absolute<T: ElementTree + ?Sized>(&self, tree: &mut T) -> Vec<ElementId> {
        let mut changed = Vec::new();
        for state in &self.element_states {
            let el = state.element;
            if !state.is_visible
                || !tree.is_rendered(el)
                || tree.computed_style(el).position.is_out_of_flow()
            {
                continue;
            }
            absolute::pin_absolute(tree, el, state.layout);
            changed.push(el);
        }
        changed
    }

    /// Remember the current inline style of every captured element.
    pub fn record_inline_styles<T: ElementTree + ?Sized>(&mut self, tree: &T) {
        self.inline_styles = self
            .targets
            .iter()
            .filter(|el| tree.contains(**el))
            .map(|&el| (el, tree.inline_style(el)))
            .collect();
    }

    /// Put back the inline styles recorded by [`Self::record_inline_styles`].
    pub fn restore_inline_styles<T: ElementTree + ?Sized>(&self, tree: &mut T) {
        for (&element, style) in &self.inline_styles {
            Cleanup::RestoreInline {
                element,
                style: style.clone(),
            }
            .run(tree);
        }
    }

    /// Move and resize the live elements of this state onto the boxes
    /// recorded in `target`, immediately, parents first.
    ///
    /// With `nested`, children of a fitted element that are not fitted
    /// themselves are counter-scaled so their rendered size is unchanged.
    pub fn fit<'a, T: ElementTree + ?Sized>(
        &self,
        tree: &mut T,
        target: &'a FlipState,
        scale: bool,
        nested: bool,
    ) -> &'a FlipState {
        let partition = Partition::between(self, target);
        let mut pairs: Vec<(ElementId, &ElementState)> = partition
            .persisting
            .iter()
            .filter_map(|id| Some((self.lookup(id)?.element, target.lookup(id)?)))
            .filter(|(el, _)| tree.contains(*el))
            .collect();
        pairs.sort_by_key(|(el, _)| tree.depth(*el));
        let fitted: Vec<ElementId> = pairs.iter().map(|(el, _)| *el).collect();

        for (el, to) in pairs {
            let current = ElementState::capture(tree, el, to.id.clone(), &[], self.simple);
            let values = fit_values(tree, &current, to, scale);
            values.apply(tree, el);
            trace!(%el, id = %to.id, ?values, "fitted");

            if nested {
                let ratio_x = current.scale_x / clamp_scale(values.scale_x);
                let ratio_y = current.scale_y / clamp_scale(values.scale_y);
                for child in tree.children(el) {
                    if fitted.contains(&child) {
                        continue;
                    }
                    counter_scale(tree, child, ratio_x, ratio_y);
                }
            }
        }
        target
    }
}

pub(crate) fn clamp_scale(scale: f64) -> f64 {
    if scale.abs() < ZERO_EPSILON {
        ZERO_EPSILON.copysign(scale)
    } else {
        scale
    }
}

/// Multiply `el`'s scale by the given ratios.
pub(crate) fn counter_scale<T: ElementTree + ?Sized>(tree: &mut T, el: ElementId, ratio_x: f64, ratio_y: f64) {
    let mut parts = tree.computed_style(el).transform;
    parts.scale_x *= ratio_x;
    parts.scale_y *= ratio_y;
    tree.set_transform(el, parts);
}
