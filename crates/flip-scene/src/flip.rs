//! The flip orchestrator.
//!
//! `Flip` ties the pieces together: it captures states, diffs a saved
//! capture against the live tree, asks the fit engine for every persisting
//! element's start and end values, and turns the result into a [`Timeline`]
//! played by the registered [`TweenEngine`].
//!
//! # Usage
//!
//! ```ignore
//! let mut flip = Flip::new();
//! flip.register(Box::new(LinearEngine::default()));
//!
//! let state = flip.get_state(&scene, ".card", &CaptureVars::default());
//! scene.set_flow_box(card, new_box); // the real layout change
//! let id = flip.from(&mut scene, &state, FlipVars { fade: true, ..flip.default_vars() })?;
//!
//! while flip.is_flipping(card) {
//!     flip.update(&mut scene, 16.0);
//! }
//! ```
//!
//! Timelines are owned here and addressed by [`TimelineId`]. The registry
//! behind [`Flip::get_by_target`] maps each animating element to the most
//! recent timeline that targets it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use flip_config::FlipConfig;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::absolute;
use crate::convert;
use crate::diff::Partition;
use crate::element_state::ElementState;
use crate::error::{FlipError, Result};
use crate::events::{EventQueue, FlipEvent};
use crate::fit::{FitValues, TransformDelta, fit_values};
use crate::flip_state::{CaptureVars, FlipState, clamp_scale, counter_scale, synthesize_id};
use crate::geometry::Point;
use crate::matrix::Matrix2D;
use crate::property::{PropValue, Property};
use crate::timeline::{Callback, Cleanup, Timeline, TimelineId, TimelineVars, Tween};
use crate::tree::{Display, ElementId, ElementTree, ElementTreeExt, InlineStyle, Targets};

const SAME_EPSILON: f64 = 1e-4;

/// Callback receiving the entering or leaving elements of a flip.
pub type ElementsCallback = Box<dyn FnMut(&[ElementId], &mut Timeline) + Send>;

/// Options for [`Flip::from`] and [`Flip::to`].
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct FlipVars {
    /// Duration, ease, stagger and anything else for the tween engine.
    #[serde(flatten)]
    pub timeline: TimelineVars,
    /// Fit size changes through scale instead of width/height.
    pub scale: bool,
    /// Pin persisting elements absolutely while they animate.
    pub absolute: bool,
    /// Pin leaving elements absolutely so they stop taking space.
    pub absolute_on_leave: bool,
    /// Counter-scale non-target children of scaled elements.
    pub nested: bool,
    /// Fade entering elements in, leaving ones out, and cross-fade swaps.
    pub fade: bool,
    /// Skip persisting elements whose start and end are the same.
    pub prune: bool,
    /// Re-capture translation only.
    pub simple: bool,
    /// Extra whole turns added to every persisting element's rotation.
    pub spin: f64,
    /// Class applied to every participating element while animating.
    pub toggle_class: Option<String>,
    /// Stacking order for animating (unpruned) persisting elements.
    pub z_index: Option<i32>,
    /// Elements to re-capture instead of the saved state's own.
    pub targets: Option<Targets>,
    #[serde(skip)]
    pub on_enter: Option<ElementsCallback>,
    #[serde(skip)]
    pub on_leave: Option<ElementsCallback>,
    #[serde(skip)]
    pub on_start: Option<Callback>,
    #[serde(skip)]
    pub on_complete: Option<Callback>,
}

impl fmt::Debug for FlipVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlipVars")
            .field("timeline", &self.timeline)
            .field("scale", &self.scale)
            .field("absolute", &self.absolute)
            .field("absolute_on_leave", &self.absolute_on_leave)
            .field("nested", &self.nested)
            .field("fade", &self.fade)
            .field("prune", &self.prune)
            .field("simple", &self.simple)
            .field("spin", &self.spin)
            .field("toggle_class", &self.toggle_class)
            .field("z_index", &self.z_index)
            .field("targets", &self.targets)
            .field("on_enter", &self.on_enter.is_some())
            .field("on_leave", &self.on_leave.is_some())
            .finish_non_exhaustive()
    }
}

/// Options for [`Flip::fit`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FitVars {
    pub scale: bool,
    /// Return the computed values without touching the element.
    pub get_vars: bool,
    /// Pin the element absolutely first.
    pub absolute: bool,
    pub simple: bool,
    /// Animate into place instead of applying immediately.
    pub timeline: Option<TimelineVars>,
}

/// Box an element is fitted onto.
#[derive(Debug, Clone, Copy)]
pub enum FitTarget<'a> {
    /// A live element, measured now.
    Element(ElementId),
    /// A stored capture, used as is.
    State(&'a ElementState),
}

impl From<ElementId> for FitTarget<'_> {
    fn from(el: ElementId) -> Self {
        Self::Element(el)
    }
}

impl<'a> From<&'a ElementState> for FitTarget<'a> {
    fn from(state: &'a ElementState) -> Self {
        Self::State(state)
    }
}

/// What [`Flip::fit`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitOutcome {
    /// Nothing changed. `delta` is relative to the element's current
    /// transform (identity when it already sits on the target); `values` are
    /// the absolute values the element would be given.
    Vars { delta: TransformDelta, values: FitValues },
    /// Values written to the element.
    Applied(FitValues),
    Animated(TimelineId),
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Defaults {
    duration_ms: Option<f64>,
    ease: Option<String>,
    stagger_ms: f64,
    simple: bool,
    scale: bool,
    nested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Saved state -> live layout.
    From,
    /// Live layout -> saved state.
    To,
}

/// Start and end of one persisting element.
struct Plan {
    element: ElementId,
    index: usize,
    from: BTreeMap<Property, PropValue>,
    to: BTreeMap<Property, PropValue>,
}

/// Central coordinator for flips.
///
/// Thread safety: `Flip` is `Send` so it can move to whichever thread owns the tree.
#[derive(Debug, Default)]
pub struct Flip {
    engine: Option<Box<dyn crate::engine::TweenEngine>>,
    defaults: Defaults,
    timelines: BTreeMap<TimelineId, Timeline>,
    /// Element -> most recent timeline animating it.
    registry: HashMap<ElementId, TimelineId>,
    events: EventQueue,
}

impl Flip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed duration, ease, stagger and geometry defaults from config.
    pub fn with_config(config: &FlipConfig) -> Self {
        Self {
            defaults: Defaults {
                duration_ms: Some(config.animation.duration_ms),
                ease: config.animation.ease.clone(),
                stagger_ms: config.animation.stagger_ms,
                simple: config.geometry.simple,
                scale: config.geometry.scale,
                nested: config.geometry.nested,
            },
            ..Self::default()
        }
    }

    /// Wire the tween engine. Only the first call has an effect.
    pub fn register(&mut self, engine: Box<dyn crate::engine::TweenEngine>) -> bool {
        if self.engine.is_some() {
            debug!("tween engine already registered");
            return false;
        }
        debug!(?engine, "tween engine registered");
        self.engine = Some(engine);
        true
    }

    pub fn is_registered(&self) -> bool {
        self.engine.is_some()
    }

    /// Vars carrying the configured defaults.
    pub fn default_vars(&self) -> FlipVars {
        FlipVars {
            timeline: TimelineVars {
                duration_ms: self.defaults.duration_ms,
                ease: self.defaults.ease.clone(),
                stagger_ms: self.defaults.stagger_ms,
                ..TimelineVars::default()
            },
            scale: self.defaults.scale,
            nested: self.defaults.nested,
            simple: self.defaults.simple,
            ..FlipVars::default()
        }
    }

    /// Fit vars carrying the configured defaults.
    pub fn default_fit_vars(&self) -> FitVars {
        FitVars {
            scale: self.defaults.scale,
            simple: self.defaults.simple,
            ..FitVars::default()
        }
    }

    /// Capture `targets`.
    pub fn get_state<T: ElementTree + ?Sized>(
        &self,
        tree: &T,
        targets: impl Into<Targets>,
        vars: &CaptureVars,
    ) -> FlipState {
        let vars = CaptureVars {
            simple: vars.simple || self.defaults.simple,
            ..vars.clone()
        };
        FlipState::capture(tree, &targets.into(), &vars)
    }

    /// Animate from `state` to the current layout.
    pub fn from<T: ElementTree + ?Sized>(
        &mut self,
        tree: &mut T,
        state: &FlipState,
        vars: FlipVars,
    ) -> Result<TimelineId> {
        self.animate(tree, state, vars, Direction::From)
    }

    /// Animate from the current layout to `state`.
    pub fn to<T: ElementTree + ?Sized>(
        &mut self,
        tree: &mut T,
        state: &FlipState,
        vars: FlipVars,
    ) -> Result<TimelineId> {
        self.animate(tree, state, vars, Direction::To)
    }

    fn duration_for(&self, vars: &TimelineVars) -> Result<f64> {
        let engine = self.engine.as_ref().ok_or(FlipError::EngineNotRegistered)?;
        Ok(vars
            .duration_ms
            .or(self.defaults.duration_ms)
            .unwrap_or_else(|| engine.default_duration_ms())
            .max(0.0))
    }

    fn animate<T: ElementTree + ?Sized>(
        &mut self,
        tree: &mut T,
        state: &FlipState,
        mut vars: FlipVars,
        direction: Direction,
    ) -> Result<TimelineId> {
        let duration = self.duration_for(&vars.timeline)?;
        let stagger = vars.timeline.stagger_ms;
        let delay = vars.timeline.delay_ms;

        let targets = vars
            .targets
            .take()
            .unwrap_or_else(|| Targets::from(state.targets.as_slice()));
        let elements = targets.resolve(tree);
        self.kill_flips_of(tree, elements.clone(), true);

        let current = FlipState::capture_elements(
            tree,
            &elements,
            state.props.clone(),
            state.simple || vars.simple,
        );
        let (before, after) = match direction {
            Direction::From => (state, &current),
            Direction::To => (&current, state),
        };
        let partition = Partition::between(before, after);
        debug!(
            ?direction,
            persisting = partition.persisting.len(),
            entering = partition.entering.len(),
            leaving = partition.leaving.len(),
            "flip partition"
        );

        let mut timeline = Timeline::new(TimelineVars {
            duration_ms: Some(duration),
            ease: vars.timeline.ease.clone().or_else(|| self.defaults.ease.clone()),
            ..vars.timeline.clone()
        });
        timeline.state_ids = vec![state.id, current.id];

        // (live element, saved state, stagger index), parents first.
        let mut persisting: Vec<(ElementId, &ElementState, usize)> = partition
            .persisting
            .iter()
            .enumerate()
            .filter_map(|(index, id)| Some((current.lookup(id)?.element, state.lookup(id)?, index)))
            .collect();
        persisting.sort_by_key(|(el, _, _)| tree.depth(*el));
        let persisting_elements: Vec<ElementId> = persisting.iter().map(|(el, _, _)| *el).collect();
        // Taken before any fit is written; only kept for elements that animate.
        let mut layouts: HashMap<ElementId, Cleanup> = if direction == Direction::From || vars.absolute {
            persisting_elements
                .iter()
                .map(|el| (*el, Cleanup::restore_layout(tree, *el)))
                .collect()
        } else {
            HashMap::new()
        };

        let mut plans = Vec::with_capacity(persisting.len());
        for (el, saved, index) in persisting {
            let Some(now) = current.get_element_state(el) else {
                continue;
            };
            let live = if vars.nested {
                ElementState::capture(tree, el, now.id.clone(), &[], now.simple)
            } else {
                now.clone()
            };
            let fitted = fit_values(tree, &live, saved, vars.scale);
            let natural = FitValues::natural(&live, !vars.scale);
            let (mut start, end) = match direction {
                Direction::From => (fitted, natural),
                Direction::To => (natural, fitted),
            };
            start.rotation -= 360.0 * vars.spin;

            let mut from = start.to_props();
            let mut to = end.to_props();
            let swapped = saved.element != el;
            let (opacity_from, opacity_to) = match direction {
                Direction::From => (saved.opacity, now.opacity),
                Direction::To => (now.opacity, saved.opacity),
            };
            if swapped && vars.fade {
                from.insert(Property::Opacity, PropValue::Number(0.0));
                to.insert(Property::Opacity, PropValue::Number(now.opacity));
                self.fade_out_replaced(tree, &mut timeline, saved, &persisting_elements, delay, duration);
            } else if (opacity_from - opacity_to).abs() > SAME_EPSILON {
                from.insert(Property::Opacity, PropValue::Number(opacity_from));
                to.insert(Property::Opacity, PropValue::Number(opacity_to));
            }
            for name in &state.props {
                let (Some(old), Some(new)) = (saved.props.get(name), now.props.get(name)) else {
                    continue;
                };
                let (a, b) = match direction {
                    Direction::From => (old, new),
                    Direction::To => (new, old),
                };
                from.insert(Property::Style(name.clone()), a.clone());
                to.insert(Property::Style(name.clone()), b.clone());
            }

            if vars.prune && same_values(&from, &to) {
                trace!(%el, "pruned unchanged element");
                continue;
            }

            if vars.nested {
                start.apply(tree, el);
                let natural_x = live.scale_x;
                let natural_y = live.scale_y;
                for child in tree.children(el) {
                    if persisting_elements.contains(&child) || !tree.is_rendered(child) {
                        continue;
                    }
                    let parts = tree.computed_style(child).transform;
                    let start_x = parts.scale_x * natural_x / clamp_scale(start.scale_x);
                    let start_y = parts.scale_y * natural_y / clamp_scale(start.scale_y);
                    let end_x = parts.scale_x * natural_x / clamp_scale(end.scale_x);
                    let end_y = parts.scale_y * natural_y / clamp_scale(end.scale_y);
                    if (start_x - end_x).abs() < SAME_EPSILON && (start_y - end_y).abs() < SAME_EPSILON {
                        continue;
                    }
                    counter_scale(
                        tree,
                        child,
                        start_x / clamp_scale(parts.scale_x),
                        start_y / clamp_scale(parts.scale_y),
                    );
                    timeline.add(
                        Tween::new(
                            child,
                            BTreeMap::from([
                                (Property::ScaleX, PropValue::Number(start_x)),
                                (Property::ScaleY, PropValue::Number(start_y)),
                            ]),
                            BTreeMap::from([
                                (Property::ScaleX, PropValue::Number(end_x)),
                                (Property::ScaleY, PropValue::Number(end_y)),
                            ]),
                        )
                        .timing(delay + stagger * index as f64, duration),
                    );
                }
            }
            plans.push(Plan {
                element: el,
                index,
                from,
                to,
            });
        }
        // Depth order, parents first.
        let animating: Vec<ElementId> = plans.iter().map(|p| p.element).collect();
        for el in &animating {
            if let Some(cleanup) = layouts.remove(el) {
                timeline.add_cleanup(cleanup);
            }
        }
        if vars.absolute {
            absolute::make_absolute(tree, &animating);
        }

        plans.sort_by_key(|p| p.index);
        for plan in plans {
            timeline.add(
                Tween::new(plan.element, plan.from, plan.to)
                    .timing(delay + stagger * plan.index as f64, duration),
            );
        }

        let entering: Vec<ElementId> = partition
            .entering
            .iter()
            .filter_map(|id| after.lookup(id))
            .map(|s| s.element)
            .filter(|el| tree.contains(*el))
            .collect();
        let leaving: Vec<ElementId> = partition
            .leaving
            .iter()
            .filter_map(|id| before.lookup(id))
            .map(|s| s.element)
            .filter(|el| tree.contains(*el))
            .collect();

        if vars.fade {
            for &el in &entering {
                if !tree.is_rendered(el) {
                    continue;
                }
                let opacity = tree.computed_style(el).opacity;
                timeline.add(
                    Tween::new(
                        el,
                        BTreeMap::from([(Property::Opacity, PropValue::Number(0.0))]),
                        BTreeMap::from([(Property::Opacity, PropValue::Number(opacity))]),
                    )
                    .timing(delay, duration),
                );
            }
        }
        for &el in &leaving {
            let Some(saved) = before.get_element_state(el) else {
                continue;
            };
            self.leave(tree, &mut timeline, saved, &vars, delay, duration);
        }

        let participants: Vec<ElementId> = animating
            .iter()
            .chain(&entering)
            .chain(&leaving)
            .copied()
            .collect();
        if let Some(class) = vars.toggle_class.as_deref() {
            for &el in &participants {
                if tree.has_class(el, class) {
                    continue;
                }
                tree.add_class(el, class);
                timeline.add_cleanup(Cleanup::RemoveClass {
                    element: el,
                    class: class.to_string(),
                });
            }
        }
        if let Some(z_index) = vars.z_index {
            for &el in &animating {
                let inline = tree.inline_style(el);
                timeline.add_cleanup(Cleanup::RestoreZIndex {
                    element: el,
                    z_index: inline.z_index,
                });
                tree.set_inline_style(
                    el,
                    InlineStyle {
                        z_index: Some(z_index),
                        ..inline
                    },
                );
            }
        }

        timeline.set_on_start(vars.on_start.take());
        timeline.set_on_complete(vars.on_complete.take());
        if !entering.is_empty() {
            if let Some(on_enter) = vars.on_enter.as_mut() {
                on_enter(&entering, &mut timeline);
            }
        }
        if !leaving.is_empty() {
            if let Some(on_leave) = vars.on_leave.as_mut() {
                on_leave(&leaving, &mut timeline);
            }
        }

        self.launch(tree, timeline)
    }

    /// Keep the element an id used to belong to over its old box and fade it out.
    fn fade_out_replaced<T: ElementTree + ?Sized>(
        &self,
        tree: &mut T,
        timeline: &mut Timeline,
        saved: &ElementState,
        persisting: &[ElementId],
        delay: f64,
        duration: f64,
    ) {
        let old = saved.element;
        if !tree.contains(old) || persisting.contains(&old) {
            return;
        }
        timeline.add_cleanup(Cleanup::RestoreInline {
            element: old,
            style: tree.inline_style(old),
        });
        reveal(tree, old, saved);
        absolute::pin_absolute(tree, old, saved.layout);
        timeline.add(fade_to_zero(old, saved.opacity).timing(delay, duration));
    }

    fn leave<T: ElementTree + ?Sized>(
        &self,
        tree: &mut T,
        timeline: &mut Timeline,
        saved: &ElementState,
        vars: &FlipVars,
        delay: f64,
        duration: f64,
    ) {
        if !vars.fade && !vars.absolute_on_leave {
            return;
        }
        let el = saved.element;
        timeline.add_cleanup(Cleanup::RestoreInline {
            element: el,
            style: tree.inline_style(el),
        });
        if vars.fade && !tree.is_rendered(el) {
            reveal(tree, el, saved);
            if vars.absolute_on_leave {
                absolute::pin_absolute(tree, el, saved.layout);
            }
        } else if vars.absolute_on_leave {
            absolute::make_absolute(tree, &[el]);
        }
        if vars.fade && tree.is_rendered(el) {
            let opacity = tree.computed_style(el).opacity;
            timeline.add(fade_to_zero(el, opacity).timing(delay, duration));
        }
    }

    fn launch<T: ElementTree + ?Sized>(&mut self, tree: &mut T, mut timeline: Timeline) -> Result<TimelineId> {
        let engine = self.engine.as_deref().ok_or(FlipError::EngineNotRegistered)?;
        let id = timeline.id;
        let targets = timeline.targets();
        timeline.start(tree, engine);
        self.events.push(FlipEvent::Started {
            timeline_id: id,
            targets: targets.clone(),
        });

        if timeline.duration_ms() <= 0.0 {
            timeline.finish(tree);
            self.events.push(FlipEvent::Completed {
                timeline_id: id,
                targets,
            });
            return Ok(id);
        }
        for el in targets {
            self.registry.insert(el, id);
        }
        self.timelines.insert(id, timeline);
        Ok(id)
    }

    /// Fit `el` onto `target`'s box, composing through both parent chains.
    pub fn fit<T: ElementTree + ?Sized>(
        &mut self,
        tree: &mut T,
        el: ElementId,
        target: FitTarget<'_>,
        vars: FitVars,
    ) -> Result<FitOutcome> {
        if !tree.contains(el) {
            return Err(FlipError::UnknownElement(el));
        }
        let duration = match &vars.timeline {
            Some(timeline) if !vars.get_vars => Some(self.duration_for(timeline)?),
            _ => None,
        };
        let target_state = match target {
            FitTarget::Element(other) => {
                if !tree.contains(other) {
                    return Err(FlipError::UnknownElement(other));
                }
                let id = tree.flip_id(other).unwrap_or_else(|| synthesize_id(other));
                ElementState::capture(tree, other, id, &[], false)
            }
            FitTarget::State(state) => state.clone(),
        };
        let id = tree.flip_id(el).unwrap_or_else(|| synthesize_id(el));
        let simple = vars.simple || self.defaults.simple;

        if vars.get_vars {
            let current = ElementState::capture(tree, el, id, &[], simple);
            let values = fit_values(tree, &current, &target_state, vars.scale);
            return Ok(FitOutcome::Vars {
                delta: values.delta(&current.parts()),
                values,
            });
        }
        if vars.absolute {
            absolute::make_absolute(tree, &[el]);
        }
        let current = ElementState::capture(tree, el, id, &[], simple);
        let values = fit_values(tree, &current, &target_state, vars.scale);

        let (Some(timeline_vars), Some(duration)) = (vars.timeline, duration) else {
            values.apply(tree, el);
            return Ok(FitOutcome::Applied(values));
        };
        self.kill_flips_of(tree, el, true);
        let natural = FitValues::natural(&current, !vars.scale);
        let delay = timeline_vars.delay_ms;
        let mut timeline = Timeline::new(TimelineVars {
            duration_ms: Some(duration),
            ease: timeline_vars.ease.clone().or_else(|| self.defaults.ease.clone()),
            ..timeline_vars
        });
        timeline.add(Tween::new(el, natural.to_props(), values.to_props()).timing(delay, duration));
        Ok(FitOutcome::Animated(self.launch(tree, timeline)?))
    }

    /// Switch `targets` to absolute positioning without moving them.
    pub fn make_absolute<T: ElementTree + ?Sized>(
        &self,
        tree: &mut T,
        targets: impl Into<Targets>,
    ) -> Vec<ElementId> {
        let elements = targets.into().resolve(tree);
        absolute::make_absolute(tree, &elements)
    }

    /// Matrix mapping `from`-local points into `to`-local space.
    pub fn convert_coordinates<T: ElementTree + ?Sized>(
        &self,
        tree: &T,
        from: ElementId,
        to: ElementId,
    ) -> Result<Matrix2D> {
        convert::convert_coordinates(tree, from, to)
    }

    pub fn convert_point<T: ElementTree + ?Sized>(
        &self,
        tree: &T,
        from: ElementId,
        to: ElementId,
        point: Point,
    ) -> Result<Point> {
        convert::convert_point(tree, from, to, point)
    }

    /// The timeline currently animating `el`, most recent first.
    pub fn get_by_target(&self, el: ElementId) -> Option<&Timeline> {
        self.registry.get(&el).and_then(|id| self.timelines.get(id))
    }

    pub fn is_flipping(&self, el: ElementId) -> bool {
        self.get_by_target(el).is_some()
    }

    pub fn timeline(&self, id: TimelineId) -> Option<&Timeline> {
        self.timelines.get(&id)
    }

    pub fn active_count(&self) -> usize {
        self.timelines.len()
    }

    /// Interpolated value of `prop` on `el` in its registered timeline.
    pub fn animated_value(&self, el: ElementId, prop: &Property) -> Option<PropValue> {
        let engine = self.engine.as_deref()?;
        self.get_by_target(el)?.value_of(engine, el, prop)
    }

    /// Advance every running timeline by `delta_ms`.
    pub fn update<T: ElementTree + ?Sized>(&mut self, tree: &mut T, delta_ms: f64) {
        let Some(engine) = self.engine.as_deref() else {
            return;
        };
        let mut finished = Vec::new();
        for (id, timeline) in self.timelines.iter_mut() {
            if !timeline.advance(tree, engine, delta_ms) {
                finished.push(*id);
            }
        }
        for id in finished {
            self.retire(id, true);
        }
    }

    /// Jump every flip that animates `state` to its end, synchronously.
    ///
    /// Returns how many were completed; zero (and no effect) when none is running.
    pub fn complete_flips<T: ElementTree + ?Sized>(&mut self, tree: &mut T, state: &FlipState) -> usize {
        let ids: Vec<TimelineId> = self
            .timelines
            .iter()
            .filter(|(_, t)| t.state_ids.contains(&state.id))
            .map(|(id, _)| *id)
            .collect();
        if ids.is_empty() {
            trace!("no flips outstanding");
            return 0;
        }
        for id in &ids {
            if let Some(timeline) = self.timelines.get_mut(id) {
                timeline.finish(tree);
            }
            self.retire(*id, true);
        }
        ids.len()
    }

    /// Stop every flip animating any of `targets`.
    ///
    /// With `complete`, flips jump to their end and run their cleanups;
    /// otherwise they stop where they are.
    pub fn kill_flips_of<T: ElementTree + ?Sized>(
        &mut self,
        tree: &mut T,
        targets: impl Into<Targets>,
        complete: bool,
    ) -> usize {
        let elements = targets.into().resolve(tree);
        let ids: BTreeSet<TimelineId> = self
            .timelines
            .iter()
            .filter(|(_, t)| t.targets().iter().any(|el| elements.contains(el)))
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(timeline) = self.timelines.get_mut(id) {
                if complete {
                    timeline.finish(tree);
                } else {
                    timeline.kill();
                }
            }
            self.retire(*id, complete);
        }
        ids.len()
    }

    /// Jump one timeline to its end.
    pub fn complete_timeline<T: ElementTree + ?Sized>(&mut self, tree: &mut T, id: TimelineId) -> Result<()> {
        let timeline = self.timelines.get_mut(&id).ok_or(FlipError::UnknownTimeline(id))?;
        timeline.finish(tree);
        self.retire(id, true);
        Ok(())
    }

    /// Stop one timeline where it stands.
    pub fn kill_timeline(&mut self, id: TimelineId) -> Result<()> {
        let timeline = self.timelines.get_mut(&id).ok_or(FlipError::UnknownTimeline(id))?;
        timeline.kill();
        self.retire(id, false);
        Ok(())
    }

    fn retire(&mut self, id: TimelineId, completed: bool) {
        let Some(timeline) = self.timelines.remove(&id) else {
            return;
        };
        self.registry.retain(|_, t| *t != id);
        let targets = timeline.targets();
        self.events.push(if completed {
            FlipEvent::Completed {
                timeline_id: id,
                targets,
            }
        } else {
            FlipEvent::Killed {
                timeline_id: id,
                targets,
            }
        });
    }

    /// Drop every timeline, registry entry and pending event. The engine stays registered.
    pub fn reset(&mut self) {
        self.timelines.clear();
        self.registry.clear();
        self.events.clear();
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = FlipEvent> + '_ {
        self.events.drain()
    }
}

// Ensure Flip is Send so it can live on the thread that owns the tree
static_assertions::assert_impl_all!(Flip: Send);

/// Make a hidden element displayed again with its captured display mode.
fn reveal<T: ElementTree + ?Sized>(tree: &mut T, el: ElementId, saved: &ElementState) {
    if tree.computed_style(el).display != Display::None {
        return;
    }
    let display = if saved.display == Display::None {
        Display::Block
    } else {
        saved.display
    };
    let inline = tree.inline_style(el);
    tree.set_inline_style(
        el,
        InlineStyle {
            display: Some(display),
            ..inline
        },
    );
}

fn fade_to_zero(el: ElementId, opacity: f64) -> Tween {
    Tween::new(
        el,
        BTreeMap::from([(Property::Opacity, PropValue::Number(opacity))]),
        BTreeMap::from([(Property::Opacity, PropValue::Number(0.0))]),
    )
}

fn same_values(from: &BTreeMap<Property, PropValue>, to: &BTreeMap<Property, PropValue>) -> bool {
    to.iter().all(|(prop, value)| {
        from.get(prop).is_some_and(|f| {
            if prop.is_angle() {
                match (f.as_f64(), value.as_f64()) {
                    (Some(a), Some(b)) => (a - b).abs() < SAME_EPSILON,
                    _ => false,
                }
            } else {
                f.approx_eq(value, SAME_EPSILON)
            }
        })
    })
}
