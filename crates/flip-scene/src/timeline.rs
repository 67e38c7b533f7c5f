//! Flip timelines: per-element tweens plus the side effects to undo at the end.
//!
//! A `Timeline` is plain data owned by the orchestrator. Playback is driven
//! from outside: the orchestrator advances it by a time delta and the
//! registered [`TweenEngine`] maps linear progress to eased progress. The
//! tween values themselves are interpolated here with [`Interpolate`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::engine::TweenEngine;
use crate::flip_state::FlipStateId;
use crate::property::{Interpolate, PropValue, Property};
use crate::tree::{ElementId, ElementTree, ElementTreeExt, InlineStyle, Position};

/// Unique identifier for a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimelineId(pub u64);

impl TimelineId {
    /// Generate a new unique timeline ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TimelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timeline#{}", self.0)
    }
}

/// Current state of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineState {
    /// Built but not yet rendered.
    #[default]
    Pending,
    Running,
    /// Reached the end and ran its cleanups.
    Finished,
    /// Stopped where it stood; cleanups skipped.
    Cancelled,
}

/// Animation parameters passed through to the tween engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineVars {
    /// Per-element duration; the engine default when unset.
    pub duration_ms: Option<f64>,
    /// Delay before the first element starts.
    pub delay_ms: f64,
    /// Ease name handed to the engine verbatim.
    pub ease: Option<String>,
    /// Offset between consecutive elements.
    pub stagger_ms: f64,
    /// Anything else, forwarded opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One element's tween between two property maps.
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    pub target: ElementId,
    pub from: BTreeMap<Property, PropValue>,
    pub to: BTreeMap<Property, PropValue>,
    pub delay_ms: f64,
    pub duration_ms: f64,
}

impl Tween {
    pub fn new(
        target: ElementId,
        from: BTreeMap<Property, PropValue>,
        to: BTreeMap<Property, PropValue>,
    ) -> Self {
        Self {
            target,
            from,
            to,
            delay_ms: 0.0,
            duration_ms: 0.0,
        }
    }

    pub fn timing(mut self, delay_ms: f64, duration_ms: f64) -> Self {
        self.delay_ms = delay_ms.max(0.0);
        self.duration_ms = duration_ms.max(0.0);
        self
    }

    pub fn end_ms(&self) -> f64 {
        self.delay_ms + self.duration_ms
    }

    /// Linear progress at `elapsed_ms` since the timeline started.
    pub fn progress(&self, elapsed_ms: f64) -> f64 {
        let active = elapsed_ms - self.delay_ms;
        if active <= 0.0 {
            return 0.0;
        }
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        (active / self.duration_ms).clamp(0.0, 1.0)
    }

    /// Interpolated value of `prop` at eased progress `t`.
    pub fn value_at(&self, prop: &Property, t: f64) -> Option<PropValue> {
        let to = self.to.get(prop)?;
        let from = self.from.get(prop).unwrap_or(to);
        Some(from.interpolate(to, t))
    }

    /// Write every property at eased progress `t`.
    pub fn apply<T: ElementTree + ?Sized>(&self, tree: &mut T, t: f64) {
        if !tree.contains(self.target) {
            return;
        }
        for prop in self.to.keys() {
            if let Some(value) = self.value_at(prop, t) {
                tree.set_property(self.target, prop, &value);
            }
        }
    }
}

/// Side effect undone when a timeline completes.
#[derive(Debug, Clone, PartialEq)]
pub enum Cleanup {
    /// Put back the positioning fields of the inline style.
    RestoreLayout {
        element: ElementId,
        position: Option<Position>,
        left: Option<f64>,
        top: Option<f64>,
        width: Option<f64>,
        height: Option<f64>,
    },
    RestoreZIndex {
        element: ElementId,
        z_index: Option<i32>,
    },
    /// Put back the whole inline style.
    RestoreInline {
        element: ElementId,
        style: InlineStyle,
    },
    RemoveClass {
        element: ElementId,
        class: String,
    },
}

impl Cleanup {
    /// Remember the positioning fields of `element`'s current inline style.
    pub fn restore_layout<T: ElementTree + ?Sized>(tree: &T, element: ElementId) -> Self {
        let inline = tree.inline_style(element);
        Self::RestoreLayout {
            element,
            position: inline.position,
            left: inline.left,
            top: inline.top,
            width: inline.width,
            height: inline.height,
        }
    }

    pub fn element(&self) -> ElementId {
        match self {
            Self::RestoreLayout { element, .. }
            | Self::RestoreZIndex { element, .. }
            | Self::RestoreInline { element, .. }
            | Self::RemoveClass { element, .. } => *element,
        }
    }

    pub fn run<T: ElementTree + ?Sized>(&self, tree: &mut T) {
        let el = self.element();
        if !tree.contains(el) {
            return;
        }
        match self {
            Self::RestoreLayout {
                position,
                left,
                top,
                width,
                height,
                ..
            } => {
                let inline = tree.inline_style(el);
                tree.set_inline_style(
                    el,
                    InlineStyle {
                        position: *position,
                        left: *left,
                        top: *top,
                        width: *width,
                        height: *height,
                        ..inline
                    },
                );
            }
            Self::RestoreZIndex { z_index, .. } => {
                let inline = tree.inline_style(el);
                tree.set_inline_style(
                    el,
                    InlineStyle {
                        z_index: *z_index,
                        ..inline
                    },
                );
            }
            Self::RestoreInline { style, .. } => tree.set_inline_style(el, style.clone()),
            Self::RemoveClass { class, .. } => tree.remove_class(el, class),
        }
    }
}

/// Callback run at a timeline boundary.
pub type Callback = Box<dyn FnMut() + Send>;

/// A composite animation over the elements of one flip.
pub struct Timeline {
    pub id: TimelineId,
    pub vars: TimelineVars,
    pub tweens: Vec<Tween>,
    /// Run in reverse order on completion.
    pub cleanups: Vec<Cleanup>,
    /// Captures this timeline animates between.
    pub state_ids: Vec<FlipStateId>,
    pub elapsed_ms: f64,
    pub state: TimelineState,
    on_start: Option<Callback>,
    on_complete: Option<Callback>,
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("id", &self.id)
            .field("vars", &self.vars)
            .field("tweens", &self.tweens)
            .field("cleanups", &self.cleanups)
            .field("state_ids", &self.state_ids)
            .field("elapsed_ms", &self.elapsed_ms)
            .field("state", &self.state)
            .field("on_start", &self.on_start.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl Timeline {
    pub fn new(vars: TimelineVars) -> Self {
        Self {
            id: TimelineId::new(),
            vars,
            tweens: Vec::new(),
            cleanups: Vec::new(),
            state_ids: Vec::new(),
            elapsed_ms: 0.0,
            state: TimelineState::Pending,
            on_start: None,
            on_complete: None,
        }
    }

    pub fn add(&mut self, tween: Tween) {
        self.tweens.push(tween);
    }

    pub fn add_cleanup(&mut self, cleanup: Cleanup) {
        self.cleanups.push(cleanup);
    }

    pub fn set_on_start(&mut self, callback: Option<Callback>) {
        self.on_start = callback;
    }

    pub fn set_on_complete(&mut self, callback: Option<Callback>) {
        self.on_complete = callback;
    }

    /// Tweened elements in first-tween order.
    pub fn targets(&self) -> Vec<ElementId> {
        let mut out: Vec<ElementId> = Vec::new();
        for tween in &self.tweens {
            if !out.contains(&tween.target) {
                out.push(tween.target);
            }
        }
        out
    }

    pub fn duration_ms(&self) -> f64 {
        self.tweens.iter().map(Tween::end_ms).fold(0.0, f64::max)
    }

    /// Overall linear progress in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        let duration = self.duration_ms();
        if duration <= 0.0 {
            return if self.state == TimelineState::Finished { 1.0 } else { 0.0 };
        }
        (self.elapsed_ms / duration).clamp(0.0, 1.0)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, TimelineState::Pending | TimelineState::Running)
    }

    /// Interpolated value of `prop` on `el` at the current time.
    pub fn value_of(&self, engine: &dyn TweenEngine, el: ElementId, prop: &Property) -> Option<PropValue> {
        self.tweens
            .iter()
            .rev()
            .filter(|t| t.target == el)
            .find_map(|t| t.value_at(prop, self.eased(engine, t)))
    }

    fn eased(&self, engine: &dyn TweenEngine, tween: &Tween) -> f64 {
        engine.ease(self.vars.ease.as_deref(), tween.progress(self.elapsed_ms))
    }

    /// Write every tween's value at the current time.
    pub fn render<T: ElementTree + ?Sized>(&self, tree: &mut T, engine: &dyn TweenEngine) {
        for tween in &self.tweens {
            tween.apply(tree, self.eased(engine, tween));
        }
    }

    /// Render the first frame and fire `on_start`.
    pub fn start<T: ElementTree + ?Sized>(&mut self, tree: &mut T, engine: &dyn TweenEngine) {
        self.elapsed_ms = 0.0;
        self.state = TimelineState::Running;
        self.render(tree, engine);
        if let Some(callback) = self.on_start.as_mut() {
            callback();
        }
    }

    /// Move time forward. Returns whether the timeline is still running.
    pub fn advance<T: ElementTree + ?Sized>(
        &mut self,
        tree: &mut T,
        engine: &dyn TweenEngine,
        delta_ms: f64,
    ) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state = TimelineState::Running;
        self.elapsed_ms += delta_ms.max(0.0);
        if self.elapsed_ms >= self.duration_ms() {
            self.finish(tree);
            return false;
        }
        self.render(tree, engine);
        true
    }

    /// Jump to the end, run cleanups and fire `on_complete`.
    pub fn finish<T: ElementTree + ?Sized>(&mut self, tree: &mut T) {
        if !self.is_active() {
            return;
        }
        self.elapsed_ms = self.duration_ms();
        for tween in &self.tweens {
            tween.apply(tree, 1.0);
        }
        for cleanup in self.cleanups.iter().rev() {
            cleanup.run(tree);
        }
        self.state = TimelineState::Finished;
        trace!(id = %self.id, "timeline finished");
        if let Some(callback) = self.on_complete.as_mut() {
            callback();
        }
    }

    /// Stop where it stands. Cleanups are not run.
    pub fn kill(&mut self) {
        if self.is_active() {
            self.state = TimelineState::Cancelled;
        }
    }
}
