//! The tween engine seam.
//!
//! Timing curves are not part of this crate. A [`TweenEngine`] is registered
//! once with [`crate::Flip::register`] and consulted for the eased progress of
//! every tween and for the duration used when a flip names none.

use std::fmt;

use tracing::trace;

/// Default flip duration in milliseconds.
pub const DEFAULT_DURATION_MS: f64 = 500.0;

/// External tweening engine driving flip timelines.
pub trait TweenEngine: Send + fmt::Debug {
    /// Map linear progress in `0.0..=1.0` through the named ease.
    ///
    /// `ease` is passed through untouched from the flip's timeline vars.
    /// Implementations must return `0.0` at `0.0` and `1.0` at `1.0`.
    fn ease(&self, ease: Option<&str>, progress: f64) -> f64;

    /// Duration used when neither the vars nor the config specify one.
    fn default_duration_ms(&self) -> f64 {
        DEFAULT_DURATION_MS
    }
}

/// Engine without easing: every ease name is linear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearEngine {
    pub duration_ms: f64,
}

impl Default for LinearEngine {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_DURATION_MS,
        }
    }
}

impl TweenEngine for LinearEngine {
    fn ease(&self, ease: Option<&str>, progress: f64) -> f64 {
        if let Some(name) = ease {
            trace!(ease = name, "linear engine ignores named ease");
        }
        progress.clamp(0.0, 1.0)
    }

    fn default_duration_ms(&self) -> f64 {
        self.duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_engine_clamps() {
        let engine = LinearEngine::default();
        assert_eq!(engine.ease(None, -0.5), 0.0);
        assert_eq!(engine.ease(Some("power2.out"), 0.25), 0.25);
        assert_eq!(engine.ease(None, 1.5), 1.0);
        assert_eq!(engine.default_duration_ms(), DEFAULT_DURATION_MS);
    }
}
