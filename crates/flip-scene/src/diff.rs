//! Partitioning two captures into persisting, entering and leaving ids.

use std::collections::HashSet;

use crate::flip_state::FlipState;

/// Ids classified across a "before" and an "after" capture.
///
/// `persisting` and `entering` follow the order of the after capture,
/// `leaving` the order of the before capture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    pub persisting: Vec<String>,
    pub entering: Vec<String>,
    pub leaving: Vec<String>,
}

impl Partition {
    /// Partition the visible ids of two captures. Hidden elements count as absent.
    pub fn between(before: &FlipState, after: &FlipState) -> Self {
        Self::of_ids(&before.visible_ids(), &after.visible_ids())
    }

    pub fn of_ids<S: AsRef<str>>(before: &[S], after: &[S]) -> Self {
        let before_set: HashSet<&str> = before.iter().map(AsRef::<str>::as_ref).collect();
        let after_set: HashSet<&str> = after.iter().map(AsRef::<str>::as_ref).collect();

        let mut out = Self::default();
        let mut seen = HashSet::new();
        for id in after.iter().map(AsRef::<str>::as_ref) {
            if !seen.insert(id) {
                continue;
            }
            if before_set.contains(id) {
                out.persisting.push(id.to_string());
            } else {
                out.entering.push(id.to_string());
            }
        }
        let mut seen = HashSet::new();
        for id in before.iter().map(AsRef::<str>::as_ref) {
            if seen.insert(id) && !after_set.contains(id) {
                out.leaving.push(id.to_string());
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.persisting.is_empty() && self.entering.is_empty() && self.leaving.is_empty()
    }
}
