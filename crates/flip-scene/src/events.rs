//! Flip lifecycle events.
//!
//! The orchestrator queues an event when a timeline starts and when it ends,
//! either normally or by being killed. Events are polled after each
//! [`crate::Flip::update`]:
//!
//! ```ignore
//! flip.update(&mut scene, 16.0);
//! for event in flip.drain_events() {
//!     if let FlipEvent::Completed { targets, .. } = event {
//!         println!("settled: {targets:?}");
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::timeline::TimelineId;
use crate::tree::ElementId;

/// Event emitted when a flip timeline changes state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlipEvent {
    /// Timeline created and rendered at its start.
    Started {
        timeline_id: TimelineId,
        targets: Vec<ElementId>,
    },
    /// Timeline reached its end (or was completed early) and ran its cleanups.
    Completed {
        timeline_id: TimelineId,
        targets: Vec<ElementId>,
    },
    /// Timeline was stopped where it stood.
    Killed {
        timeline_id: TimelineId,
        targets: Vec<ElementId>,
    },
}

impl FlipEvent {
    pub fn timeline_id(&self) -> TimelineId {
        match self {
            Self::Started { timeline_id, .. }
            | Self::Completed { timeline_id, .. }
            | Self::Killed { timeline_id, .. } => *timeline_id,
        }
    }

    pub fn targets(&self) -> &[ElementId] {
        match self {
            Self::Started { targets, .. }
            | Self::Completed { targets, .. }
            | Self::Killed { targets, .. } => targets,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }

    /// Completed or killed.
    pub fn is_ended(&self) -> bool {
        !self.is_started()
    }
}

/// Queue for collecting flip events between polls.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<FlipEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: FlipEvent) {
        self.events.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn pop(&mut self) -> Option<FlipEvent> {
        self.events.pop_front()
    }

    /// Drain all events from the queue, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = FlipEvent> + '_ {
        self.events.drain(..)
    }

    pub fn peek(&self) -> Option<&FlipEvent> {
        self.events.front()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Pending events that involve `el`.
    pub fn events_for_element(&self, el: ElementId) -> Vec<&FlipEvent> {
        self.events
            .iter()
            .filter(|e| e.targets().contains(&el))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = FlipEvent::Killed {
            timeline_id: TimelineId(4),
            targets: vec![ElementId(1), ElementId(2)],
        };
        assert_eq!(event.timeline_id(), TimelineId(4));
        assert_eq!(event.targets(), &[ElementId(1), ElementId(2)]);
        assert!(event.is_ended());
        assert!(!event.is_started());
    }

    #[test]
    fn test_event_queue_operations() {
        let mut queue = EventQueue::new();
        assert!(queue.is_empty());

        queue.push(FlipEvent::Started {
            timeline_id: TimelineId(1),
            targets: vec![ElementId(1)],
        });
        queue.push(FlipEvent::Completed {
            timeline_id: TimelineId(1),
            targets: vec![ElementId(1)],
        });
        queue.push(FlipEvent::Started {
            timeline_id: TimelineId(2),
            targets: vec![ElementId(7)],
        });

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.events_for_element(ElementId(1)).len(), 2);
        assert!(queue.peek().is_some_and(FlipEvent::is_started));

        let first = queue.pop().unwrap();
        assert_eq!(first.timeline_id(), TimelineId(1));

        let rest: Vec<_> = queue.drain().collect();
        assert_eq!(rest.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let event = FlipEvent::Completed {
            timeline_id: TimelineId(9),
            targets: vec![ElementId(3)],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("completed"));
        let parsed: FlipEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
