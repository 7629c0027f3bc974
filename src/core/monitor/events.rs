// src/core/monitor/events.rs

//! The append-only event journal (spec.md §4.5). One event is appended per
//! *committed* transition decision, never per `node_active` call — this is
//! what makes P6 ("exactly one event per real transition") hold.

use super::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Retention cap per (formation, group) event log. The original stores
/// events in a Postgres table, naturally bounded by disk; this in-process
/// store needs an explicit cap instead (see SPEC_FULL.md §4.5 / DESIGN.md).
const MAX_EVENTS_PER_GROUP: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Milliseconds since the Unix epoch, stamped by the caller (the FSM and
    /// decision engine never call `SystemTime::now()` directly, to keep
    /// their functions pure and testable).
    pub timestamp_ms: u64,
    pub formation: String,
    pub group_id: i32,
    pub node_id: NodeId,
    pub prev_state: String,
    pub new_state: String,
    pub description: String,
}

/// Append-only log for a single group, capped at `MAX_EVENTS_PER_GROUP`.
#[derive(Debug, Default)]
pub struct EventLog {
    events: VecDeque<Event>,
}

impl EventLog {
    pub fn push(&mut self, event: Event) {
        if self.events.len() >= MAX_EVENTS_PER_GROUP {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// The last `count` events, most recent last.
    pub fn tail(&self, count: usize) -> Vec<Event> {
        let len = self.events.len();
        let skip = len.saturating_sub(count);
        self.events.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(n: u64) -> Event {
        Event {
            timestamp_ms: n,
            formation: "default".into(),
            group_id: 0,
            node_id: 1,
            prev_state: "Init".into(),
            new_state: "Single".into(),
            description: format!("event {n}"),
        }
    }

    #[test]
    fn caps_retention() {
        let mut log = EventLog::default();
        for i in 0..(MAX_EVENTS_PER_GROUP as u64 + 10) {
            log.push(ev(i));
        }
        let tail = log.tail(1000);
        assert_eq!(tail.len(), MAX_EVENTS_PER_GROUP);
        assert_eq!(tail.first().unwrap().timestamp_ms, 10);
    }

    #[test]
    fn tail_returns_most_recent_in_order() {
        let mut log = EventLog::default();
        for i in 0..5 {
            log.push(ev(i));
        }
        let tail = log.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].timestamp_ms, 3);
        assert_eq!(tail[1].timestamp_ms, 4);
    }
}
