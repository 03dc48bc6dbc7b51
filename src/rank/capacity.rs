//! Greedy day-capacity selection over scored, timed events.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::event::Event;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityLimits {
    /// Accepted events per calendar day (by start date).
    pub max_per_day: usize,
    /// Accepted events active at the same instant.
    pub max_parallel: usize,
}

impl Default for CapacityLimits {
    fn default() -> Self {
        Self {
            max_per_day: 5,
            max_parallel: 3,
        }
    }
}

/// Score descending, then start ascending. Stable, so full ties keep input order.
pub fn priority_order(a: &Event, b: &Event) -> Ordering {
    let sa = a.score.unwrap_or(0.0);
    let sb = b.score.unwrap_or(0.0);
    sb.total_cmp(&sa).then_with(|| a.start().cmp(&b.start()))
}

/// Walk candidates in priority order and accept each one iff its day has
/// room and fewer than `max_parallel` accepted events overlap it. Rejected
/// events are not reconsidered. Output is in acceptance order.
pub fn select_by_capacity(mut events: Vec<Event>, limits: CapacityLimits) -> Vec<Event> {
    events.sort_by(priority_order);

    let mut by_day: HashMap<NaiveDate, Vec<usize>> = HashMap::new();
    let mut accepted: Vec<Event> = Vec::new();

    for ev in events {
        let day = by_day.entry(ev.start_date()).or_default();
        if day.len() >= limits.max_per_day {
            tracing::trace!(target: "rank", title = %ev.title, "day full");
            continue;
        }
        let overlapping = day.iter().filter(|&&i| accepted[i].overlaps(&ev)).count();
        if overlapping >= limits.max_parallel {
            tracing::trace!(target: "rank", title = %ev.title, overlapping, "slot full");
            continue;
        }
        day.push(accepted.len());
        accepted.push(ev);
    }
    accepted
}
