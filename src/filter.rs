//! In-memory narrowing of fetched event and community lists.
//!
//! Everything here is pure and keeps input order. Events whose time label
//! cannot be parsed never match a time-of-day filter; they still match
//! queries that leave `time_of_day` unset.

use std::collections::HashSet;

use tracing::trace;

use crate::models::{set, CommunityFilter, CommunityRecord, EventRecord, FilterSpec};
use crate::time_label::parse_time_label;

pub fn filter_events(events: &[EventRecord], spec: &FilterSpec) -> Vec<EventRecord> {
    if spec.is_empty() {
        return events.to_vec();
    }
    events
        .iter()
        .filter(|event| event_matches(event, spec))
        .cloned()
        .collect()
}

pub fn event_matches(event: &EventRecord, spec: &FilterSpec) -> bool {
    if let Some(search) = set(&spec.search) {
        let needle = search.to_lowercase();
        let in_name = event.name.to_lowercase().contains(&needle);
        if !in_name && !event.description_text().to_lowercase().contains(&needle) {
            return false;
        }
    }

    if let Some(location) = set(&spec.location) {
        if event.location != location {
            return false;
        }
    }

    if let Some(date) = set(&spec.date) {
        if event.date != date {
            return false;
        }
    }

    if let Some(kind) = set(&spec.event_type) {
        if event.category != kind {
            return false;
        }
    }

    if spec.min_price.is_some() || spec.max_price.is_some() {
        let Some(price) = event.price else {
            return false;
        };
        if spec.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if spec.max_price.is_some_and(|max| price > max) {
            return false;
        }
    }

    if let Some(bucket) = spec.time_of_day {
        match parse_time_label(&event.time) {
            Ok(hour) => {
                if !bucket.contains(hour) {
                    return false;
                }
            }
            Err(err) => {
                trace!(event_id = event.id, error = %err, "excluding event from time filter");
                return false;
            }
        }
    }

    true
}

/// Locations in first-seen order, without repeats.
pub fn distinct_locations(events: &[EventRecord]) -> Vec<String> {
    first_seen(events.iter().map(|event| event.location.as_str()))
}

pub fn filter_communities(
    communities: &[CommunityRecord],
    filter: &CommunityFilter,
) -> Vec<CommunityRecord> {
    let needle = set(&filter.search).map(str::to_lowercase);
    communities
        .iter()
        .filter(|community| {
            let matches_search = match &needle {
                Some(needle) => {
                    community.name.to_lowercase().contains(needle)
                        || community
                            .description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(needle))
                }
                None => true,
            };
            let matches_interests = filter.interests.is_empty()
                || filter
                    .interests
                    .iter()
                    .any(|wanted| community.interests.contains(wanted));
            matches_search && matches_interests
        })
        .cloned()
        .collect()
}

pub fn distinct_interests(communities: &[CommunityRecord]) -> Vec<String> {
    first_seen(
        communities
            .iter()
            .flat_map(|community| community.interests.iter().map(String::as_str)),
    )
}

fn first_seen<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        if seen.insert(value) {
            out.push(value.to_string());
        }
    }
    out
}
