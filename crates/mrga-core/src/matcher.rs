//! Station Matcher: map the assistant's recommended names onto catalog entries.

use std::collections::HashSet;
use std::sync::Arc;

use mrga_proto::protocol::{Station, RECOMMENDATION_SENTINEL};

/// Split a finished reply into the visible message and the recommended names.
///
/// Only the text between the first sentinel and a possible second one is read
/// as the list.  No sentinel means no recommendations.
pub fn split_reply(full_text: &str) -> (String, Vec<String>) {
    let mut parts = full_text.split(RECOMMENDATION_SENTINEL);
    let message = parts.next().unwrap_or_default().trim().to_string();
    let names = parts.next().map(parse_names).unwrap_or_default();
    (message, names)
}

/// Comma-separated list → trimmed, non-empty names.
pub fn parse_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Stations whose name contains a recommended name, or is contained by one
/// (case-insensitive).  Result is in catalog order with each station at most
/// once; an empty result is a normal outcome.
pub fn match_stations<S: AsRef<str>>(
    recommended: &[S],
    catalog: &[Arc<Station>],
) -> Vec<Arc<Station>> {
    let wanted: Vec<String> = recommended
        .iter()
        .map(|name| name.as_ref().trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect();
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    catalog
        .iter()
        .filter(|station| {
            let name = station.name.to_lowercase();
            !name.is_empty()
                && wanted
                    .iter()
                    .any(|w| name.contains(w.as_str()) || w.contains(name.as_str()))
        })
        .filter(|station| seen.insert(station.id))
        .cloned()
        .collect()
}
