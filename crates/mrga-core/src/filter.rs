//! Station filter: the step that turns the catalog into the ordered collection
//! the list loader paginates.

use std::collections::BTreeSet;
use std::sync::Arc;

use mrga_proto::protocol::{FilterCriteria, Station};

/// True when `station` satisfies every part of `criteria`.
pub fn station_matches(station: &Station, criteria: &FilterCriteria) -> bool {
    if let Some(genre) = criteria.genre.as_deref() {
        if station.genre != genre {
            return false;
        }
    }
    if let Some(country) = criteria.country.as_deref() {
        if station.country != country {
            return false;
        }
    }
    let query = criteria.query.trim();
    query.is_empty() || text_matches(station, &query.to_lowercase())
}

fn text_matches(station: &Station, q: &str) -> bool {
    let contains = |s: &str| s.to_lowercase().contains(q);
    let contains_opt = |s: &Option<String>| s.as_deref().is_some_and(contains);

    contains(&station.name)
        || contains_opt(&station.description)
        || contains_opt(&station.city)
        || contains(&station.country)
        || contains(&station.genre)
        || contains(&station.language)
        || contains_opt(&station.frequency)
        || station.tags.iter().any(|tag| contains(tag))
}

/// Apply `criteria` to the catalog, keeping catalog order.
pub fn apply(criteria: &FilterCriteria, catalog: &[Arc<Station>]) -> Vec<Arc<Station>> {
    if criteria.is_empty() {
        return catalog.to_vec();
    }
    catalog
        .iter()
        .filter(|s| station_matches(s, criteria))
        .cloned()
        .collect()
}

/// Sorted, de-duplicated genres for the genre picker.
pub fn genres(catalog: &[Arc<Station>]) -> Vec<String> {
    facet(catalog, |s| &s.genre)
}

/// Sorted, de-duplicated countries for the country picker.
pub fn countries(catalog: &[Arc<Station>]) -> Vec<String> {
    facet(catalog, |s| &s.country)
}

fn facet(catalog: &[Arc<Station>], key: impl Fn(&Station) -> &String) -> Vec<String> {
    catalog
        .iter()
        .map(|s| key(s))
        .filter(|v| !v.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
