use std::collections::HashSet;

use crate::models::{name_key, NewDiscovery};

/// Drop candidates already recorded for the source or already seen earlier in
/// this batch. Names compare case-insensitively; first occurrence wins.
pub fn deduplicate<'a>(
    candidates: Vec<NewDiscovery>,
    existing_names: impl IntoIterator<Item = &'a str>,
) -> Vec<NewDiscovery> {
    let mut seen: HashSet<String> = existing_names.into_iter().map(name_key).collect();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.name_key()))
        .collect()
}
