//! Object name patterns.
//!
//! A pattern list is a comma-separated string such as `APP*,DEV*,!SYSTEM*`.
//! A pattern is either an exact name or a prefix ending in a single `*`.
//! Queue pattern lists may also negate a pattern with a leading `!`.
//!
//! Filtering rules:
//! - only positive patterns: nothing is selected unless a pattern matches
//! - only negative patterns: everything is selected unless a pattern matches
//! - mixed: negative patterns are removed first, then the remaining names
//!   are filtered with the positive patterns. `S*,!SYSTEM*` keeps `S.1`, and
//!   `!DEV*,DEV.QUEUE.1` does not select `DEV.QUEUE.1`.

use std::fs;
use std::path::Path;

use crate::error::PatternError;

/// Splits a pattern list into trimmed, non-empty patterns.
pub fn split_patterns(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|p| !p.is_empty())
}

/// Checks that `*` only appears once, as the last character.
pub fn verify_patterns(list: &str) -> Result<(), PatternError> {
    verify_object_patterns(list, false)
}

/// Like [`verify_patterns`], additionally allowing one leading `!`.
pub fn verify_queue_patterns(list: &str) -> Result<(), PatternError> {
    verify_object_patterns(list, true)
}

fn verify_object_patterns(list: &str, allow_negation: bool) -> Result<(), PatternError> {
    for pattern in split_patterns(list) {
        if !valid_wildcard(pattern) {
            return Err(PatternError::Wildcard(pattern.to_string()));
        }
        if allow_negation {
            let bangs = pattern.matches('!').count();
            if bangs > 1 || (bangs == 1 && !pattern.starts_with('!')) {
                return Err(PatternError::Negation(pattern.to_string()));
            }
        }
    }
    Ok(())
}

pub(crate) fn valid_wildcard(pattern: &str) -> bool {
    match pattern.matches('*').count() {
        0 => true,
        1 => pattern.ends_with('*'),
        _ => false,
    }
}

/// Whether `name` matches a single positive pattern.
pub fn pattern_match(name: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}

/// Selects the candidates allowed by a pattern list, keeping their order.
///
/// Candidates are trimmed and empty ones skipped. An empty pattern list
/// selects nothing.
pub fn filter_patterns<S: AsRef<str>>(list: &str, candidates: &[S]) -> Vec<String> {
    let (excludes, includes): (Vec<&str>, Vec<&str>) =
        split_patterns(list).partition(|p| p.starts_with('!'));
    let excludes: Vec<&str> = excludes
        .into_iter()
        .map(|p| p.trim_start_matches('!'))
        .collect();

    let names: Vec<&str> = candidates
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .collect();

    filter_names(&includes, &excludes, &names)
}

fn filter_names(includes: &[&str], excludes: &[&str], names: &[&str]) -> Vec<String> {
    if includes.is_empty() && excludes.is_empty() {
        return Vec::new();
    }

    if excludes.is_empty() {
        return names
            .iter()
            .filter(|n| includes.iter().any(|p| pattern_match(n, p)))
            .map(|n| n.to_string())
            .collect();
    }

    let kept: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| !excludes.iter().any(|p| pattern_match(n, p)))
        .collect();

    if includes.is_empty() {
        kept.into_iter().map(String::from).collect()
    } else {
        filter_names(includes, &[], &kept)
    }
}

/// Reads a pattern file, one pattern per line, into a pattern list.
pub fn read_patterns(path: impl AsRef<Path>) -> Result<String, PatternError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| PatternError::File {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content.lines().collect::<Vec<_>>().join(","))
}
