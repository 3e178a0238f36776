//! Environment variable parsing helpers shared by backend configurations.
//!
//! Every helper returns `None` when the variable is unset so callers can keep
//! their defaults.

use std::time::Duration;

/// Read a string variable.
#[must_use]
pub fn string(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Read a boolean variable, accepting `"1"` and `"true"` (case-insensitive).
#[must_use]
pub fn boolean(name: &str) -> Option<bool> {
    string(name).map(|v| parse_bool(&v))
}

/// Read an unsigned integer variable. Unparsable values are ignored.
#[must_use]
pub fn number(name: &str) -> Option<u64> {
    string(name).and_then(|v| v.trim().parse().ok())
}

/// Read a duration given in whole seconds.
#[must_use]
pub fn seconds(name: &str) -> Option<Duration> {
    number(name).map(Duration::from_secs)
}

/// Read a comma-separated list variable.
#[must_use]
pub fn list(name: &str) -> Option<Vec<String>> {
    string(name).map(|v| parse_list(&v))
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
///
/// # Examples
///
/// ```
/// use imgstore_core::env::parse_bool;
///
/// assert!(parse_bool("TRUE"));
/// assert!(!parse_bool("no"));
/// ```
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
///
/// # Examples
///
/// ```
/// use imgstore_core::env::parse_list;
///
/// assert_eq!(parse_list(" a, b ,,c"), vec!["a", "b", "c"]);
/// ```
#[must_use]
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
