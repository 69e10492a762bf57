// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Attribute-name wildcard matching (used by the CLI, not the core): `*`
//! matches any substring; one leading `*`, one trailing `*`, both, or
//! neither — no regex, no `*` in the middle.

/// Matches `name` against `pattern`. A `pattern` with no `*` requires an
/// exact match. `"*"` alone matches everything.
pub fn matches(pattern: &str, name: &str) -> bool {
    let leading = pattern.starts_with('*');
    let trailing = pattern.ends_with('*');
    let core = pattern.trim_start_matches('*').trim_end_matches('*');

    match (leading, trailing) {
        (false, false) => pattern == name,
        (true, true) => core.is_empty() || name.contains(core),
        (true, false) => name.ends_with(core),
        (false, true) => name.starts_with(core),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_with_no_wildcard() {
        assert!(matches("raw", "raw"));
        assert!(!matches("raw", "scale"));
    }

    #[test]
    fn leading_wildcard_matches_suffix() {
        assert!(matches("*frequency", "sampling_frequency"));
        assert!(!matches("*frequency", "frequency_available"));
    }

    #[test]
    fn trailing_wildcard_matches_prefix() {
        assert!(matches("sampling*", "sampling_frequency"));
        assert!(!matches("sampling*", "oversampling_ratio"));
    }

    #[test]
    fn both_wildcards_matches_substring() {
        assert!(matches("*freq*", "sampling_frequency_available"));
        assert!(!matches("*freq*", "raw"));
    }

    #[test]
    fn bare_star_matches_everything() {
        assert!(matches("*", "anything"));
        assert!(matches("*", ""));
    }
}
