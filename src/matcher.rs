//! Error-pattern matching for log lines.
//!
//! Deliberately plain substring matching. Operators put ordinary words into
//! the config file, so no regex semantics are involved and a typo'd pattern
//! can never take the watcher down.

/// Decide whether a log line is an alert-worthy error.
///
/// Matching is case-insensitive substring containment against the
/// lower-cased line. Ignore patterns take precedence: a line containing any
/// ignore pattern never matches, regardless of the error patterns. An empty
/// error list matches nothing; an empty ignore list excludes nothing.
pub fn line_matches(line: &str, error_patterns: &[String], ignore_patterns: &[String]) -> bool {
    let lowered = line.to_lowercase();

    let contains = |pattern: &String| {
        let trimmed = pattern.trim();
        !trimmed.is_empty() && lowered.contains(&trimmed.to_lowercase())
    };

    if ignore_patterns.iter().any(contains) {
        return false;
    }

    error_patterns.iter().any(contains)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_owned()).collect()
    }

    #[test]
    fn matching_is_case_insensitive() {
        let errors = patterns(&["error"]);
        assert!(line_matches("ERROR: disk full", &errors, &[]));
        assert!(line_matches("error: disk full", &errors, &[]));
        assert!(line_matches("An Error occurred", &errors, &[]));
    }

    #[test]
    fn ignore_patterns_take_precedence() {
        let errors = patterns(&["error"]);
        let ignores = patterns(&["DEBUG"]);
        assert!(!line_matches("DEBUG error in retry loop", &errors, &ignores));
        assert!(line_matches("WARN error in retry loop", &errors, &ignores));
    }

    #[test]
    fn empty_lists_are_inert() {
        assert!(!line_matches("error: anything", &[], &[]));
        assert!(!line_matches(
            "error: anything",
            &[],
            &patterns(&["error"])
        ));
    }

    #[test]
    fn blank_patterns_are_skipped() {
        let errors = patterns(&["", "  "]);
        assert!(!line_matches("perfectly fine line", &errors, &[]));
    }
}
