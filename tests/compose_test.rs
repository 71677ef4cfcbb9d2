//! Tests for alert message composition.

use armitage::compose::{compose_crash, compose_log_error, describe_exit_code, format_uptime};

// ---------------------------------------------------------------------------
// Uptime formatting
// ---------------------------------------------------------------------------

#[test]
fn uptime_over_an_hour_shows_hours_and_minutes() {
    assert_eq!(format_uptime(9240), "2h 34m");
    assert_eq!(format_uptime(3600), "1h 0m");
}

#[test]
fn uptime_under_an_hour_shows_minutes_only() {
    assert_eq!(format_uptime(2700), "45m");
    assert_eq!(format_uptime(59), "0m");
}

// ---------------------------------------------------------------------------
// Exit code annotations
// ---------------------------------------------------------------------------

#[test]
fn well_known_exit_codes_are_annotated() {
    assert_eq!(describe_exit_code(137), Some("OOM killed"));
    assert_eq!(describe_exit_code(139), Some("segmentation fault"));
    assert_eq!(describe_exit_code(143), Some("terminated by SIGTERM"));
    assert_eq!(describe_exit_code(1), None);
}

// ---------------------------------------------------------------------------
// Crash messages
// ---------------------------------------------------------------------------

#[test]
fn crash_message_surfaces_all_details() {
    let text = compose_crash("radarr", 137, Some("x:latest"), Some(9240));
    assert!(text.contains("CRASHED"));
    assert!(text.contains("radarr"));
    assert!(text.contains("137"));
    assert!(text.contains("OOM killed"));
    assert!(text.contains("x:latest"));
    assert!(text.contains("2h 34m"));
}

#[test]
fn crash_message_with_unknown_code_has_no_annotation() {
    let text = compose_crash("radarr", 5, Some("x:latest"), Some(60));
    assert!(text.contains("Exit code: 5"));
    assert!(!text.contains('('));
}

#[test]
fn crash_message_renders_unknown_uptime_explicitly() {
    let text = compose_crash("radarr", 143, None, None);
    assert!(text.contains("Uptime: unknown"));
    assert!(text.contains("Image: <code>unknown</code>"));
}

#[test]
fn crash_message_escapes_html_in_names() {
    let text = compose_crash("bad<name>", 1, Some("img&co"), None);
    assert!(text.contains("bad&lt;name&gt;"));
    assert!(text.contains("img&amp;co"));
}

// ---------------------------------------------------------------------------
// Log-error messages
// ---------------------------------------------------------------------------

#[test]
fn first_occurrence_reads_as_new_error() {
    let text = compose_log_error("radarr", "ERROR: boom", 0, 900);
    assert!(text.contains("new error"));
    assert!(text.contains("radarr"));
    assert!(text.contains("ERROR: boom"));
}

#[test]
fn repeat_occurrences_state_total_and_window() {
    let text = compose_log_error("radarr", "ERROR: boom", 5, 900);
    assert!(text.contains("6 occurrences"));
    assert!(text.contains("15m"));
    assert!(!text.contains("new error"));
}

#[test]
fn long_lines_are_truncated_with_ellipsis() {
    let line = "x".repeat(250);
    let text = compose_log_error("radarr", &line, 0, 900);
    assert!(text.contains(&format!("{}...", "x".repeat(200))));
    assert!(!text.contains(&"x".repeat(201)));
}

#[test]
fn log_error_escapes_html_in_line() {
    let text = compose_log_error("radarr", "<script>alert(1)</script>", 0, 900);
    assert!(text.contains("&lt;script&gt;"));
    assert!(!text.contains("<script>"));
}
