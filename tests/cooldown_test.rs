//! Tests for per-source alert rate limiting.

use armitage::cooldown::CooldownTracker;

#[test]
fn fresh_tracker_always_allows() {
    let tracker = CooldownTracker::new(900);
    assert!(tracker.should_alert("radarr"));
    assert!(tracker.should_alert("sonarr"));
    assert_eq!(tracker.suppressed_count("radarr"), 0);
}

#[test]
fn alert_opens_cooldown_window() {
    let tracker = CooldownTracker::new(3600);
    assert!(tracker.should_alert("radarr"));

    tracker.record_alert("radarr");
    assert!(!tracker.should_alert("radarr"));

    // Other sources are unaffected.
    assert!(tracker.should_alert("sonarr"));
}

#[test]
fn elapsed_window_allows_again() {
    // Zero cooldown: the window is over the moment it opens.
    let tracker = CooldownTracker::new(0);
    tracker.record_alert("radarr");
    assert!(tracker.should_alert("radarr"));
}

#[test]
fn suppressions_accumulate_per_source() {
    let tracker = CooldownTracker::new(3600);

    tracker.record_alert("radarr");
    tracker.record_suppressed("radarr");
    tracker.record_suppressed("radarr");

    assert_eq!(tracker.suppressed_count("radarr"), 2);
    assert_eq!(tracker.suppressed_count("sonarr"), 0);
}

#[test]
fn record_alert_resets_suppressed_count() {
    let tracker = CooldownTracker::new(3600);

    tracker.record_alert("radarr");
    tracker.record_suppressed("radarr");
    tracker.record_suppressed("radarr");
    assert_eq!(tracker.suppressed_count("radarr"), 2);

    tracker.record_alert("radarr");
    assert_eq!(tracker.suppressed_count("radarr"), 0);
}

#[test]
fn suppression_for_unseen_source_is_inert() {
    // The dispatcher never suppresses before a first alert; if it did, the
    // count must not appear out of nowhere.
    let tracker = CooldownTracker::new(3600);
    tracker.record_suppressed("ghost");
    assert_eq!(tracker.suppressed_count("ghost"), 0);
    assert!(tracker.should_alert("ghost"));
}

#[test]
fn snapshot_lists_sources_sorted() {
    let tracker = CooldownTracker::new(3600);
    tracker.record_alert("sonarr");
    tracker.record_alert("radarr");
    tracker.record_suppressed("sonarr");

    let snapshot = tracker.snapshot();
    let names: Vec<&str> = snapshot.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["radarr", "sonarr"]);

    let sonarr = &snapshot[1].1;
    assert_eq!(sonarr.suppressed, 1);
}
