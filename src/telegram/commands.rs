//! Telegram slash command handlers.
//!
//! Each function handles a specific command and returns an HTML-formatted
//! response string. Commands only read accumulated state; nothing here
//! mutates the pipeline.

use chrono::Utc;

use crate::compose::format_uptime;
use crate::cooldown::CooldownTracker;
use crate::events::uptime_from;
use crate::registry::ContainerRegistry;
use crate::telegram::ui::escape_html;

/// List all available commands.
pub fn handle_help() -> String {
    [
        "<b>Available commands:</b>",
        "",
        "/help \u{2014} show this message",
        "/status \u{2014} container status, health, and uptime",
        "/errors \u{2014} per-container error alerts and suppressed counts",
    ]
    .join("\n")
}

/// Show the current container registry snapshot.
pub async fn handle_status(registry: &ContainerRegistry) -> String {
    let records = registry.snapshot().await;
    if records.is_empty() {
        return "No containers observed yet.".to_owned();
    }

    let mut lines = vec![format!("<b>Containers ({}):</b>", records.len())];
    for record in &records {
        let icon = status_icon(&record.status, record.health.as_deref());
        let mut line = format!(
            "{icon} <code>{name}</code> {status}",
            name = escape_html(&record.name),
            status = escape_html(&record.status),
        );

        if let Some(ref health) = record.health {
            line.push_str(&format!(" ({})", escape_html(health)));
        }

        if let Some(uptime) = record.started_at.and_then(uptime_from) {
            line.push_str(&format!(", up {}", format_uptime(uptime)));
        }

        if let Some(ref image) = record.image {
            line.push_str(&format!(", image <code>{}</code>", escape_html(image)));
        }

        lines.push(line);
    }
    lines.join("\n")
}

/// Show per-container cooldown state: last alert age and suppressed count.
pub fn handle_errors(cooldowns: &CooldownTracker) -> String {
    let entries = cooldowns.snapshot();
    if entries.is_empty() {
        return "No error alerts recorded.".to_owned();
    }

    let mut lines = vec![format!("<b>Error alerts ({}):</b>", entries.len())];
    for (name, state) in &entries {
        let age_secs = Utc::now()
            .signed_duration_since(state.last_alert)
            .num_seconds()
            .max(0);
        let age = format_uptime(u64::try_from(age_secs).unwrap_or(0));
        lines.push(format!(
            "<code>{name}</code> \u{2014} last alert {age} ago, {suppressed} suppressed since",
            name = escape_html(name),
            suppressed = state.suppressed,
        ));
    }
    lines.join("\n")
}

/// Pick a scannable status icon for one container.
fn status_icon(status: &str, health: Option<&str>) -> &'static str {
    if health == Some("unhealthy") {
        return "\u{26a0}\u{fe0f}";
    }
    match status {
        "running" => "\u{2705}",
        "exited" | "dead" => "\u{274c}",
        _ => "\u{26aa}",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhealthy_overrides_running() {
        assert_eq!(status_icon("running", Some("unhealthy")), "\u{26a0}\u{fe0f}");
        assert_eq!(status_icon("running", Some("healthy")), "\u{2705}");
        assert_eq!(status_icon("exited", None), "\u{274c}");
    }
}
