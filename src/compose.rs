//! Alert message composition.
//!
//! Pure formatting, no side effects. All output uses HTML parse mode per
//! project convention; the dispatcher and the slash-command layer share
//! these functions so manual "show me" output matches delivered alerts.

use crate::telegram::ui::escape_html;

/// Maximum characters of a log line surfaced in an alert message.
const MAX_LINE_CHARS: usize = 200;

/// Explanatory annotation for well-known POSIX-style exit codes.
pub fn describe_exit_code(code: i64) -> Option<&'static str> {
    match code {
        137 => Some("OOM killed"),
        139 => Some("segmentation fault"),
        143 => Some("terminated by SIGTERM"),
        _ => None,
    }
}

/// Render an uptime in seconds as `"{h}h {m}m"`, or `"{m}m"` under an hour.
pub fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Compose a crash alert for a container that exited with a non-zero code.
///
/// Surfaces the container name, the exit code (annotated for well-known
/// codes), the image, and the uptime. Unknown uptime is rendered explicitly
/// rather than omitted.
pub fn compose_crash(
    name: &str,
    exit_code: i64,
    image: Option<&str>,
    uptime_secs: Option<u64>,
) -> String {
    let exit_line = match describe_exit_code(exit_code) {
        Some(annotation) => format!("Exit code: {exit_code} ({annotation})"),
        None => format!("Exit code: {exit_code}"),
    };

    let uptime = match uptime_secs {
        Some(secs) => format_uptime(secs),
        None => "unknown".to_owned(),
    };

    format!(
        "\u{1f534} <b>CRASHED</b>: <code>{name}</code>\n\
         {exit_line}\n\
         Image: <code>{image}</code>\n\
         Uptime: {uptime}",
        name = escape_html(name),
        image = escape_html(image.unwrap_or("unknown")),
    )
}

/// Compose a log-error alert.
///
/// `suppressed_count` is the number of matching lines swallowed by the
/// cooldown since the last alert; the message reports the total occurrence
/// count (`suppressed_count + 1`) and the cooldown window it was gathered
/// over. The offending line is truncated to keep messages transport-safe.
pub fn compose_log_error(
    name: &str,
    line: &str,
    suppressed_count: u64,
    cooldown_secs: u64,
) -> String {
    let total = suppressed_count.saturating_add(1);

    let occurrence = if total > 1 {
        format!(
            "{total} occurrences in the last {window}",
            window = format_uptime(cooldown_secs),
        )
    } else {
        "new error".to_owned()
    };

    format!(
        "\u{26a0}\u{fe0f} <b>Log error</b>: <code>{name}</code> ({occurrence})\n\
         <pre>{line}</pre>",
        name = escape_html(name),
        line = escape_html(&truncate_line(line)),
    )
}

/// Truncate a log line to [`MAX_LINE_CHARS`] characters, appending a
/// trailing ellipsis when anything was cut.
fn truncate_line(line: &str) -> String {
    if line.chars().count() <= MAX_LINE_CHARS {
        return line.to_owned();
    }
    let truncated: String = line.chars().take(MAX_LINE_CHARS).collect();
    format!("{truncated}...")
}
