//! HTML formatting helpers for Telegram messages.
//!
//! All output uses HTML parse mode (never MarkdownV2) per project convention.

/// Escape special HTML characters in user-provided text.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_specials() {
        assert_eq!(
            escape_html("<tag> & \"quote\""),
            "&lt;tag&gt; &amp; \"quote\""
        );
    }
}
