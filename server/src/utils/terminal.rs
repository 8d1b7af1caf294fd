//! Terminal output helpers

/// Render a URL cyan, as an OSC 8 hyperlink when stdout supports it
pub fn terminal_link(url: &str) -> String {
    if supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout) {
        format!("\x1b]8;;{}\x07\x1b[36m{}\x1b[0m\x1b]8;;\x07", url, url)
    } else {
        format!("\x1b[36m{}\x1b[0m", url)
    }
}

/// Banner row: colored arrow, bold padded label, value
pub fn banner_row(arrow_color: u8, label: &str, value: &str) -> String {
    format!(
        "  \x1b[{}m➜\x1b[0m  \x1b[1m{:<14}\x1b[0m {}",
        arrow_color, label, value
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_link_contains_url_and_color() {
        let url = "http://localhost:18630/api/v1/stats/bots";
        let result = terminal_link(url);
        assert!(result.contains(url));
        assert!(result.contains("\x1b[36m"));
        assert!(result.ends_with("\x1b[0m") || result.ends_with("\x1b]8;;\x07"));
    }

    #[test]
    fn test_banner_row_pads_label() {
        let row = banner_row(32, "Ingest:", "ws://localhost:18630/");
        assert!(row.contains("Ingest:       "));
        assert!(row.contains("\x1b[32m➜"));
        assert!(row.ends_with("ws://localhost:18630/"));
    }
}
