//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use serde::Serialize;
use std::env;

/// Output of a command, renderable for humans or as JSON.
pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

/// Print `result` to stdout in the selected mode.
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to at most `max_len` characters, appending "..." if
/// truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// A UTF-8 table with bold headers.
pub fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(if supports_color() {
            presets::UTF8_FULL
        } else {
            presets::ASCII_FULL
        })
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|header| Cell::new(header).add_attribute(Attribute::Bold)),
        );
    table
}

/// Check if styled output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Dune", 10), "Dune");
        assert_eq!(truncate("Children of Dune", 10), "Childre...");
        assert_eq!(truncate("ÉÉÉÉÉÉ", 5), "ÉÉ...");
    }

    #[test]
    fn test_table_headers() {
        let mut table = table(&["Purchase", "Book"]);
        table.add_row(vec!["p1", "Dune"]);
        let rendered = table.to_string();
        assert!(rendered.contains("Purchase"));
        assert!(rendered.contains("Dune"));
    }
}
