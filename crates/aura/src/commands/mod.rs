//! Command implementations for the aura CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod context;
pub mod conversation;
pub mod knowledge;
pub mod project;
pub mod search;
pub mod snapshot;
pub mod verify;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use aura_core::Database;
use aura_sdk::Aura;
use serde::Serialize;

/// Flags shared by every command
pub struct Globals<'a> {
    pub aura: &'a Aura,
    pub user: &'a str,
    pub json: bool,
}

impl Globals<'_> {
    /// The local SQLite store, for admin commands
    pub fn database(&self) -> Result<&Arc<Database>> {
        self.aura.database().context("No local database configured")
    }
}

/// Pretty-print a value as JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// First `max_chars` characters of `text` on one line, with an ellipsis when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

/// Short form of an id for display
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 20), "short");
        assert_eq!(preview("multi\n  line\ttext", 40), "multi line text");
        assert_eq!(preview("kinetic typography brand world", 12), "kinetic t...");
        assert_eq!(preview("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
