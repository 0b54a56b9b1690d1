//! Common utilities shared by the CLI and the verification engine

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use config::{Config, WaitPolicy};
pub use error::{Error, Result};

/// Normalize visible text for comparison.
///
/// Trims the ends and collapses internal whitespace runs to a single space,
/// the way rendered text reads on screen.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  In   Progress \n"), "In Progress");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("urgent"), "urgent");
    }
}
