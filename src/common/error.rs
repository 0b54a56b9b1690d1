//! Error types for the verification harness
//!
//! Errors fall into two groups. Configuration errors are fatal to the whole
//! run and surface before any case starts. Everything else is scoped to the
//! case that raised it and ends up as a diagnostic on that case.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Locator Errors ===
    #[error("No visible element matching '{selector}' appeared within the wait window")]
    ElementNotFound { selector: String },

    #[error("No visible element matching '{selector}' with text '{expected}'")]
    LocatorNotFound { selector: String, expected: String },

    #[error("Label '{label}' not found under item '{item}'")]
    LabelMismatch { label: String, item: String },

    // === Timeout Errors ===
    #[error("Browser operation timed out after {0} ms")]
    Timeout(u64),

    // === Browser Session Errors ===
    #[error("Element {0} is not interactable")]
    NotInteractable(String),

    #[error("Element handle '{0}' does not refer to an element in this session")]
    StaleElement(String),

    #[error("Failed to start browser session: {0}")]
    SessionStart(String),

    #[error("WebDriver command '{command}' failed: {message}")]
    WebDriver { command: String, message: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a locator not found error
    pub fn locator_not_found(selector: impl ToString, expected: &str) -> Self {
        Self::LocatorNotFound {
            selector: selector.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Create a label mismatch error
    pub fn label_mismatch(label: &str, item: &str) -> Self {
        Self::LabelMismatch {
            label: label.to_string(),
            item: item.to_string(),
        }
    }

    /// Create a WebDriver command error
    pub fn webdriver(command: &str, message: impl Into<String>) -> Self {
        Self::WebDriver {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error is local to one verification case.
    ///
    /// Configuration errors are the only ones that abort a whole run.
    pub fn is_case_scoped(&self) -> bool {
        !matches!(
            self,
            Error::Config(_) | Error::ConfigParse(_) | Error::FileRead { .. }
        )
    }
}
