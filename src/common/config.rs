//! Runner configuration file handling
//!
//! The runner configuration covers how cases are executed (wait windows,
//! worker count, WebDriver endpoint). What is verified lives in the suite
//! file, see [`crate::verify::suite`].

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Case scheduling settings
    #[serde(default)]
    pub run: RunConfig,

    /// WebDriver endpoint settings
    #[serde(default)]
    pub webdriver: WebDriverConfig,
}

/// Timeout settings in milliseconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// How long to wait for an element to become visible
    #[serde(default = "default_wait")]
    pub wait_ms: u64,

    /// Interval between element queries while waiting
    #[serde(default = "default_poll")]
    pub poll_ms: u64,

    /// Upper bound for any single browser call
    #[serde(default = "default_action")]
    pub action_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            wait_ms: default_wait(),
            poll_ms: default_poll(),
            action_ms: default_action(),
        }
    }
}

fn default_wait() -> u64 {
    5_000
}
fn default_poll() -> u64 {
    100
}
fn default_action() -> u64 {
    10_000
}

impl Timeouts {
    /// Wait policy derived from these settings
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            timeout: Duration::from_millis(self.wait_ms),
            poll: Duration::from_millis(self.poll_ms.max(1)),
            action: Duration::from_millis(self.action_ms),
        }
    }
}

/// Bounded wait applied at every suspension point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Total time an element lookup may take
    pub timeout: Duration,
    /// Sleep between lookups
    pub poll: Duration,
    /// Bound on each individual session call
    pub action: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Timeouts::default().wait_policy()
    }
}

/// Case scheduling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    /// Maximum number of cases running at once
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    4
}

/// Browser driven through WebDriver
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Firefox,
}

/// WebDriver endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WebDriverConfig {
    /// Base URL of the WebDriver server (chromedriver, geckodriver, selenium)
    #[serde(default = "default_webdriver_url")]
    pub url: String,

    /// Browser to request in the new-session capabilities
    #[serde(default)]
    pub browser: BrowserKind,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: default_webdriver_url(),
            browser: BrowserKind::default(),
            headless: default_headless(),
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
