//! Suite file configuration types
//!
//! A suite is the target description plus the ordered list of expectation
//! records. It is loaded once, validated as a whole, and never mutated;
//! any schema problem fails the run before the first case starts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::browser::Selector;
use crate::common::{Error, Result};

/// One declarative expectation: `item` sits in `group` inside `area` and
/// carries every label in `labels`
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpectationRecord {
    /// Workflow area to navigate into
    #[serde(alias = "module")]
    pub area: String,
    /// Item heading text
    #[serde(alias = "task")]
    pub item: String,
    /// Group heading text
    #[serde(alias = "status")]
    pub group: String,
    /// Labels expected under the item, in display order
    #[serde(alias = "tags")]
    pub labels: Vec<String>,
}

/// A complete suite loaded from a YAML or JSON file
#[derive(Deserialize, Debug)]
pub struct SuiteFile {
    /// Application under test
    #[serde(default)]
    pub target: TargetConfig,
    /// Expectations, one verification case each
    #[serde(alias = "tests")]
    pub records: Vec<ExpectationRecord>,
}

/// Where the application lives and how to log in
#[derive(Deserialize, Debug, Clone)]
pub struct TargetConfig {
    /// Page opened at the start of every case
    #[serde(default = "default_url")]
    pub url: String,
    /// Login form selectors
    #[serde(default)]
    pub selectors: LoginSelectors,
    /// Element that must become visible after logging in
    pub landing: Option<String>,
    /// Where item headings are searched
    #[serde(default)]
    pub item_scope: ItemScope,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            selectors: LoginSelectors::default(),
            landing: None,
            item_scope: ItemScope::default(),
        }
    }
}

fn default_url() -> String {
    "about:blank".to_string()
}

/// CSS selectors of the login form controls
#[derive(Deserialize, Debug, Clone)]
pub struct LoginSelectors {
    #[serde(default = "default_username_selector")]
    pub username: String,
    #[serde(default = "default_password_selector")]
    pub password: String,
    #[serde(default = "default_submit_selector")]
    pub submit: String,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            username: default_username_selector(),
            password: default_password_selector(),
            submit: default_submit_selector(),
        }
    }
}

fn default_username_selector() -> String {
    "#username".to_string()
}
fn default_password_selector() -> String {
    "#password".to_string()
}
fn default_submit_selector() -> String {
    r#"button[type="submit"]"#.to_string()
}

/// Search scope for item headings
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemScope {
    /// Anywhere on the page, regardless of the located group
    #[default]
    Page,
    /// Only inside the located group container
    Group,
}

/// Target with every selector parsed
#[derive(Debug, Clone)]
pub struct Target {
    pub url: String,
    pub username: Selector,
    pub password: Selector,
    pub submit: Selector,
    pub landing: Option<Selector>,
    pub item_scope: ItemScope,
}

impl Target {
    fn compile(config: &TargetConfig) -> Result<Self> {
        Ok(Self {
            url: config.url.clone(),
            username: Selector::css(&config.selectors.username)?,
            password: Selector::css(&config.selectors.password)?,
            submit: Selector::css(&config.selectors.submit)?,
            landing: config.landing.as_deref().map(Selector::css).transpose()?,
            item_scope: config.item_scope,
        })
    }
}

/// Validated suite
#[derive(Debug, Clone)]
pub struct Suite {
    pub target: Target,
    pub records: Vec<ExpectationRecord>,
}

impl Suite {
    /// Load and validate a suite file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read suite '{}': {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Suite '{}': {}", path.display(), strip_prefix(&e))))
    }

    /// Parse and validate suite text (YAML or JSON)
    pub fn parse(content: &str) -> Result<Self> {
        let file: SuiteFile = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse suite: {}", e)))?;
        Self::from_file(file)
    }

    /// Validate an already deserialized suite
    pub fn from_file(file: SuiteFile) -> Result<Self> {
        if file.records.is_empty() {
            return Err(Error::Config("Suite contains no records".to_string()));
        }

        for (index, record) in file.records.iter().enumerate() {
            validate_record(index, record)?;
        }

        Ok(Self {
            target: Target::compile(&file.target)?,
            records: file.records,
        })
    }
}

fn validate_record(index: usize, record: &ExpectationRecord) -> Result<()> {
    let fields = [
        ("area", &record.area),
        ("item", &record.item),
        ("group", &record.group),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(Error::Config(format!(
                "Record {}: field '{}' must not be empty",
                index + 1,
                name
            )));
        }
    }
    if let Some(pos) = record.labels.iter().position(|l| l.trim().is_empty()) {
        return Err(Error::Config(format!(
            "Record {}: label {} must not be empty",
            index + 1,
            pos + 1
        )));
    }
    Ok(())
}

fn strip_prefix(e: &Error) -> String {
    match e {
        Error::Config(msg) => msg.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_suite() {
        let suite = Suite::parse(
            r##"
target:
  url: "http://localhost:3000/"
  landing: "#homeContainer"
records:
  - area: Tasks
    item: Write report
    group: In Progress
    labels: [urgent, review]
"##,
        )
        .unwrap();
        assert_eq!(suite.target.url, "http://localhost:3000/");
        assert!(suite.target.landing.is_some());
        assert_eq!(suite.target.item_scope, ItemScope::Page);
        assert_eq!(
            suite.records[0],
            ExpectationRecord {
                area: "Tasks".into(),
                item: "Write report".into(),
                group: "In Progress".into(),
                labels: vec!["urgent".into(), "review".into()],
            }
        );
    }

    #[test]
    fn test_parse_json_with_legacy_field_names() {
        let suite = Suite::parse(
            r#"{"tests": [
                {"module": "Web Application", "task": "Implement user authentication",
                 "status": "To Do", "tags": ["Feature", "High Priority"]}
            ]}"#,
        )
        .unwrap();
        let record = &suite.records[0];
        assert_eq!(record.area, "Web Application");
        assert_eq!(record.group, "To Do");
        assert_eq!(record.labels.len(), 2);
        assert_eq!(suite.target.url, "about:blank");
        assert_eq!(suite.target.submit.css.as_str(), r#"button[type="submit"]"#);
    }

    #[test]
    fn test_missing_field_is_configuration_error() {
        let err = Suite::parse(
            r#"
records:
  - area: Tasks
    item: Write report
    labels: []
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("group")));
    }

    #[test]
    fn test_wrong_type_is_configuration_error() {
        let err = Suite::parse(
            r#"
records:
  - area: Tasks
    item: Write report
    group: Done
    labels: urgent
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_case_scoped());
    }

    #[test]
    fn test_empty_values_are_rejected() {
        let err = Suite::parse(
            r#"
records:
  - { area: Tasks, item: "A", group: Done, labels: [] }
  - { area: Tasks, item: "  ", group: Done, labels: [] }
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Record 2"));

        let err = Suite::parse(
            r#"
records:
  - { area: Tasks, item: A, group: Done, labels: [ok, ""] }
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("label 2"));
    }

    #[test]
    fn test_empty_suite_is_rejected() {
        assert!(Suite::parse("records: []").is_err());
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let err = Suite::parse(
            r#"
target:
  selectors:
    username: "form > input"
records:
  - { area: Tasks, item: A, group: Done, labels: [] }
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("combinator"));
    }

    #[test]
    fn test_group_item_scope() {
        let suite = Suite::parse(
            r#"
target:
  item_scope: group
records:
  - { area: Tasks, item: A, group: Done, labels: [] }
"#,
        )
        .unwrap();
        assert_eq!(suite.target.item_scope, ItemScope::Group);
    }
}
