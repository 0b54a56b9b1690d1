//! ui-verify - a data-driven UI verification harness
//!
//! A suite of expectation records (`area`, `item`, `group`, `labels`) is
//! turned into independent verification cases. Each case logs into the
//! target application in its own browser session, enters the area and
//! checks that the group, the item and every label are visible.

pub mod browser;
pub mod cli;
pub mod commands;
pub mod common;
pub mod credentials;
pub mod verify;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use credentials::Credentials;
pub use verify::{CaseResult, ExpectationRecord, Outcome, RunReport, Suite};
