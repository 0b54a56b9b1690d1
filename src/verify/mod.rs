//! Data-driven UI verification
//!
//! Turns a suite of expectation records into isolated verification cases
//! and runs them against a [`SessionFactory`](crate::browser::SessionFactory).

pub mod engine;
pub mod generator;
pub mod locator;
pub mod navigation;
pub mod suite;

pub use engine::{
    run_case, CaseContext, CaseResult, Check, CheckKind, CheckStatus, Outcome, RunReport,
    VerificationCase,
};
pub use generator::{filter, generate, run_all};
pub use suite::{ExpectationRecord, ItemScope, Suite, Target};
