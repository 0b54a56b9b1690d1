//! Assertion engine
//!
//! Runs one verification case end to end inside its own browser session:
//! log in, enter the area, then check the group, the item and every label.
//! Stages before the structural checks and the group/item checks are
//! blocking; labels are all evaluated even after one of them fails.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::Instrument;

use crate::browser::{BrowserSession, SessionFactory, SessionLease};
use crate::common::{Error, WaitPolicy};
use crate::credentials::Credentials;

use super::locator;
use super::navigation;
use super::suite::{ExpectationRecord, ItemScope, Target};

/// Final state of a case
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Passed,
    Failed,
}

/// What a structural check looks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckKind {
    Group(String),
    Item(String),
    Label(String),
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Group(text) => write!(f, "group:{}", text),
            CheckKind::Item(text) => write!(f, "item:{}", text),
            CheckKind::Label(text) => write!(f, "label:{}", text),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Not evaluated yet
    Pending,
    Passed,
    Failed,
    /// Not evaluated because an earlier blocking step failed
    Skipped,
}

/// One sub-result of a case
#[derive(Serialize, Debug, Clone)]
pub struct Check {
    pub name: String,
    #[serde(skip)]
    pub kind: CheckKind,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Check {
    fn new(kind: CheckKind) -> Self {
        Self {
            name: kind.to_string(),
            kind,
            status: CheckStatus::Pending,
            error: None,
        }
    }
}

/// Steps before the structural checks that stop a case when they fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Session,
    Login,
    Landing(String),
    Area(String),
    Internal,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Session => write!(f, "session"),
            Stage::Login => write!(f, "login"),
            Stage::Landing(selector) => write!(f, "landing:{}", selector),
            Stage::Area(name) => write!(f, "area:{}", name),
            Stage::Internal => write!(f, "internal"),
        }
    }
}

/// One record turned into an executable case
#[derive(Debug, Clone)]
pub struct VerificationCase {
    pub index: usize,
    pub record: Arc<ExpectationRecord>,
    pub outcome: Outcome,
    /// Always `group, item, label…`
    pub checks: Vec<Check>,
    blocked: Option<(Stage, String)>,
}

impl VerificationCase {
    pub fn new(index: usize, record: Arc<ExpectationRecord>) -> Self {
        let mut checks = Vec::with_capacity(2 + record.labels.len());
        checks.push(Check::new(CheckKind::Group(record.group.clone())));
        checks.push(Check::new(CheckKind::Item(record.item.clone())));
        checks.extend(
            record
                .labels
                .iter()
                .map(|label| Check::new(CheckKind::Label(label.clone()))),
        );
        Self {
            index,
            record,
            outcome: Outcome::Pending,
            checks,
            blocked: None,
        }
    }

    /// Human readable case title
    pub fn name(&self) -> String {
        case_name(&self.record)
    }

    fn pass(&mut self, check: usize) {
        self.checks[check].status = CheckStatus::Passed;
    }

    fn fail(&mut self, check: usize, error: &Error) {
        tracing::debug!(check = %self.checks[check].name, %error, "Check failed");
        self.checks[check].status = CheckStatus::Failed;
        self.checks[check].error = Some(error.to_string());
    }

    fn block(&mut self, stage: Stage, error: &Error) {
        tracing::warn!(%stage, %error, "Case blocked");
        self.blocked = Some((stage, error.to_string()));
    }

    /// Settle the outcome and produce the report entry
    pub fn finish(mut self, duration: Duration) -> CaseResult {
        for check in &mut self.checks {
            if check.status == CheckStatus::Pending {
                check.status = CheckStatus::Skipped;
            }
        }

        let failed: Vec<&Check> = self
            .checks
            .iter()
            .filter(|c| c.status == CheckStatus::Failed)
            .collect();
        let (diagnostics, error) = match &self.blocked {
            Some((stage, message)) => (vec![stage.to_string()], Some(message.clone())),
            None => {
                let error = failed
                    .first()
                    .filter(|c| !matches!(c.kind, CheckKind::Label(_)))
                    .and_then(|c| c.error.clone());
                (failed.iter().map(|c| c.name.clone()).collect(), error)
            }
        };

        self.outcome = if diagnostics.is_empty() {
            Outcome::Passed
        } else {
            Outcome::Failed
        };

        CaseResult {
            index: self.index,
            name: case_name(&self.record),
            record: (*self.record).clone(),
            outcome: self.outcome,
            checks: self.checks,
            diagnostics,
            error,
            duration_ms: duration.as_millis() as u64,
        }
    }
}

fn case_name(record: &ExpectationRecord) -> String {
    format!("Verify \"{}\" in area \"{}\"", record.item, record.area)
}

/// Everything a case needs besides its record; shared read-only
#[derive(Debug, Clone)]
pub struct CaseContext {
    pub credentials: Arc<Credentials>,
    pub target: Arc<Target>,
    pub wait: WaitPolicy,
}

/// Report entry for one finished case
#[derive(Serialize, Debug, Clone)]
pub struct CaseResult {
    pub index: usize,
    pub name: String,
    pub record: ExpectationRecord,
    pub outcome: Outcome,
    pub checks: Vec<Check>,
    /// Failed check names, or the single blocking stage
    pub diagnostics: Vec<String>,
    /// Message of the blocking error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    /// Result for a case whose task died before producing one
    pub fn internal(case: VerificationCase, message: String) -> Self {
        let mut case = case;
        case.blocked = Some((Stage::Internal, message));
        case.finish(Duration::ZERO)
    }
}

/// All case results in record order
#[derive(Serialize, Debug, Clone)]
pub struct RunReport {
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
}

impl RunReport {
    pub fn new(results: Vec<CaseResult>, duration: Duration) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            passed,
            failed: results.len() - passed,
            duration_ms: duration.as_millis() as u64,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Run one case in a fresh session; the session is released on every path
pub async fn run_case(
    case: VerificationCase,
    ctx: &CaseContext,
    factory: &dyn SessionFactory,
) -> CaseResult {
    let span = tracing::info_span!("case", index = case.index, name = %case.name());
    async move {
        let started = Instant::now();
        let mut case = case;

        let mut lease = match SessionLease::acquire(factory).await {
            Ok(lease) => lease,
            Err(e) => {
                case.block(Stage::Session, &e);
                return case.finish(started.elapsed());
            }
        };

        match lease.session() {
            Ok(session) => run_steps(session, &mut case, ctx).await,
            Err(e) => case.block(Stage::Session, &e),
        }

        if let Err(e) = lease.release().await {
            tracing::warn!("Failed to release browser session: {}", e);
        }

        let result = case.finish(started.elapsed());
        tracing::info!(
            outcome = ?result.outcome,
            duration_ms = result.duration_ms,
            "Case finished"
        );
        result
    }
    .instrument(span)
    .await
}

async fn run_steps(
    session: &mut dyn BrowserSession,
    case: &mut VerificationCase,
    ctx: &CaseContext,
) {
    let wait = &ctx.wait;
    let target = ctx.target.as_ref();
    let record = case.record.clone();

    let login = match navigation::open(session, target, wait).await {
        Ok(()) => navigation::authenticate(session, target, &ctx.credentials, wait).await,
        Err(e) => Err(e),
    };
    if let Err(e) = login {
        case.block(Stage::Login, &e);
        return;
    }

    if let Some(landing) = &target.landing {
        if let Err(e) = navigation::await_landing(session, landing, wait).await {
            case.block(Stage::Landing(landing.to_string()), &e);
            return;
        }
    }

    if let Err(e) = navigation::enter_area(session, &record.area, wait).await {
        case.block(Stage::Area(record.area.clone()), &e);
        return;
    }

    let group = match locator::find_group(session, &record.group, wait).await {
        Ok(group) => {
            case.pass(0);
            group
        }
        Err(e) => {
            case.fail(0, &e);
            return;
        }
    };

    let scope = match target.item_scope {
        ItemScope::Group => Some(&group),
        ItemScope::Page => {
            tracing::debug!(item = %record.item, "Item lookup is page-wide");
            None
        }
    };
    let item = match locator::find_item(session, scope, &record.item, wait).await {
        Ok(item) => {
            case.pass(1);
            item
        }
        Err(e) => {
            case.fail(1, &e);
            return;
        }
    };

    for (offset, label) in record.labels.iter().enumerate() {
        match locator::find_label(session, &item, &record.item, label, wait).await {
            Ok(_) => case.pass(2 + offset),
            Err(e) => case.fail(2 + offset, &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{DialogPolicy, ElementHandle, FixtureApp, FixtureFactory, Key, Selector};
    use crate::common::Result;
    use crate::verify::suite::Suite;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const APP: &str = r#"
areas:
  - name: Tasks
    groups:
      - name: In Progress
        items:
          - title: Write report
            labels: [urgent]
      - name: To Do
        items:
          - title: Plan sprint
            labels: [planning, team]
"#;

    fn record(group: &str, item: &str, labels: &[&str]) -> Arc<ExpectationRecord> {
        Arc::new(ExpectationRecord {
            area: "Tasks".into(),
            item: item.into(),
            group: group.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        })
    }

    fn ctx(target_yaml: &str, credentials: Credentials) -> CaseContext {
        let suite = Suite::parse(&format!(
            "target:\n  url: http://app.test/\n{}records:\n{}",
            target_yaml, "  - { area: Tasks, item: A, group: B, labels: [] }\n"
        ))
        .unwrap();
        CaseContext {
            credentials: Arc::new(credentials),
            target: Arc::new(suite.target),
            wait: WaitPolicy {
                timeout: Duration::from_millis(40),
                poll: Duration::from_millis(5),
                action: Duration::from_secs(1),
            },
        }
    }

    fn factory() -> FixtureFactory {
        FixtureFactory::new(Arc::new(FixtureApp::from_yaml(APP).unwrap()))
    }

    fn statuses(result: &CaseResult) -> Vec<CheckStatus> {
        result.checks.iter().map(|c| c.status).collect()
    }

    #[tokio::test]
    async fn test_passing_case() {
        let factory = factory();
        let case = VerificationCase::new(0, record("In Progress", "Write report", &["urgent"]));
        let result = run_case(case, &ctx("", Credentials::default()), &factory).await;

        assert!(result.passed());
        assert!(result.diagnostics.is_empty());
        assert_eq!(statuses(&result), vec![CheckStatus::Passed; 3]);
        assert_eq!(factory.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_missing_label_is_only_diagnostic() {
        let factory = factory();
        let case = VerificationCase::new(
            3,
            record("In Progress", "Write report", &["urgent", "review"]),
        );
        let result = run_case(case, &ctx("", Credentials::default()), &factory).await;

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.diagnostics, vec!["label:review"]);
        assert_eq!(result.index, 3);
        assert!(result.error.is_none());
        assert!(result.checks[3]
            .error
            .as_deref()
            .unwrap()
            .contains("review"));
    }

    #[tokio::test]
    async fn test_missing_group_skips_everything_after() {
        let factory = factory();
        let case = VerificationCase::new(0, record("Done", "Write report", &["urgent", "review"]));
        let result = run_case(case, &ctx("", Credentials::default()), &factory).await;

        assert_eq!(result.diagnostics, vec!["group:Done"]);
        assert_eq!(
            statuses(&result),
            vec![
                CheckStatus::Failed,
                CheckStatus::Skipped,
                CheckStatus::Skipped,
                CheckStatus::Skipped
            ]
        );
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_missing_item_skips_labels() {
        let factory = factory();
        let case = VerificationCase::new(0, record("To Do", "Ship it", &["team"]));
        let result = run_case(case, &ctx("", Credentials::default()), &factory).await;

        assert_eq!(result.diagnostics, vec!["item:Ship it"]);
        assert_eq!(
            statuses(&result),
            vec![CheckStatus::Passed, CheckStatus::Failed, CheckStatus::Skipped]
        );
    }

    #[tokio::test]
    async fn test_item_lookup_is_page_wide_by_default() {
        let factory = factory();
        // Item lives under "In Progress", record claims "To Do"
        let case = VerificationCase::new(0, record("To Do", "Write report", &["urgent"]));
        let result = run_case(case.clone(), &ctx("", Credentials::default()), &factory).await;
        assert!(result.passed());

        let scoped = ctx("  item_scope: group\n", Credentials::default());
        let result = run_case(case, &scoped, &factory).await;
        assert_eq!(result.diagnostics, vec!["item:Write report"]);
    }

    #[tokio::test]
    async fn test_rejected_login_blocks_at_landing() {
        let factory = factory();
        let case = VerificationCase::new(0, record("In Progress", "Write report", &["urgent"]));
        let ctx = ctx(
            "  landing: \"#homeContainer\"\n",
            Credentials::new("intruder", "wrong"),
        );
        let result = run_case(case, &ctx, &factory).await;

        assert_eq!(result.diagnostics, vec!["landing:#homeContainer"]);
        assert_eq!(statuses(&result), vec![CheckStatus::Skipped; 3]);
        assert_eq!(factory.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_unknown_area_blocks_case() {
        let factory = factory();
        let mut rec = (*record("To Do", "Plan sprint", &[])).clone();
        rec.area = "Billing".into();
        let case = VerificationCase::new(0, Arc::new(rec));
        let result = run_case(case, &ctx("", Credentials::default()), &factory).await;

        assert_eq!(result.diagnostics, vec!["area:Billing"]);
        assert_eq!(result.checks.len(), 2);
    }

    #[tokio::test]
    async fn test_login_form_missing_blocks_at_login() {
        let factory = factory();
        let case = VerificationCase::new(0, record("To Do", "Plan sprint", &[]));
        let ctx = ctx("  selectors:\n    username: \"#email\"\n", Credentials::default());
        let result = run_case(case, &ctx, &factory).await;
        assert_eq!(result.diagnostics, vec!["login"]);
    }

    /// Session whose page load never completes
    struct StalledSession {
        open: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserSession for StalledSession {
        async fn navigate(&mut self, _url: &str) -> Result<()> {
            std::future::pending().await
        }

        async fn query_all(
            &mut self,
            _scope: Option<&ElementHandle>,
            _selector: &Selector,
        ) -> Result<Vec<ElementHandle>> {
            Ok(Vec::new())
        }

        async fn parent(&mut self, _element: &ElementHandle) -> Result<Option<ElementHandle>> {
            Ok(None)
        }

        async fn fill(&mut self, _element: &ElementHandle, _value: &str) -> Result<()> {
            Ok(())
        }

        async fn click(&mut self, _element: &ElementHandle) -> Result<()> {
            Ok(())
        }

        async fn is_visible(&mut self, _element: &ElementHandle) -> Result<bool> {
            Ok(false)
        }

        async fn is_enabled(&mut self, _element: &ElementHandle) -> Result<bool> {
            Ok(false)
        }

        async fn text_content(&mut self, _element: &ElementHandle) -> Result<String> {
            Ok(String::new())
        }

        async fn press_key(&mut self, _key: Key) -> Result<()> {
            Ok(())
        }

        async fn focused(&mut self) -> Result<Option<ElementHandle>> {
            Ok(None)
        }

        fn set_dialog_policy(&mut self, _policy: DialogPolicy) {}

        fn dialog_messages(&self) -> Vec<String> {
            Vec::new()
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.open.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct StalledFactory {
        open: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionFactory for StalledFactory {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn open(&self) -> Result<Box<dyn BrowserSession>> {
            self.open.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StalledSession {
                open: self.open.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_stalled_page_load_times_out_at_login() {
        let factory = StalledFactory::default();
        let mut ctx = ctx("", Credentials::default());
        ctx.wait.action = Duration::from_millis(30);
        let case = VerificationCase::new(
            0,
            record("In Progress", "Write report", &["urgent", "review"]),
        );

        let result = run_case(case, &ctx, &factory).await;

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.diagnostics, vec!["login"]);
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("timed out after 30 ms"));
        assert_eq!(statuses(&result), vec![CheckStatus::Skipped; 4]);
        assert_eq!(factory.open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_internal_result_keeps_check_count() {
        let case = VerificationCase::new(1, record("To Do", "Plan sprint", &["a", "b"]));
        let result = CaseResult::internal(case, "task panicked".into());
        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.diagnostics, vec!["internal"]);
        assert_eq!(result.checks.len(), 4);
    }

    #[test]
    fn test_report_counts() {
        let mut pass_case = VerificationCase::new(0, record("To Do", "Plan sprint", &[]));
        pass_case.pass(0);
        pass_case.pass(1);
        let ok = pass_case.finish(Duration::from_millis(5));
        let bad = CaseResult::internal(
            VerificationCase::new(1, record("To Do", "Plan sprint", &[])),
            "boom".into(),
        );
        let report = RunReport::new(vec![ok, bad], Duration::from_millis(10));
        assert_eq!((report.passed, report.failed), (1, 1));
        assert!(!report.success());
    }

    #[test]
    fn test_check_serializes_name_and_status() {
        let check = Check::new(CheckKind::Label("urgent".into()));
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["name"], "label:urgent");
        assert_eq!(json["status"], "pending");
        assert!(json.get("error").is_none());
    }
}
