//! Verification case generation and scheduling
//!
//! Every record becomes exactly one case. Cases run as independent tokio
//! tasks, at most `workers` at a time, and results come back in record
//! order no matter which case finishes first.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use crate::browser::SessionFactory;

use super::engine::{run_case, CaseContext, CaseResult, VerificationCase};
use super::suite::Suite;

/// One case per record, indexed by record position
pub fn generate(suite: &Suite) -> Vec<VerificationCase> {
    suite
        .records
        .iter()
        .enumerate()
        .map(|(index, record)| VerificationCase::new(index, Arc::new(record.clone())))
        .collect()
}

/// Keep only cases whose name contains `pattern`
pub fn filter(cases: Vec<VerificationCase>, pattern: Option<&str>) -> Vec<VerificationCase> {
    match pattern {
        Some(pattern) => cases
            .into_iter()
            .filter(|case| case.name().contains(pattern))
            .collect(),
        None => cases,
    }
}

/// Run all cases concurrently and collect their results in index order.
///
/// `on_done` is called once per case as it completes, in completion order.
pub async fn run_all<F>(
    cases: Vec<VerificationCase>,
    ctx: Arc<CaseContext>,
    factory: Arc<dyn SessionFactory>,
    workers: usize,
    mut on_done: F,
) -> Vec<CaseResult>
where
    F: FnMut(&CaseResult),
{
    let workers = workers.max(1);
    tracing::info!(
        cases = cases.len(),
        workers,
        backend = factory.name(),
        "Running verification cases"
    );

    let tasks = cases.into_iter().map(|case| {
        let ctx = ctx.clone();
        let factory = factory.clone();
        let fallback = case.clone();
        async move {
            let handle =
                tokio::spawn(async move { run_case(case, &ctx, factory.as_ref()).await });
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(index = fallback.index, "Case task failed: {}", e);
                    CaseResult::internal(fallback, e.to_string())
                }
            }
        }
    });

    let mut results: Vec<CaseResult> = stream::iter(tasks)
        .buffer_unordered(workers)
        .inspect(|result| on_done(result))
        .collect()
        .await;

    results.sort_by_key(|r| r.index);
    results
}
