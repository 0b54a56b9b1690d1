//! Element location
//!
//! Every lookup follows the same policy: query all matches, take the first
//! visible one in document order, and poll until the wait window closes.
//! Hidden duplicates earlier in the document (another area's board, a
//! collapsed panel) are skipped rather than treated as the answer.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};

use crate::browser::{BrowserSession, ElementHandle, Selector};
use crate::common::{Error, Result, WaitPolicy};

/// Heading element of a group container
pub const GROUP_HEADING: &str = "h2";
/// Heading element of an item
pub const ITEM_HEADING: &str = "h3";
/// Label badges below an item's container
pub const LABEL_BADGE: &str = "div span";

/// Stand-in deadline for wait windows too large to add to `Instant::now()`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Run one session call under the action bound
pub async fn bounded<T, F>(wait: &WaitPolicy, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(wait.action, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(wait.action.as_millis() as u64)),
    }
}

/// First visible element matching `selector`, polling until found or the
/// wait window expires.
///
/// Returns [`Error::ElementNotFound`] when nothing visible appears in time.
pub async fn first_visible(
    session: &mut dyn BrowserSession,
    scope: Option<&ElementHandle>,
    selector: &Selector,
    wait: &WaitPolicy,
) -> Result<ElementHandle> {
    let started = Instant::now();
    let deadline = started
        .checked_add(wait.timeout)
        .unwrap_or_else(|| started + FAR_FUTURE);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let candidates = bounded(wait, session.query_all(scope, selector)).await?;
        for candidate in &candidates {
            match bounded(wait, session.is_visible(candidate)).await {
                Ok(true) => {
                    tracing::trace!(%selector, %candidate, attempts, "Located element");
                    return Ok(candidate.clone());
                }
                Ok(false) => {}
                // Detached between query and check
                Err(Error::StaleElement(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::debug!(
                %selector,
                matches = candidates.len(),
                attempts,
                "No visible match within wait window"
            );
            return Err(Error::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        sleep(wait.poll.min(deadline - now)).await;
    }
}

/// Locate the container of the group whose heading reads `group`
pub async fn find_group(
    session: &mut dyn BrowserSession,
    group: &str,
    wait: &WaitPolicy,
) -> Result<ElementHandle> {
    let selector = Selector::with_text(GROUP_HEADING, group)?;
    let heading = first_visible(session, None, &selector, wait)
        .await
        .map_err(|e| not_found(e, GROUP_HEADING, group))?;
    container_of(session, &heading, GROUP_HEADING, group, wait).await
}

/// Locate the heading of item `item`, optionally inside `scope`
pub async fn find_item(
    session: &mut dyn BrowserSession,
    scope: Option<&ElementHandle>,
    item: &str,
    wait: &WaitPolicy,
) -> Result<ElementHandle> {
    let selector = Selector::with_text(ITEM_HEADING, item)?;
    first_visible(session, scope, &selector, wait)
        .await
        .map_err(|e| not_found(e, ITEM_HEADING, item))
}

/// Locate label `label` inside the container of the item heading
pub async fn find_label(
    session: &mut dyn BrowserSession,
    item_heading: &ElementHandle,
    item: &str,
    label: &str,
    wait: &WaitPolicy,
) -> Result<ElementHandle> {
    let container = container_of(session, item_heading, ITEM_HEADING, item, wait).await?;
    let selector = Selector::with_text(LABEL_BADGE, label)?;
    first_visible(session, Some(&container), &selector, wait)
        .await
        .map_err(|e| match e {
            Error::ElementNotFound { .. } => Error::label_mismatch(label, item),
            other => other,
        })
}

async fn container_of(
    session: &mut dyn BrowserSession,
    heading: &ElementHandle,
    css: &str,
    text: &str,
    wait: &WaitPolicy,
) -> Result<ElementHandle> {
    bounded(wait, session.parent(heading))
        .await?
        .ok_or_else(|| Error::locator_not_found(css, text))
}

fn not_found(e: Error, css: &str, text: &str) -> Error {
    match e {
        Error::ElementNotFound { .. } => Error::locator_not_found(css, text),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{FixtureApp, FixtureFactory, SessionFactory};
    use std::sync::Arc;

    const BOARD: &str = r#"
areas:
  - name: Web Application
    groups:
      - name: In Progress
        items:
          - title: Design landing page
            labels: [Design]
  - name: Mobile Application
    groups:
      - name: In Progress
        items:
          - title: Push notification system
            labels: [Feature, urgent]
      - name: Done
        items:
          - title: App icon design
            labels: [Design]
"#;

    fn wait(timeout_ms: u64) -> WaitPolicy {
        WaitPolicy {
            timeout: Duration::from_millis(timeout_ms),
            poll: Duration::from_millis(10),
            action: Duration::from_secs(1),
        }
    }

    async fn open_area(yaml: &str, area: &str) -> Box<dyn BrowserSession> {
        let factory = FixtureFactory::new(Arc::new(FixtureApp::from_yaml(yaml).unwrap()));
        let mut session = factory.open().await.unwrap();
        session.navigate("http://board.test/").await.unwrap();
        let w = wait(100);
        let user = Selector::css("#username").unwrap();
        let user = first_visible(session.as_mut(), None, &user, &w).await.unwrap();
        session.fill(&user, "defaultUser").await.unwrap();
        let pass = Selector::css("#password").unwrap();
        let pass = first_visible(session.as_mut(), None, &pass, &w).await.unwrap();
        session.fill(&pass, "defaultPassword").await.unwrap();
        let submit = Selector::css(r#"button[type="submit"]"#).unwrap();
        let submit = first_visible(session.as_mut(), None, &submit, &w).await.unwrap();
        session.click(&submit).await.unwrap();
        let link = first_visible(session.as_mut(), None, &Selector::text(area), &w)
            .await
            .unwrap();
        session.click(&link).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_skips_hidden_earlier_duplicate() {
        let mut session = open_area(BOARD, "Mobile Application").await;
        let w = wait(100);

        let selector = Selector::with_text("h2", "In Progress").unwrap();
        let all = session.query_all(None, &selector).await.unwrap();
        assert_eq!(all.len(), 2);

        let found = first_visible(session.as_mut(), None, &selector, &w).await.unwrap();
        assert_eq!(found, all[1]);
    }

    #[tokio::test]
    async fn test_group_item_and_labels() {
        let mut session = open_area(BOARD, "Mobile Application").await;
        let w = wait(100);

        let group = find_group(session.as_mut(), "In Progress", &w).await.unwrap();
        let item_name = "Push notification system";
        let item = find_item(session.as_mut(), Some(&group), item_name, &w)
            .await
            .unwrap();
        let label = find_label(session.as_mut(), &item, item_name, "urgent", &w)
            .await
            .unwrap();
        assert_eq!(session.text_content(&label).await.unwrap(), "urgent");
    }

    #[tokio::test]
    async fn test_missing_elements_map_to_domain_errors() {
        let mut session = open_area(BOARD, "Mobile Application").await;
        let w = wait(30);

        let err = find_group(session.as_mut(), "Blocked", &w).await.unwrap_err();
        assert!(matches!(
            err,
            Error::LocatorNotFound { ref expected, .. } if expected == "Blocked"
        ));

        // Exists on the page, but only in the hidden area
        let err = find_item(session.as_mut(), None, "Design landing page", &w)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LocatorNotFound { .. }));

        let item = find_item(session.as_mut(), None, "App icon design", &w).await.unwrap();
        let err = find_label(session.as_mut(), &item, "App icon design", "Feature", &w)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LabelMismatch { ref label, .. } if label == "Feature"));
    }

    #[tokio::test]
    async fn test_item_scoped_to_other_group_is_not_found() {
        let mut session = open_area(BOARD, "Mobile Application").await;
        let w = wait(30);

        let done = find_group(session.as_mut(), "Done", &w).await.unwrap();
        let err = find_item(session.as_mut(), Some(&done), "Push notification system", &w)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LocatorNotFound { .. }));
    }

    #[tokio::test]
    async fn test_polls_until_board_renders() {
        let slow = format!("render_delay_ms: 80\n{}", BOARD);
        let mut session = open_area(&slow, "Mobile Application").await;

        let started = Instant::now();
        let group = find_group(session.as_mut(), "Done", &wait(2000)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(session.is_visible(&group).await.unwrap());
    }

    #[tokio::test]
    async fn test_gives_up_when_render_exceeds_wait_window() {
        let slow = format!("render_delay_ms: 5000\n{}", BOARD);
        let mut session = open_area(&slow, "Mobile Application").await;

        let err = find_group(session.as_mut(), "Done", &wait(50)).await.unwrap_err();
        assert!(matches!(err, Error::LocatorNotFound { .. }));
    }

    #[tokio::test]
    async fn test_action_bound_reports_timeout() {
        let w = WaitPolicy {
            action: Duration::from_millis(10),
            ..wait(10)
        };
        let err = bounded(&w, async {
            sleep(Duration::from_secs(5)).await;
            Ok::<_, Error>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout(10)));
    }

    #[tokio::test]
    async fn test_unbounded_wait_window_still_finds_element() {
        let mut session = open_area(BOARD, "Web Application").await;
        let w = WaitPolicy {
            timeout: Duration::MAX,
            ..wait(0)
        };

        let group = find_group(session.as_mut(), "In Progress", &w).await.unwrap();
        assert!(session.is_visible(&group).await.unwrap());
    }
}
