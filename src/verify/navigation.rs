//! Page navigation steps shared by every case: open, log in, enter an area

use crate::browser::{BrowserSession, Selector};
use crate::common::{Result, WaitPolicy};
use crate::credentials::Credentials;

use super::locator::{bounded, first_visible};
use super::suite::Target;

/// Load the target page
pub async fn open(
    session: &mut dyn BrowserSession,
    target: &Target,
    wait: &WaitPolicy,
) -> Result<()> {
    tracing::debug!(url = %target.url, "Opening target");
    bounded(wait, session.navigate(&target.url)).await
}

/// Fill the login form and submit it.
///
/// Succeeds once the submit click went through; whether the login was
/// accepted is left to [`await_landing`] or the first structural check.
pub async fn authenticate(
    session: &mut dyn BrowserSession,
    target: &Target,
    credentials: &Credentials,
    wait: &WaitPolicy,
) -> Result<()> {
    let username = first_visible(session, None, &target.username, wait).await?;
    bounded(wait, session.fill(&username, &credentials.username)).await?;

    let password = first_visible(session, None, &target.password, wait).await?;
    bounded(wait, session.fill(&password, &credentials.password)).await?;

    let submit = first_visible(session, None, &target.submit, wait).await?;
    bounded(wait, session.click(&submit)).await?;
    tracing::debug!(username = %credentials.username, "Login submitted");
    Ok(())
}

/// Wait for the landing element to become visible
pub async fn await_landing(
    session: &mut dyn BrowserSession,
    landing: &Selector,
    wait: &WaitPolicy,
) -> Result<()> {
    first_visible(session, None, landing, wait).await?;
    Ok(())
}

/// Click the visible element whose own text is the area name
pub async fn enter_area(
    session: &mut dyn BrowserSession,
    area: &str,
    wait: &WaitPolicy,
) -> Result<()> {
    let link = first_visible(session, None, &Selector::text(area), wait).await?;
    bounded(wait, session.click(&link)).await?;
    tracing::debug!(%area, "Entered area");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{FixtureApp, FixtureFactory, SessionFactory};
    use crate::common::Error;
    use crate::verify::suite::Suite;
    use std::sync::Arc;
    use std::time::Duration;

    const APP: &str = r#"
areas:
  - name: Tasks
    groups:
      - name: Done
        items: []
"#;

    fn target(landing: bool) -> Target {
        let landing = if landing { "  landing: \"#homeContainer\"\n" } else { "" };
        let yaml = format!(
            "target:\n  url: http://app.test/\n{}records:\n{}",
            landing, "  - { area: Tasks, item: A, group: Done, labels: [] }\n"
        );
        Suite::parse(&yaml).unwrap().target
    }

    fn wait() -> WaitPolicy {
        WaitPolicy {
            timeout: Duration::from_millis(40),
            poll: Duration::from_millis(5),
            action: Duration::from_secs(1),
        }
    }

    async fn session() -> Box<dyn BrowserSession> {
        let factory = FixtureFactory::new(Arc::new(FixtureApp::from_yaml(APP).unwrap()));
        factory.open().await.unwrap()
    }

    #[tokio::test]
    async fn test_login_and_enter_area() {
        let mut s = session().await;
        let target = target(true);
        open(s.as_mut(), &target, &wait()).await.unwrap();
        authenticate(s.as_mut(), &target, &Credentials::default(), &wait())
            .await
            .unwrap();
        await_landing(s.as_mut(), target.landing.as_ref().unwrap(), &wait())
            .await
            .unwrap();
        enter_area(s.as_mut(), "Tasks", &wait()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_login_never_lands() {
        let mut s = session().await;
        let target = target(true);
        open(s.as_mut(), &target, &wait()).await.unwrap();
        authenticate(s.as_mut(), &target, &Credentials::new("intruder", "x"), &wait())
            .await
            .unwrap();
        let err = await_landing(s.as_mut(), target.landing.as_ref().unwrap(), &wait())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unknown_area_is_element_not_found() {
        let mut s = session().await;
        let target = target(false);
        open(s.as_mut(), &target, &wait()).await.unwrap();
        authenticate(s.as_mut(), &target, &Credentials::default(), &wait())
            .await
            .unwrap();
        let err = enter_area(s.as_mut(), "Billing", &wait()).await.unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_blank_page_has_no_login_form() {
        let mut s = session().await;
        let err = authenticate(s.as_mut(), &target(false), &Credentials::default(), &wait())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ElementNotFound { ref selector } if selector == "#username"
        ));
    }
}
