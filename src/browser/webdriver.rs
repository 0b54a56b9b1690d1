//! WebDriver backend
//!
//! Drives a real browser through a WebDriver server (chromedriver,
//! geckodriver or a Selenium grid) with fantoccini. Selectors are sent as
//! XPath so text filters and scoped queries behave the same as in the
//! fixture backend.

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::key::Key as WdKey;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};

use super::selector::Selector;
use super::{BrowserSession, DialogPolicy, ElementHandle, Key, SessionFactory};
use crate::common::config::{BrowserKind, WebDriverConfig};
use crate::common::{Error, Result};

/// Opens one browser session per case against a WebDriver server
pub struct WebDriverFactory {
    config: WebDriverConfig,
}

impl WebDriverFactory {
    pub fn new(config: WebDriverConfig) -> Self {
        Self { config }
    }

    /// New-session capabilities for the configured browser
    pub fn capabilities(&self) -> Map<String, Value> {
        let mut caps = Map::new();
        match self.config.browser {
            BrowserKind::Chrome => {
                let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage"];
                if self.config.headless {
                    args.push("--headless=new");
                }
                caps.insert("browserName".to_string(), json!("chrome"));
                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
            }
            BrowserKind::Firefox => {
                let args: Vec<&str> = if self.config.headless {
                    vec!["-headless"]
                } else {
                    Vec::new()
                };
                caps.insert("browserName".to_string(), json!("firefox"));
                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
        }
        caps
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    fn name(&self) -> &str {
        "webdriver"
    }

    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let session = WebDriverSession::start(&self.config.url, self.capabilities()).await?;
        Ok(Box::new(session))
    }
}

/// One remote browser session.
///
/// Elements found through this session are kept in an arena and handed out
/// as `w<index>` handles; the arena is reset on every page load.
pub struct WebDriverSession {
    client: Client,
    elements: Vec<Element>,
    dialog_policy: DialogPolicy,
    dialogs: Vec<String>,
}

impl WebDriverSession {
    /// Create a new remote session
    #[tracing::instrument(skip(capabilities))]
    pub async fn start(server: &str, capabilities: Map<String, Value>) -> Result<Self> {
        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(server)
            .await
            .map_err(|e| Error::SessionStart(format!("{}: {}", server, e)))?;

        tracing::info!("WebDriver session started");
        Ok(Self {
            client,
            elements: Vec::new(),
            dialog_policy: DialogPolicy::default(),
            dialogs: Vec::new(),
        })
    }

    fn remember(&mut self, element: Element) -> ElementHandle {
        self.elements.push(element);
        ElementHandle::new(format!("w{}", self.elements.len() - 1))
    }

    fn element(&self, handle: &ElementHandle) -> Result<&Element> {
        handle
            .id()
            .strip_prefix('w')
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| self.elements.get(n))
            .ok_or_else(|| Error::StaleElement(handle.id().to_string()))
    }

    /// Answer an open dialog, if any, according to the policy
    async fn handle_dialog(&mut self) -> Result<()> {
        let text = match self.client.get_alert_text().await {
            Ok(text) => text,
            Err(e) if e.is_no_such_alert() => return Ok(()),
            Err(e) => return Err(session_error("get alert text", None, e)),
        };
        tracing::debug!(%text, policy = ?self.dialog_policy, "Dialog opened");
        self.dialogs.push(text);

        let answered = match self.dialog_policy {
            DialogPolicy::Accept => self.client.accept_alert().await,
            DialogPolicy::Dismiss => self.client.dismiss_alert().await,
        };
        answered.map_err(|e| session_error("answer alert", None, e))
    }
}

/// Map a fantoccini command failure onto the session error variants
fn session_error(command: &str, handle: Option<&ElementHandle>, err: CmdError) -> Error {
    let subject = |message: &str| match handle {
        Some(handle) => handle.to_string(),
        None => message.to_string(),
    };
    match err {
        CmdError::Standard(wd) => match wd.error {
            ErrorStatus::StaleElementReference => Error::StaleElement(subject(&wd.message)),
            ErrorStatus::ElementNotInteractable | ErrorStatus::ElementClickIntercepted => {
                Error::NotInteractable(subject(&wd.message))
            }
            _ => Error::webdriver(command, wd.to_string()),
        },
        other => Error::webdriver(command, other.to_string()),
    }
}

fn key_char(key: Key) -> char {
    match key {
        Key::Tab => char::from(WdKey::Tab),
        Key::Enter => char::from(WdKey::Enter),
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.elements.clear();
        self.client
            .goto(url)
            .await
            .map_err(|e| session_error("navigate", None, e))
    }

    async fn query_all(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>> {
        let xpath = selector.to_xpath(scope.is_some());
        let found = match scope {
            Some(handle) => self
                .element(handle)?
                .find_all(Locator::XPath(&xpath))
                .await
                .map_err(|e| session_error("find elements", Some(handle), e))?,
            None => self
                .client
                .find_all(Locator::XPath(&xpath))
                .await
                .map_err(|e| session_error("find elements", None, e))?,
        };
        Ok(found.into_iter().map(|el| self.remember(el)).collect())
    }

    async fn parent(&mut self, element: &ElementHandle) -> Result<Option<ElementHandle>> {
        let found = self.element(element)?.find(Locator::XPath("..")).await;
        match found {
            Ok(parent) => Ok(Some(self.remember(parent))),
            // `..` of the document element is not an element
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(session_error("find parent", Some(element), e)),
        }
    }

    async fn fill(&mut self, element: &ElementHandle, value: &str) -> Result<()> {
        let target = self.element(element)?;
        target
            .clear()
            .await
            .map_err(|e| session_error("clear", Some(element), e))?;
        target
            .send_keys(value)
            .await
            .map_err(|e| session_error("send keys", Some(element), e))
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        self.element(element)?
            .click()
            .await
            .map_err(|e| session_error("click", Some(element), e))?;
        self.handle_dialog().await
    }

    async fn is_visible(&mut self, element: &ElementHandle) -> Result<bool> {
        self.element(element)?
            .is_displayed()
            .await
            .map_err(|e| session_error("is displayed", Some(element), e))
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> Result<bool> {
        self.element(element)?
            .is_enabled()
            .await
            .map_err(|e| session_error("is enabled", Some(element), e))
    }

    async fn text_content(&mut self, element: &ElementHandle) -> Result<String> {
        self.element(element)?
            .text()
            .await
            .map_err(|e| session_error("text", Some(element), e))
    }

    async fn press_key(&mut self, key: Key) -> Result<()> {
        let active = self
            .client
            .active_element()
            .await
            .map_err(|e| session_error("active element", None, e))?;
        active
            .send_keys(&key_char(key).to_string())
            .await
            .map_err(|e| session_error("send keys", None, e))?;
        self.handle_dialog().await
    }

    async fn focused(&mut self) -> Result<Option<ElementHandle>> {
        let active = self.client.active_element().await;
        match active {
            Ok(active) => Ok(Some(self.remember(active))),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(session_error("active element", None, e)),
        }
    }

    fn set_dialog_policy(&mut self, policy: DialogPolicy) {
        self.dialog_policy = policy;
    }

    fn dialog_messages(&self) -> Vec<String> {
        self.dialogs.clone()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|e| session_error("close", None, e))?;
        tracing::debug!("WebDriver session closed");
        Ok(())
    }
}
