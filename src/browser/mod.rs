//! Browser Session capability
//!
//! The engine drives the target application only through [`BrowserSession`].
//! Two backends implement it: an in-memory fixture DOM used for offline
//! runs and tests, and a fantoccini WebDriver client for real browsers.
//!
//! Sessions are handed out by a [`SessionFactory`] and held through a
//! [`SessionLease`], which guarantees the session is closed on every exit
//! path of a case.

pub mod fixture;
pub mod selector;
pub mod webdriver;

use std::fmt;

use async_trait::async_trait;

use crate::common::{Error, Result};

pub use fixture::{FixtureApp, FixtureFactory, FixtureSession};
pub use selector::{CssSelector, Selector};
pub use webdriver::{WebDriverFactory, WebDriverSession};

/// Opaque reference to an element inside one session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// Keys the harness can press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Enter,
}

/// What to do with a native dialog (alert/confirm/prompt) when it opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogPolicy {
    Accept,
    #[default]
    Dismiss,
}

/// Operations the engine needs from a browser page
#[async_trait]
pub trait BrowserSession: Send {
    /// Load a page
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// All elements matching `selector`, in document order.
    ///
    /// With a `scope`, only descendants of that element are searched.
    /// No match is an empty list, not an error.
    async fn query_all(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>>;

    /// Structural parent of an element, `None` at the document root
    async fn parent(&mut self, element: &ElementHandle) -> Result<Option<ElementHandle>>;

    /// Replace the value of an input element
    async fn fill(&mut self, element: &ElementHandle, value: &str) -> Result<()>;

    /// Click an element
    async fn click(&mut self, element: &ElementHandle) -> Result<()>;

    async fn is_visible(&mut self, element: &ElementHandle) -> Result<bool>;

    async fn is_enabled(&mut self, element: &ElementHandle) -> Result<bool>;

    /// Rendered text of the element and its descendants
    async fn text_content(&mut self, element: &ElementHandle) -> Result<String>;

    /// Press and release a key on the focused element
    async fn press_key(&mut self, key: Key) -> Result<()>;

    /// Element that currently has keyboard focus
    async fn focused(&mut self) -> Result<Option<ElementHandle>>;

    /// How dialogs opened from now on are answered
    fn set_dialog_policy(&mut self, policy: DialogPolicy);

    /// Messages of every dialog seen so far, oldest first
    fn dialog_messages(&self) -> Vec<String>;

    /// Release the session and any remote resources behind it
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Produces isolated sessions, one per verification case
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Scoped ownership of one browser session.
///
/// Call [`SessionLease::release`] on the normal path. If the lease is
/// dropped without it (cancelled task, panic), the close is spawned on the
/// current tokio runtime.
pub struct SessionLease {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionLease {
    /// Open a fresh session from `factory`
    pub async fn acquire(factory: &dyn SessionFactory) -> Result<Self> {
        let session = factory.open().await?;
        tracing::debug!(backend = factory.name(), "Browser session acquired");
        Ok(Self {
            session: Some(session),
        })
    }

    /// Borrow the session
    pub fn session(&mut self) -> Result<&mut (dyn BrowserSession + 'static)> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(Error::Internal("session lease used after release".to_string())),
        }
    }

    /// Close the session
    pub async fn release(mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => {
                tracing::debug!("Releasing browser session");
                session.close().await
            }
            None => Ok(()),
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    tracing::warn!("Browser session dropped without release, closing it");
                    handle.spawn(async move {
                        if let Err(e) = session.close().await {
                            tracing::warn!("Failed to close abandoned session: {}", e);
                        }
                    });
                }
                Err(_) => {
                    tracing::warn!("Browser session dropped outside a runtime, leaking it");
                }
            }
        }
    }
}
