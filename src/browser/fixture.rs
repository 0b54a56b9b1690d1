//! In-memory fixture application
//!
//! Renders a small task-board application into a DOM-like node arena and
//! implements [`BrowserSession`] on top of it. The page layout follows the
//! board markup the harness is written against:
//!
//! ```text
//! form#loginForm          username/password inputs, Clear, Login
//! div#homeContainer
//!   nav                   one button per area, Logout
//!   main
//!     section.area        one per area, hidden unless active
//!       div.column        h2 group heading
//!         div.card        h3 item heading
//!           div.tags      span.tag per label
//! ```
//!
//! Each session owns its own node arena, so sessions never share state.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use super::selector::Selector;
use super::{BrowserSession, DialogPolicy, ElementHandle, Key, SessionFactory};
use crate::common::{Error, Result};
use crate::credentials::{DEFAULT_PASSWORD, DEFAULT_USERNAME};

pub const MSG_EMPTY_LOGIN: &str = "Enter a valid user name and password";
pub const MSG_UNKNOWN_USER: &str = "This user does not exist";
pub const MSG_BAD_PASSWORD: &str = "Invalid Password";
pub const MSG_CONFIRM_LOGOUT: &str = "Are you sure you want to log out?";

/// Description of the fixture application
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureApp {
    #[serde(default = "default_title")]
    pub title: String,
    /// Account accepted by the login form
    #[serde(default)]
    pub login: FixtureLogin,
    #[serde(default)]
    pub areas: Vec<FixtureArea>,
    /// Delay between opening an area and its board becoming visible
    #[serde(default)]
    pub render_delay_ms: u64,
}

fn default_title() -> String {
    "Demo App".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureLogin {
    pub username: String,
    pub password: String,
}

impl Default for FixtureLogin {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureArea {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<FixtureGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureGroup {
    pub name: String,
    #[serde(default)]
    pub items: Vec<FixtureItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureItem {
    pub title: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl FixtureApp {
    /// Parse an application description from YAML (or JSON)
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse fixture application: {}", e)))
    }

    /// Load an application description from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }
}

/// Hands out fixture sessions and tracks how many are still open
pub struct FixtureFactory {
    app: Arc<FixtureApp>,
    open: Arc<AtomicUsize>,
    opened_total: AtomicUsize,
}

impl FixtureFactory {
    pub fn new(app: Arc<FixtureApp>) -> Self {
        Self {
            app,
            open: Arc::new(AtomicUsize::new(0)),
            opened_total: AtomicUsize::new(0),
        }
    }

    /// Sessions opened and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Sessions opened over the factory's lifetime
    pub fn opened_total(&self) -> usize {
        self.opened_total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FixtureFactory {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        self.open.fetch_add(1, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixtureSession::new(
            self.app.clone(),
            self.open.clone(),
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Submit,
    Clear,
    OpenArea(usize),
    Logout,
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    value: String,
    parent: Option<usize>,
    children: Vec<usize>,
    hidden: bool,
    disabled: bool,
    action: Option<Action>,
}

impl Node {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn is_focusable(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "button")
    }
}

/// Node ids of the parts of the page that change state
#[derive(Debug, Default)]
struct Landmarks {
    login_form: usize,
    username: usize,
    password: usize,
    username_error: usize,
    password_error: usize,
    login_error: usize,
    home: usize,
    areas: Vec<usize>,
}

/// One isolated page of the fixture application
pub struct FixtureSession {
    app: Arc<FixtureApp>,
    open: Arc<AtomicUsize>,
    nodes: Vec<Node>,
    marks: Landmarks,
    active_area: Option<(usize, Instant)>,
    focus: Option<usize>,
    dialog_policy: DialogPolicy,
    dialogs: Vec<String>,
}

impl FixtureSession {
    fn new(app: Arc<FixtureApp>, open: Arc<AtomicUsize>) -> Self {
        let mut session = Self {
            app,
            open,
            nodes: Vec::new(),
            marks: Landmarks::default(),
            active_area: None,
            focus: None,
            dialog_policy: DialogPolicy::default(),
            dialogs: Vec::new(),
        };
        session.nodes.push(element("html", &[], None));
        session
    }

    fn add(&mut self, parent: usize, node: Node) -> usize {
        let id = self.nodes.len();
        let mut node = node;
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    fn render(&mut self) {
        self.nodes = vec![element("html", &[], None)];
        self.active_area = None;
        self.focus = None;
        let app = self.app.clone();

        let body = self.add(0, element("body", &[], None));
        self.add(body, element("h1", &[], Some(app.title.as_str())));

        let form = self.add(body, element("form", &[("id", "loginForm")], None));
        self.add(form, element("label", &[("for", "username")], Some("Username:")));
        let username = self.add(
            form,
            element("input", &[("id", "username"), ("name", "username"), ("type", "text")], None),
        );
        let username_error = self.add(form, element("span", &[("id", "usernameError")], None));
        self.add(form, element("label", &[("for", "password")], Some("Password:")));
        let password = self.add(
            form,
            element(
                "input",
                &[("id", "password"), ("name", "password"), ("type", "password")],
                None,
            ),
        );
        let password_error = self.add(form, element("span", &[("id", "passwordError")], None));
        let clear = self.add(form, element("button", &[("type", "button")], Some("Clear")));
        self.nodes[clear].action = Some(Action::Clear);
        let submit = self.add(form, element("button", &[("type", "submit")], Some("Login")));
        self.nodes[submit].action = Some(Action::Submit);
        let login_error = self.add(form, element("div", &[("id", "loginError")], None));

        let home = self.add(body, element("div", &[("id", "homeContainer")], None));
        self.nodes[home].hidden = true;

        let nav = self.add(home, element("nav", &[], None));
        for (index, area) in app.areas.iter().enumerate() {
            let attrs = [("class", "area-link"), ("data-area", area.name.as_str())];
            let link = self.add(nav, element("button", &attrs, Some(area.name.as_str())));
            self.nodes[link].action = Some(Action::OpenArea(index));
        }
        let logout = self.add(nav, element("button", &[("id", "logoutButton")], Some("Logout")));
        self.nodes[logout].action = Some(Action::Logout);

        let main = self.add(home, element("main", &[], None));
        let mut areas = Vec::with_capacity(app.areas.len());
        for area in &app.areas {
            let section = self.add(
                main,
                element("section", &[("class", "area"), ("data-area", area.name.as_str())], None),
            );
            for group in &area.groups {
                let column = self.add(section, element("div", &[("class", "column")], None));
                self.add(column, element("h2", &[], Some(group.name.as_str())));
                for item in &group.items {
                    let card = self.add(column, element("div", &[("class", "card")], None));
                    self.add(card, element("h3", &[], Some(item.title.as_str())));
                    let tags = self.add(card, element("div", &[("class", "tags")], None));
                    for label in &item.labels {
                        self.add(tags, element("span", &[("class", "tag")], Some(label.as_str())));
                    }
                }
            }
            areas.push(section);
        }

        self.marks = Landmarks {
            login_form: form,
            username,
            password,
            username_error,
            password_error,
            login_error,
            home,
            areas,
        };
    }

    fn node_id(&self, handle: &ElementHandle) -> Result<usize> {
        handle
            .id()
            .strip_prefix('n')
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|&n| n < self.nodes.len())
            .ok_or_else(|| Error::StaleElement(handle.id().to_string()))
    }

    fn handle(id: usize) -> ElementHandle {
        ElementHandle::new(format!("n{}", id))
    }

    fn is_area_rendered(&self, id: usize) -> bool {
        match self.active_area {
            Some((index, opened_at)) => {
                self.marks.areas.get(index) == Some(&id)
                    && opened_at.elapsed() >= Duration::from_millis(self.app.render_delay_ms)
            }
            None => false,
        }
    }

    fn visible(&self, id: usize) -> bool {
        let mut current = Some(id);
        while let Some(n) = current {
            let node = &self.nodes[n];
            let area_hidden = self.marks.areas.contains(&n) && !self.is_area_rendered(n);
            if node.hidden || area_hidden {
                return false;
            }
            current = node.parent;
        }
        true
    }

    fn enabled(&self, id: usize) -> bool {
        !self.nodes[id].disabled
    }

    fn is_descendant(&self, id: usize, ancestor: usize) -> bool {
        let mut current = self.nodes[id].parent;
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.nodes[n].parent;
        }
        false
    }

    /// Nodes below `root` in document order
    fn descendants(&self, root: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[root].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        out
    }

    /// Right-to-left descendant-combinator matching, bounded by `scope`
    fn matches_chain(&self, id: usize, selector: &Selector, scope: Option<usize>) -> bool {
        let steps = selector.css.steps();
        let node = &self.nodes[id];
        let Some((last, rest)) = steps.split_last() else {
            return false;
        };
        if !last.matches(&node.tag, |name| node.attr(name)) || !selector.text_matches(&node.text) {
            return false;
        }

        let mut ancestor = node.parent;
        for step in rest.iter().rev() {
            loop {
                match ancestor {
                    Some(a) if Some(a) == scope => return false,
                    Some(a) => {
                        let candidate = &self.nodes[a];
                        ancestor = candidate.parent;
                        if step.matches(&candidate.tag, |name| candidate.attr(name)) {
                            break;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }

    fn text_of(&self, id: usize) -> String {
        let mut text = self.nodes[id].text.clone();
        for child in self.descendants(id) {
            text.push_str(&self.nodes[child].text);
        }
        text
    }

    fn ensure_interactable(&self, id: usize) -> Result<()> {
        if !self.visible(id) || !self.enabled(id) {
            return Err(Error::NotInteractable(Self::handle(id).to_string()));
        }
        Ok(())
    }

    fn set_text(&mut self, id: usize, text: &str) {
        self.nodes[id].text = text.to_string();
    }

    fn run_action(&mut self, action: Action) {
        match action {
            Action::Submit => self.submit_login(),
            Action::Clear => {
                for id in [self.marks.username, self.marks.password] {
                    self.nodes[id].value.clear();
                }
                for id in [
                    self.marks.username_error,
                    self.marks.password_error,
                    self.marks.login_error,
                ] {
                    self.set_text(id, "");
                }
            }
            Action::OpenArea(index) => {
                tracing::trace!(area = index, "Fixture area opened");
                self.active_area = Some((index, Instant::now()));
            }
            Action::Logout => {
                self.dialogs.push(MSG_CONFIRM_LOGOUT.to_string());
                if self.dialog_policy == DialogPolicy::Accept {
                    self.render();
                }
            }
        }
    }

    fn submit_login(&mut self) {
        let username = self.nodes[self.marks.username].value.trim().to_string();
        let password = self.nodes[self.marks.password].value.clone();
        let (user_err, pass_err, login_err) = if username.is_empty() || password.is_empty() {
            ("", "", MSG_EMPTY_LOGIN)
        } else if username != self.app.login.username {
            (MSG_UNKNOWN_USER, "", "")
        } else if password != self.app.login.password {
            ("", MSG_BAD_PASSWORD, "")
        } else {
            ("", "", "")
        };

        self.set_text(self.marks.username_error, user_err);
        self.set_text(self.marks.password_error, pass_err);
        self.set_text(self.marks.login_error, login_err);

        if user_err.is_empty() && pass_err.is_empty() && login_err.is_empty() {
            tracing::trace!(%username, "Fixture login accepted");
            self.nodes[self.marks.login_form].hidden = true;
            self.nodes[self.marks.home].hidden = false;
        }
    }

    fn focusable_order(&self) -> Vec<usize> {
        self.descendants(0)
            .into_iter()
            .filter(|&id| self.nodes[id].is_focusable() && self.visible(id) && self.enabled(id))
            .collect()
    }
}

fn element(tag: &str, attrs: &[(&str, &str)], text: Option<&str>) -> Node {
    Node {
        tag: tag.to_string(),
        attrs: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        text: text.unwrap_or_default().to_string(),
        value: String::new(),
        parent: None,
        children: Vec::new(),
        hidden: false,
        disabled: false,
        action: None,
    }
}

#[async_trait]
impl BrowserSession for FixtureSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        tracing::trace!(%url, "Fixture navigate");
        if url == "about:blank" {
            self.nodes = vec![element("html", &[], None)];
            self.marks = Landmarks::default();
            self.active_area = None;
            self.focus = None;
        } else {
            self.render();
        }
        Ok(())
    }

    async fn query_all(
        &mut self,
        scope: Option<&ElementHandle>,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>> {
        let scope = scope.map(|s| self.node_id(s)).transpose()?;
        let root = scope.unwrap_or(0);
        Ok(self
            .descendants(root)
            .into_iter()
            .filter(|&id| self.matches_chain(id, selector, scope))
            .map(Self::handle)
            .collect())
    }

    async fn parent(&mut self, element: &ElementHandle) -> Result<Option<ElementHandle>> {
        let id = self.node_id(element)?;
        Ok(self.nodes[id].parent.map(Self::handle))
    }

    async fn fill(&mut self, element: &ElementHandle, value: &str) -> Result<()> {
        let id = self.node_id(element)?;
        if self.nodes[id].tag != "input" {
            return Err(Error::NotInteractable(format!(
                "{} ({} is not an input)",
                element, self.nodes[id].tag
            )));
        }
        self.ensure_interactable(id)?;
        self.nodes[id].value = value.to_string();
        self.focus = Some(id);
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        let id = self.node_id(element)?;
        self.ensure_interactable(id)?;
        if self.nodes[id].is_focusable() {
            self.focus = Some(id);
        }
        if let Some(action) = self.nodes[id].action {
            self.run_action(action);
        }
        Ok(())
    }

    async fn is_visible(&mut self, element: &ElementHandle) -> Result<bool> {
        let id = self.node_id(element)?;
        Ok(self.visible(id))
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> Result<bool> {
        let id = self.node_id(element)?;
        Ok(self.enabled(id))
    }

    async fn text_content(&mut self, element: &ElementHandle) -> Result<String> {
        let id = self.node_id(element)?;
        Ok(self.text_of(id))
    }

    async fn press_key(&mut self, key: Key) -> Result<()> {
        match key {
            Key::Tab => {
                let order = self.focusable_order();
                let next = match self.focus.and_then(|f| order.iter().position(|&id| id == f)) {
                    Some(pos) => order.get(pos + 1).or(order.first()).copied(),
                    None => order.first().copied(),
                };
                self.focus = next;
            }
            Key::Enter => {
                let Some(focus) = self.focus else {
                    return Ok(());
                };
                if self.nodes[focus].tag == "button" {
                    if let Some(action) = self.nodes[focus].action {
                        self.run_action(action);
                    }
                } else if self.is_descendant(focus, self.marks.login_form) {
                    self.submit_login();
                }
            }
        }
        Ok(())
    }

    async fn focused(&mut self) -> Result<Option<ElementHandle>> {
        Ok(self.focus.map(Self::handle))
    }

    fn set_dialog_policy(&mut self, policy: DialogPolicy) {
        self.dialog_policy = policy;
    }

    fn dialog_messages(&self) -> Vec<String> {
        self.dialogs.clone()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
