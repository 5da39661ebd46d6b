//! Scripted in-memory browser used to drive the extractor without Chrome.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use reputrack_scraper::{
    BrowserError, BrowserLauncher, BrowserSession, ElementHandle, Locator, SessionOptions,
};

/// One element: its visible text and the descendants reachable by locator.
#[derive(Clone, Default)]
pub struct FakeNode {
    pub text: String,
    pub children: Vec<(Locator, Vec<FakeNode>)>,
}

impl FakeNode {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, locator: Locator, node: FakeNode) -> Self {
        self.children.push((locator, vec![node]));
        self
    }
}

/// What the page looks like to the session.
#[derive(Clone, Default)]
pub struct ScriptedPage {
    pub matches: Vec<(Locator, Vec<FakeNode>)>,
    pub source: String,
    pub goto_error: Option<fn() -> BrowserError>,
    /// Every lookup fails with a session-level error once navigation succeeded.
    pub session_lost: bool,
    pub panic_on_source: bool,
    /// Clicking an element found by this locator swaps the page for the
    /// boxed one.
    pub on_click: Option<(Locator, Box<ScriptedPage>)>,
}

impl ScriptedPage {
    pub fn with(mut self, locator: Locator, nodes: Vec<FakeNode>) -> Self {
        self.matches.push((locator, nodes));
        self
    }

    pub fn with_css(self, selector: &str, nodes: Vec<FakeNode>) -> Self {
        self.with(Locator::css(selector), nodes)
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }
}

/// Calls observed by every session a launcher opened.
#[derive(Default)]
pub struct Journal {
    pub events: Mutex<Vec<String>>,
    pub closed: AtomicBool,
    pub last_options: Mutex<Option<SessionOptions>>,
}

impl Journal {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct ScriptedLauncher {
    page: ScriptedPage,
    failures_before_open: AtomicU32,
    pub opens: AtomicU32,
    pub journal: Arc<Journal>,
}

impl ScriptedLauncher {
    pub fn new(page: ScriptedPage) -> Self {
        Self {
            page,
            failures_before_open: AtomicU32::new(0),
            opens: AtomicU32::new(0),
            journal: Arc::new(Journal::default()),
        }
    }

    /// Refuse the first `n` session requests with `SessionNotCreated`.
    pub fn failing_first(self, n: u32) -> Self {
        self.failures_before_open.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.journal.last_options.lock().unwrap() = Some(options.clone());
        let remaining = self.failures_before_open.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_before_open.store(remaining - 1, Ordering::SeqCst);
            return Err(BrowserError::SessionNotCreated {
                message: "Chrome failed to start".to_string(),
            });
        }
        Ok(Box::new(ScriptedSession {
            state: Mutex::new(SessionState {
                page: self.page.clone(),
                registry: Vec::new(),
            }),
            journal: Arc::clone(&self.journal),
        }))
    }
}

struct Registered {
    node: FakeNode,
    origin: Locator,
}

struct SessionState {
    page: ScriptedPage,
    registry: Vec<Registered>,
}

pub struct ScriptedSession {
    state: Mutex<SessionState>,
    journal: Arc<Journal>,
}

fn lost() -> BrowserError {
    BrowserError::WebDriver {
        operation: "find elements".to_string(),
        status: 404,
        error: "invalid session id".to_string(),
        message: "session deleted because of page crash".to_string(),
    }
}

fn register(state: &mut SessionState, nodes: Vec<FakeNode>, origin: &Locator) -> Vec<ElementHandle> {
    nodes
        .into_iter()
        .map(|node| {
            state.registry.push(Registered {
                node,
                origin: origin.clone(),
            });
            ElementHandle(format!("node-{}", state.registry.len() - 1))
        })
        .collect()
}

fn index(handle: &ElementHandle) -> usize {
    handle.0.trim_start_matches("node-").parse().unwrap()
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.journal.record(format!("goto {url}"));
        let state = self.state.lock().unwrap();
        match state.page.goto_error {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, BrowserError> {
        let mut state = self.state.lock().unwrap();
        if state.page.session_lost {
            return Err(lost());
        }
        let nodes = state
            .page
            .matches
            .iter()
            .find(|(l, _)| l == locator)
            .map(|(_, nodes)| nodes.clone())
            .unwrap_or_default();
        Ok(register(&mut state, nodes, locator))
    }

    async fn find_within(
        &self,
        element: &ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let mut state = self.state.lock().unwrap();
        let nodes = state.registry[index(element)]
            .node
            .children
            .iter()
            .find(|(l, _)| l == locator)
            .map(|(_, nodes)| nodes.clone())
            .unwrap_or_default();
        Ok(register(&mut state, nodes, locator))
    }

    async fn inner_text(
        &self,
        element: &ElementHandle,
        _timeout: Duration,
    ) -> Result<String, BrowserError> {
        let state = self.state.lock().unwrap();
        Ok(state.registry[index(element)].node.text.clone())
    }

    async fn page_source(&self, _timeout: Duration) -> Result<String, BrowserError> {
        let state = self.state.lock().unwrap();
        assert!(!state.page.panic_on_source, "renderer crashed");
        Ok(state.page.source.clone())
    }

    async fn scroll_to_fraction(&self, fraction: f64) -> Result<(), BrowserError> {
        self.journal.record(format!("scroll {fraction}"));
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        let origin = self.state.lock().unwrap().registry[index(element)]
            .origin
            .to_string();
        self.journal.record(format!("scroll into {origin}"));
        Ok(())
    }

    async fn click(&self, element: &ElementHandle, _timeout: Duration) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        let origin = state.registry[index(element)].origin.clone();
        self.journal.record(format!("click {origin}"));
        let swap = match &state.page.on_click {
            Some((trigger, next)) if *trigger == origin => Some((**next).clone()),
            _ => None,
        };
        if let Some(next) = swap {
            state.page = next;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.journal.record("close".to_string());
        self.journal.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
