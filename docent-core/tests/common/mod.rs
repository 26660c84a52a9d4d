// Scripted in-memory capture page shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use docent_capture::{CaptureError, Extractor, Link, PageAutomation, PageSnapshot, WaitPolicy};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Observable state that outlives the page once it is boxed into an orchestrator
#[derive(Clone, Default)]
pub struct PageLog {
    calls: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<bool>>,
}

impl PageLog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub struct ScriptedPage {
    pages: HashMap<String, PageSnapshot>,
    history: Vec<PageSnapshot>,
    pub navigate_failures: VecDeque<CaptureError>,
    pub click_failures: VecDeque<CaptureError>,
    pub hover_failures: VecDeque<CaptureError>,
    pub reload_fails: bool,
    /// Clicks never answer, like a browser stuck on a dialog
    pub clicks_hang: bool,
    log: PageLog,
}

pub fn page(url: &str, title: &str, links: &[(&str, &str)]) -> PageSnapshot {
    let mut snapshot = PageSnapshot::new(url.to_string()).with_title(title).with_links(
        links
            .iter()
            .map(|(href, text)| Link::new(*href, *text))
            .collect(),
    );
    snapshot.status_code = 200;
    snapshot
}

/// Acme: a home page with product pages, an auth wall and a legal page
pub fn acme_site() -> Vec<PageSnapshot> {
    vec![
        page(
            "https://acme.io/",
            "Acme",
            &[
                ("https://acme.io/features", "Features"),
                ("https://acme.io/pricing", "Pricing"),
                ("https://acme.io/login", "Login"),
                ("https://acme.io/privacy", "Privacy Policy"),
            ],
        ),
        page(
            "https://acme.io/features",
            "Features",
            &[
                ("https://acme.io/features/reports", "Reports"),
                ("https://acme.io/", "Home"),
            ],
        ),
        page(
            "https://acme.io/pricing",
            "Pricing",
            &[("https://acme.io/", "Home")],
        ),
        page(
            "https://acme.io/features/reports",
            "Reports",
            &[("https://acme.io/features", "Features")],
        ),
        page("https://acme.io/login", "Log in to Acme", &[]),
        page("https://acme.io/privacy", "Privacy", &[]),
    ]
}

impl ScriptedPage {
    pub fn new(pages: Vec<PageSnapshot>) -> Self {
        Self {
            pages: pages.into_iter().map(|p| (p.url.clone(), p)).collect(),
            history: Vec::new(),
            navigate_failures: VecDeque::new(),
            click_failures: VecDeque::new(),
            hover_failures: VecDeque::new(),
            reload_fails: false,
            clicks_hang: false,
            log: PageLog::default(),
        }
    }

    pub fn acme() -> Self {
        Self::new(acme_site())
    }

    pub fn log(&self) -> PageLog {
        self.log.clone()
    }

    pub fn fail_navigation(mut self, error: CaptureError) -> Self {
        self.navigate_failures.push_back(error);
        self
    }

    pub fn fail_click(mut self, error: CaptureError) -> Self {
        self.click_failures.push_back(error);
        self
    }

    pub fn fail_hover(mut self, error: CaptureError) -> Self {
        self.hover_failures.push_back(error);
        self
    }

    pub fn hang_on_click(mut self) -> Self {
        self.clicks_hang = true;
        self
    }

    fn ensure_open(&self) -> Result<(), CaptureError> {
        if self.log.is_closed() {
            Err(CaptureError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn current(&self) -> Result<&PageSnapshot, CaptureError> {
        self.history
            .last()
            .ok_or_else(|| CaptureError::Other("no page loaded".to_string()))
    }

    fn load(&mut self, url: &str) -> Result<PageSnapshot, CaptureError> {
        let snapshot = self
            .pages
            .get(url)
            .or_else(|| self.pages.get(&format!("{}/", url.trim_end_matches('/'))))
            .or_else(|| self.pages.get(url.trim_end_matches('/')))
            .cloned()
            .ok_or_else(|| CaptureError::Navigation(format!("HTTP 404 for {}", url)))?;
        self.history.push(snapshot.clone());
        Ok(snapshot)
    }
}

#[async_trait]
impl PageAutomation for ScriptedPage {
    async fn navigate(
        &mut self,
        url: &str,
        _wait: WaitPolicy,
        _timeout: Duration,
    ) -> Result<PageSnapshot, CaptureError> {
        self.log.push(format!("navigate {}", url));
        self.ensure_open()?;
        if let Some(error) = self.navigate_failures.pop_front() {
            return Err(error);
        }
        self.load(url)
    }

    async fn reload(&mut self, _timeout: Duration) -> Result<PageSnapshot, CaptureError> {
        self.log.push("reload".to_string());
        self.ensure_open()?;
        if self.reload_fails {
            return Err(CaptureError::Navigation("reload refused".to_string()));
        }
        self.current().cloned()
    }

    async fn go_back(&mut self, _timeout: Duration) -> Result<PageSnapshot, CaptureError> {
        self.log.push("back".to_string());
        self.ensure_open()?;
        if self.history.len() < 2 {
            return Err(CaptureError::Navigation("no history to go back to".to_string()));
        }
        self.history.pop();
        self.current().cloned()
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, CaptureError> {
        self.ensure_open()?;
        self.current().cloned()
    }

    async fn evaluate(&mut self, extractor: Extractor) -> Result<serde_json::Value, CaptureError> {
        self.ensure_open()?;
        let current = self.current()?;
        Ok(match extractor {
            Extractor::Links => serde_json::to_value(&current.links)
                .map_err(|e| CaptureError::Parse(e.to_string()))?,
            Extractor::Title => serde_json::json!(current.title),
            Extractor::Headings => serde_json::json!(current.headings),
            Extractor::Summary => serde_json::json!({ "url": current.url }),
        })
    }

    async fn click(&mut self, target: &str) -> Result<(), CaptureError> {
        self.log.push(format!("click {}", target));
        self.ensure_open()?;
        if self.clicks_hang {
            std::future::pending::<()>().await;
        }
        if let Some(error) = self.click_failures.pop_front() {
            return Err(error);
        }
        let href = self
            .current()?
            .find_link(target)
            .map(|l| l.href.clone())
            .ok_or_else(|| CaptureError::ElementNotFound(target.to_string()))?;
        self.load(&href).map(|_| ())
    }

    async fn hover(&mut self, target: &str) -> Result<(), CaptureError> {
        self.log.push(format!("hover {}", target));
        self.ensure_open()?;
        if let Some(error) = self.hover_failures.pop_front() {
            return Err(error);
        }
        self.current()?
            .find_link(target)
            .map(|_| ())
            .ok_or_else(|| CaptureError::ElementNotFound(target.to_string()))
    }

    async fn scroll(&mut self, delta_y: i32) -> Result<(), CaptureError> {
        self.log.push(format!("scroll {}", delta_y));
        self.ensure_open()
    }

    async fn move_mouse(&mut self, x: f64, y: f64) -> Result<(), CaptureError> {
        self.log.push(format!("move {} {}", x, y));
        self.ensure_open()
    }

    async fn press_key(&mut self, key: &str) -> Result<(), CaptureError> {
        self.log.push(format!("key {}", key));
        self.ensure_open()
    }

    async fn wait_for_ready(&mut self, _wait: WaitPolicy, _timeout: Duration) -> Result<(), CaptureError> {
        self.ensure_open()
    }

    fn current_url(&self) -> Option<String> {
        self.history.last().map(|p| p.url.clone())
    }

    fn is_closed(&self) -> bool {
        self.log.is_closed()
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        self.log.push("close".to_string());
        *self.log.closed.lock().unwrap() = true;
        Ok(())
    }
}
