use crate::automation::PageAutomation;
use crate::error::{CaptureError, Result};
use crate::page::{Extractor, Link, PageSnapshot, WaitPolicy};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::json;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// `PageAutomation` over plain HTTP: pages are fetched and parsed, clicks follow
/// links, and pointer/scroll input only moves a virtual cursor.
pub struct HttpSession {
    client: Client,
    current: Option<PageSnapshot>,
    history: Vec<String>,
    cursor: (f64, f64),
    scroll_y: i64,
    default_timeout: Duration,
    interaction_delay: Duration,
    closed: bool,
}

impl HttpSession {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Docent/0.1 (https://github.com/trapdoorsec/docent)")
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            current: None,
            history: Vec::new(),
            cursor: (0.0, 0.0),
            scroll_y: 0,
            default_timeout: Duration::from_secs(timeout_secs),
            interaction_delay: Duration::from_millis(50),
            closed: false,
        })
    }

    /// Pause applied after hover/scroll input so a recording has something to show
    pub fn with_interaction_delay(mut self, delay: Duration) -> Self {
        self.interaction_delay = delay;
        self
    }

    pub fn scroll_position(&self) -> i64 {
        self.scroll_y
    }

    pub fn cursor(&self) -> (f64, f64) {
        self.cursor
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(CaptureError::SessionClosed);
        }
        Ok(())
    }

    fn current_page(&self) -> Result<&PageSnapshot> {
        self.current
            .as_ref()
            .ok_or_else(|| CaptureError::Navigation("no page loaded".to_string()))
    }

    async fn load(&self, url: &str, timeout: Duration) -> Result<PageSnapshot> {
        let parsed =
            Url::parse(url).map_err(|e| CaptureError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CaptureError::InvalidUrl(url.to_string()));
        }

        debug!("Fetching {}", url);
        let start = Instant::now();

        let response = tokio::time::timeout(timeout, self.client.get(parsed.as_str()).send())
            .await
            .map_err(|_| CaptureError::timeout(timeout, format!("navigating to {}", url)))?
            .map_err(|e| {
                if e.is_timeout() {
                    CaptureError::timeout(timeout, format!("navigating to {}", url))
                } else {
                    CaptureError::Navigation(format!("{}: {}", url, e))
                }
            })?;

        let status_code = response.status().as_u16();
        if status_code >= 400 {
            return Err(CaptureError::Navigation(format!(
                "HTTP {} for {}",
                status_code, url
            )));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let remaining = timeout.saturating_sub(start.elapsed());
        let body = tokio::time::timeout(remaining, response.text())
            .await
            .map_err(|_| CaptureError::timeout(timeout, format!("reading {}", url)))??;

        let mut snapshot = PageSnapshot::new(final_url.clone());
        snapshot.status_code = status_code;
        snapshot.content_type = content_type.clone();
        snapshot.response_time = start.elapsed();

        let is_html = content_type
            .as_ref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);

        if is_html {
            parse_document(&body, &final_url, &mut snapshot)?;
        }

        info!(
            "Loaded {} ({} links, {:?})",
            snapshot.url,
            snapshot.links.len(),
            snapshot.response_time
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl PageAutomation for HttpSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> Result<PageSnapshot> {
        self.ensure_open()?;
        let snapshot = self.load(url, timeout).await?;

        if let Some(previous) = self.current.take() {
            self.history.push(previous.url);
        }
        self.current = Some(snapshot.clone());
        self.scroll_y = 0;

        if wait == WaitPolicy::NetworkIdle {
            tokio::time::sleep(self.interaction_delay).await;
        }
        Ok(snapshot)
    }

    async fn reload(&mut self, timeout: Duration) -> Result<PageSnapshot> {
        self.ensure_open()?;
        let url = self.current_page()?.url.clone();
        let snapshot = self.load(&url, timeout).await?;
        self.current = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn go_back(&mut self, timeout: Duration) -> Result<PageSnapshot> {
        self.ensure_open()?;
        let url = self
            .history
            .pop()
            .ok_or_else(|| CaptureError::Navigation("no history to go back to".to_string()))?;
        let snapshot = self.load(&url, timeout).await?;
        self.current = Some(snapshot.clone());
        self.scroll_y = 0;
        Ok(snapshot)
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot> {
        self.ensure_open()?;
        Ok(self.current_page()?.clone())
    }

    async fn evaluate(&mut self, extractor: Extractor) -> Result<serde_json::Value> {
        self.ensure_open()?;
        let page = self.current_page()?;
        let value = match extractor {
            Extractor::Links => serde_json::to_value(&page.links)
                .map_err(|e| CaptureError::Parse(e.to_string()))?,
            Extractor::Title => json!(page.title),
            Extractor::Headings => json!(page.headings),
            Extractor::Summary => json!({
                "url": page.url,
                "title": page.title,
                "headings": page.headings,
                "linkCount": page.links.len(),
            }),
        };
        Ok(value)
    }

    async fn click(&mut self, target: &str) -> Result<()> {
        self.ensure_open()?;
        let href = self
            .current_page()?
            .find_link(target)
            .map(|l| l.href.clone())
            .ok_or_else(|| CaptureError::ElementNotFound(target.to_string()))?;

        debug!("Clicking {} -> {}", target, href);
        let timeout = self.default_timeout;
        self.navigate(&href, WaitPolicy::Load, timeout).await?;
        Ok(())
    }

    async fn hover(&mut self, target: &str) -> Result<()> {
        self.ensure_open()?;
        let page = self.current_page()?;
        let found = page
            .find_link(target)
            .ok_or_else(|| CaptureError::ElementNotFound(target.to_string()))?;
        let index = page.links.iter().position(|l| l == found).unwrap_or(0);

        // Links are laid out on a nominal 40px grid
        self.cursor = (200.0, 40.0 * index as f64 - self.scroll_y as f64);
        tokio::time::sleep(self.interaction_delay).await;
        Ok(())
    }

    async fn scroll(&mut self, delta_y: i32) -> Result<()> {
        self.ensure_open()?;
        self.current_page()?;
        self.scroll_y = (self.scroll_y + i64::from(delta_y)).max(0);
        tokio::time::sleep(self.interaction_delay).await;
        Ok(())
    }

    async fn move_mouse(&mut self, x: f64, y: f64) -> Result<()> {
        self.ensure_open()?;
        self.cursor = (x, y);
        Ok(())
    }

    async fn press_key(&mut self, key: &str) -> Result<()> {
        self.ensure_open()?;
        debug!("Key press {} (no-op over HTTP)", key);
        Ok(())
    }

    async fn wait_for_ready(&mut self, _wait: WaitPolicy, _timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        self.current_page()?;
        Ok(())
    }

    fn current_url(&self) -> Option<String> {
        self.current.as_ref().map(|p| p.url.clone())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            info!("Closing capture session ({} pages in history)", self.history.len());
        }
        self.closed = true;
        self.current = None;
        self.history.clear();
        Ok(())
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CaptureError::Parse(format!("{:?}", e)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_document(html: &str, page_url: &str, snapshot: &mut PageSnapshot) -> Result<()> {
    let document = Html::parse_document(html);

    let title_selector = selector("title")?;
    snapshot.title = document
        .select(&title_selector)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let heading_selector = selector("h1, h2")?;
    snapshot.headings = document
        .select(&heading_selector)
        .map(|h| collapse_whitespace(&h.text().collect::<String>()))
        .filter(|h| !h.is_empty())
        .collect();

    let link_selector = selector("a[href]")?;
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&link_selector) {
        if let Some(href) = element.value().attr("href")
            && let Some(absolute_url) = resolve_url(page_url, href)
        {
            if absolute_url == page_url || !seen.insert(absolute_url.clone()) {
                continue;
            }

            let mut text = collapse_whitespace(&element.text().collect::<String>());
            if text.is_empty() {
                text = element
                    .value()
                    .attr("aria-label")
                    .or_else(|| element.value().attr("title"))
                    .unwrap_or_default()
                    .to_string();
            }

            let in_navigation = element.ancestors().any(|node| {
                node.value().as_element().is_some_and(|e| {
                    matches!(e.name(), "nav" | "header") || e.attr("role") == Some("navigation")
                })
            });

            links.push(Link {
                href: absolute_url,
                text,
                in_navigation,
            });
        }
    }

    snapshot.links = links;
    Ok(())
}

fn resolve_url(base: &str, href: &str) -> Option<String> {
    // Skip empty, javascript:, mailto:, tel:, in-page anchors
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut resolved = base_url.join(href).ok()?;
    resolved.set_fragment(None);

    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    async fn mount_html(server: &MockServer, route: &str, html: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(html.into_bytes()),
            )
            .mount(server)
            .await;
    }

    async fn site() -> MockServer {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        let root_html = format!(
            r#"<html><head><title>Acme  Home</title></head><body>
                <nav><a href="{uri}/features">Features</a><a href="/pricing">Pricing</a></nav>
                <h1>Welcome</h1>
                <a href="/pricing#plans">Plans</a>
                <a href="mailto:hi@example.com">Mail</a>
                <a href="/about" aria-label="About us"></a>
            </body></html>"#
        );
        mount_html(&mock_server, "/", root_html).await;
        mount_html(
            &mock_server,
            "/features",
            "<html><head><title>Features</title></head><body><h2>Fast</h2></body></html>"
                .to_string(),
        )
        .await;
        mount_html(
            &mock_server,
            "/pricing",
            "<html><head><title>Pricing</title></head><body></body></html>".to_string(),
        )
        .await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(b"<html></html>".to_vec())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_navigate_extracts_links_and_title() {
        let server = site().await;
        let mut session = HttpSession::new().unwrap();

        let page = session
            .navigate(&server.uri(), WaitPolicy::Load, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(page.status_code, 200);
        assert_eq!(page.title.as_deref(), Some("Acme Home"));
        assert_eq!(page.headings, vec!["Welcome".to_string()]);

        // Fragment-only duplicates and mailto links are dropped
        let hrefs: Vec<&str> = page.links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs.len(), 3, "links: {:?}", hrefs);
        assert!(page.links[0].in_navigation);
        assert!(page.links[1].in_navigation);
        assert!(!page.links[2].in_navigation);
        assert_eq!(page.links[2].text, "About us");
    }

    #[tokio::test]
    async fn test_click_follows_link_and_go_back() {
        let server = site().await;
        let mut session = HttpSession::new()
            .unwrap()
            .with_interaction_delay(Duration::from_millis(1));

        session
            .navigate(&server.uri(), WaitPolicy::Load, Duration::from_secs(5))
            .await
            .unwrap();
        session.click("Pricing").await.unwrap();

        assert_eq!(
            session.current_url(),
            Some(format!("{}/pricing", server.uri()))
        );
        assert_eq!(session.history_len(), 1);

        let back = session.go_back(Duration::from_secs(5)).await.unwrap();
        assert_eq!(back.title.as_deref(), Some("Acme Home"));
        assert_eq!(session.history_len(), 0);
    }

    #[tokio::test]
    async fn test_click_missing_element() {
        let server = site().await;
        let mut session = HttpSession::new().unwrap();
        session
            .navigate(&server.uri(), WaitPolicy::Load, Duration::from_secs(5))
            .await
            .unwrap();

        let err = session.click("Careers").await.unwrap_err();
        assert!(matches!(err, CaptureError::ElementNotFound(_)));
        assert!(err.to_string().starts_with("Element not found"));
    }

    #[tokio::test]
    async fn test_http_error_is_navigation_failure() {
        let server = site().await;
        let mut session = HttpSession::new().unwrap();

        let err = session
            .navigate(
                &format!("{}/broken", server.uri()),
                WaitPolicy::Load,
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Navigation failed"));
    }

    #[tokio::test]
    async fn test_navigation_timeout() {
        let server = site().await;
        let mut session = HttpSession::new().unwrap();

        let err = session
            .navigate(
                &format!("{}/slow", server.uri()),
                WaitPolicy::Load,
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Timeout { .. }));
        assert!(err.to_string().contains("Timeout 50ms exceeded"));
    }

    #[tokio::test]
    async fn test_scroll_hover_and_evaluate() {
        let server = site().await;
        let mut session = HttpSession::new()
            .unwrap()
            .with_interaction_delay(Duration::from_millis(1));
        session
            .navigate(&server.uri(), WaitPolicy::Load, Duration::from_secs(5))
            .await
            .unwrap();

        session.scroll(300).await.unwrap();
        session.scroll(-500).await.unwrap();
        assert_eq!(session.scroll_position(), 0);

        session.hover("Features").await.unwrap();
        assert!(session.hover("Nowhere").await.is_err());

        let summary = session.evaluate(Extractor::Summary).await.unwrap();
        assert_eq!(summary["title"], "Acme Home");
        assert_eq!(summary["linkCount"], 3);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_calls() {
        let mut session = HttpSession::new().unwrap();
        session.close().await.unwrap();

        assert!(session.is_closed());
        let err = session.scroll(10).await.unwrap_err();
        assert!(matches!(err, CaptureError::SessionClosed));
    }

    #[test]
    fn test_resolve_url_strips_fragment() {
        assert_eq!(
            resolve_url("https://example.com/a/", "../b#top"),
            Some("https://example.com/b".to_string())
        );
        assert_eq!(resolve_url("https://example.com/", "#top"), None);
        assert_eq!(resolve_url("https://example.com/", "javascript:void(0)"), None);
    }
}
