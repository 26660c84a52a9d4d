use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A link discovered on a page, as offered to the exploration strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub text: String,
    /// Whether the anchor sits inside a `<nav>`/`<header>` or `role="navigation"` block
    pub in_navigation: bool,
}

impl Link {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
            in_navigation: false,
        }
    }

    pub fn in_navigation(mut self) -> Self {
        self.in_navigation = true;
        self
    }

    /// Text shown to the user, falling back to the href for icon-only anchors
    pub fn label(&self) -> &str {
        if self.text.trim().is_empty() {
            &self.href
        } else {
            self.text.trim()
        }
    }
}

/// State of the page after a navigation or interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub status_code: u16,
    pub title: Option<String>,
    pub headings: Vec<String>,
    pub links: Vec<Link>,
    pub content_type: Option<String>,
    pub response_time: Duration,
}

impl PageSnapshot {
    pub fn new(url: String) -> Self {
        Self {
            url,
            status_code: 0,
            title: None,
            headings: Vec::new(),
            links: Vec::new(),
            content_type: None,
            response_time: Duration::from_secs(0),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    /// Locate a link by href, `a[href='...']` selector, or visible text (case-insensitive)
    pub fn find_link(&self, target: &str) -> Option<&Link> {
        let wanted = selector_href(target).unwrap_or(target);
        self.links
            .iter()
            .find(|l| l.href == wanted)
            .or_else(|| {
                let needle = target.trim().to_lowercase();
                self.links
                    .iter()
                    .find(|l| l.text.trim().to_lowercase() == needle)
            })
    }
}

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitPolicy {
    DomContentLoaded,
    #[default]
    Load,
    NetworkIdle,
}

/// Structured data pulled out of the current page by `evaluate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Links,
    Title,
    Headings,
    Summary,
}

fn selector_href(target: &str) -> Option<&str> {
    let inner = target.strip_prefix("a[href=")?.strip_suffix(']')?;
    Some(inner.trim_matches(|c| c == '\'' || c == '"'))
}
